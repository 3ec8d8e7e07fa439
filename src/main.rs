//! AURN Fetcher CLI application
//!
//! Command-line interface for moving UK-AIR air-quality measurements into a
//! time-series database.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use aurn_fetcher::cli::{
    handle_config, handle_range, handle_run, handle_stations, Cli, Commands,
};
use aurn_fetcher::config::AppConfig;
use aurn_fetcher::constants::logging;
use aurn_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Config commands must work even when the current file is broken
    let config = match cli.command {
        Commands::Config(_) => None,
        _ => Some(AppConfig::load(cli.global.config.clone()).await?),
    };
    let configured_level = config
        .as_ref()
        .map_or(logging::DEFAULT_LOG_LEVEL, |c| c.logging.level.as_str());
    init_logging(&cli.log_level(configured_level), cli.global.very_verbose);
    info!("AURN Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config.unwrap_or_default();
    match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(args, &config).await
        }
        Commands::Stations(args) => {
            info!("Executing stations command");
            handle_stations(args, &config).await
        }
        Commands::Range(args) => handle_range(args).await,
        Commands::Config(args) => handle_config(args, cli.global.config).await,
    }
}

/// Initialize logging at the given level
fn init_logging(level: &str, show_levels: bool) {
    let mut filter = EnvFilter::from_default_env();
    match format!("aurn_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(show_levels)
        .with_writer(std::io::stderr)
        .init();

    if show_levels {
        info!("Very verbose logging enabled");
    }
}
