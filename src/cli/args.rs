//! Command-line argument parsing for AURN Fetcher
//!
//! This module defines the CLI structure using clap derive macros: a batch
//! `run` over a date range plus helpers for inspecting stations, ranges and
//! configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::SinkKind;

/// AURN Fetcher - Move UK air-quality measurements into a time-series database
#[derive(Parser, Debug)]
#[command(
    name = "aurn_fetcher",
    version,
    about = "Fetch AURN air-quality data from UK-AIR into InfluxDB",
    long_about = "Resolves the AURN stations active over a date range, downloads their yearly
measurement files from UK-AIR, cleans them and submits them as line protocol to InfluxDB,
a local file or nowhere (dry run)."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, convert and submit measurements for a date range
    Run(RunArgs),

    /// List the stations a run would process
    Stations(StationsArgs),

    /// Show day, week and year counts of a date range
    Range(RangeArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Start and end of the requested period
#[derive(Args, Debug, Clone)]
pub struct PeriodArgs {
    /// Start date (YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339)
    #[arg(short, long)]
    pub start: String,

    /// End date (YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339)
    #[arg(short, long)]
    pub end: String,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Network to process, as named in the configuration
    #[arg(short, long)]
    pub network: Option<String>,

    /// Where records go (overrides the configured sink)
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Output file for the file sink
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Number of concurrent (station, year) units
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Save every cleaned table as CSV into this directory
    #[arg(long, value_name = "DIR")]
    pub debug_output: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the stations command
#[derive(Args, Debug, Clone)]
pub struct StationsArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Network to list, as named in the configuration
    #[arg(short, long)]
    pub network: Option<String>,
}

/// Arguments for the range command
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    #[command(flatten)]
    pub period: PeriodArgs,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Target path (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level, falling back to the configured one
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if self.output.is_some() && matches!(self.sink, Some(SinkKind::Influx | SinkKind::Discard))
        {
            return Err("--output only applies to the file sink".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let mut argv = vec!["aurn_fetcher", "run"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Run(run) => run,
            other => panic!("expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_run_args_parsing() {
        let args = run_args(&[
            "--start", "2019", "--end", "2020-06", "--sink", "file", "-o", "out.lp", "-w", "2",
        ]);

        assert_eq!(args.period.start, "2019");
        assert_eq!(args.period.end, "2020-06");
        assert_eq!(args.sink, Some(SinkKind::File));
        assert_eq!(args.output, Some(PathBuf::from("out.lp")));
        assert_eq!(args.workers, Some(2));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_run_args_validation() {
        let args = run_args(&["-s", "2020", "-e", "2020", "-w", "0"]);
        assert!(args.validate().is_err());

        let args = run_args(&["-s", "2020", "-e", "2020", "--sink", "discard", "-o", "x.lp"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_config_init_parsing() {
        let cli = Cli::parse_from(["aurn_fetcher", "config", "init", "cfg.toml", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, Some(PathBuf::from("cfg.toml")));
                assert!(force);
            }
            other => panic!("expected config init, got {:?}", other),
        }
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli::parse_from(["aurn_fetcher", "-q", "range", "-s", "2020", "-e", "2021"]);
        let verbose =
            Cli::parse_from(["aurn_fetcher", "range", "-s", "2020", "-e", "2021", "--very-verbose"]);
        let plain = Cli::parse_from(["aurn_fetcher", "range", "-s", "2020", "-e", "2021"]);

        assert_eq!(quiet.log_level("info"), "error");
        assert_eq!(verbose.log_level("info"), "debug");
        assert_eq!(plain.log_level("warn"), "warn");
    }
}
