//! Command handlers for AURN Fetcher CLI
//!
//! This module implements the command handlers that turn CLI arguments and
//! the loaded configuration into configured pipeline components.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::client::UkAirClient;
use crate::app::coordinator::{Coordinator, ShutdownSignal};
use crate::app::fetcher::MeasurementFetcher;
use crate::app::range::DateRange;
use crate::app::sink::{DiscardSink, InfluxSink, LineProtocolFileSink, RecordSink};
use crate::app::stations::StationResolver;
use crate::cli::{ConfigAction, ConfigArgs, PeriodArgs, RangeArgs, RunArgs, StationsArgs};
use crate::config::{AppConfig, SinkKind};
use crate::constants::network;
use crate::errors::{AppError, Result};

/// Handle the run command
///
/// Builds the client, resolver, fetcher and sink from configuration plus
/// command-line overrides and drives one coordinator run.
pub async fn handle_run(args: RunArgs, config: &AppConfig) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    let range = parse_period(&args.period)?;

    let network_name = args.network.as_deref().unwrap_or(network::DEFAULT_NAME);
    let profile = config.network(network_name)?;

    let mut pipeline = config.pipeline.to_runtime_config(config.sink.batch_size);
    if let Some(workers) = args.workers {
        pipeline = pipeline.with_worker_count(workers);
    }
    if args.debug_output.is_some() {
        pipeline = pipeline.with_debug_output(args.debug_output.clone());
    }
    if args.no_progress {
        pipeline = pipeline.with_progress_bar(false);
    }

    let client = build_client(config)?;
    let resolver = build_resolver(config, Arc::clone(&client), network_name);
    let fetcher = MeasurementFetcher::new(client).with_preamble_lines(config.source.preamble_lines);
    let sink = build_sink(config, args.sink, args.output.clone())?;

    println!(
        "🚀 Fetching {} data for {} to {} into '{}' with {} workers",
        profile.name,
        range.start().format("%Y-%m-%d"),
        range.end().format("%Y-%m-%d"),
        sink.name(),
        pipeline.worker_count
    );

    let shutdown = ShutdownSignal::new();
    let listener = shutdown.listen();
    let coordinator =
        Coordinator::new(pipeline, profile, resolver, fetcher, sink).with_shutdown(shutdown);
    let result = coordinator.run(&range).await;
    listener.abort();

    let summary = result?;
    if args.json {
        let report = summary
            .to_json()
            .map_err(|e| AppError::generic(format!("Could not render summary: {}", e)))?;
        println!("{}", report);
    } else {
        println!("\n📊 {}", summary);
    }

    if summary.stats.units_failed() > 0 {
        return Err(AppError::generic(format!(
            "{} units failed; see the log for details",
            summary.stats.units_failed()
        )));
    }
    Ok(())
}

/// Handle the stations command
pub async fn handle_stations(args: StationsArgs, config: &AppConfig) -> Result<()> {
    let range = parse_period(&args.period)?;
    let network_name = args.network.as_deref().unwrap_or(network::DEFAULT_NAME);
    // Fail early on networks the configuration does not know
    config.network(network_name)?;

    let client = build_client(config)?;
    let resolver = build_resolver(config, client, network_name);
    let (start_year, end_year) = range.year_bounds();
    let stations = resolver.resolve(start_year, end_year).await?;

    println!(
        "{} {} stations active in {}-{}:",
        stations.len(),
        network_name,
        start_year,
        end_year
    );
    for station in &stations {
        println!(
            "  {:<6} {:<10} {} ({})",
            station.download_code, station.site_id, station.site_name, station.history
        );
    }

    Ok(())
}

/// Handle the range command
pub async fn handle_range(args: RangeArgs) -> Result<()> {
    let range = parse_period(&args.period)?;
    let (start_year, end_year) = range.year_bounds();

    println!("Start: {}", range.start().to_rfc3339());
    println!("End:   {}", range.end().to_rfc3339());
    println!("Days:  {}", range.days());
    println!("Weeks: {}", range.weeks());
    println!("Years: {}", range.years());
    println!("Years fetched: {}-{}", start_year, end_year);

    Ok(())
}

/// Handle the config command
pub async fn handle_config(args: ConfigArgs, config_override: Option<PathBuf>) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let (path, created) = AppConfig::initialize(path.or(config_override), force).await?;
            if created {
                println!("✅ Wrote default configuration to {}", path.display());
            } else {
                println!(
                    "ℹ️  {} already exists; use --force to overwrite it",
                    path.display()
                );
            }
        }
        ConfigAction::Show => {
            let config = AppConfig::load(config_override).await?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn parse_period(period: &PeriodArgs) -> Result<DateRange> {
    let range = DateRange::parse(&period.start, &period.end)?;
    debug!(
        "Parsed range {} to {} ({} days)",
        range.start(),
        range.end(),
        range.days()
    );
    Ok(range)
}

fn build_client(config: &AppConfig) -> Result<Arc<UkAirClient>> {
    let client = UkAirClient::with_base_url(
        config.client.to_runtime_config(),
        &config.source.domain,
    )?;
    Ok(Arc::new(client))
}

fn build_resolver(config: &AppConfig, client: Arc<UkAirClient>, network: &str) -> StationResolver {
    StationResolver::new(client, network)
        .with_listing_url(config.source.listing_url.clone())
        .with_site_info_path(config.source.site_info_path.clone())
}

/// Build the sink selected on the command line or in the configuration
fn build_sink(
    config: &AppConfig,
    kind: Option<SinkKind>,
    output: Option<PathBuf>,
) -> Result<Arc<dyn RecordSink>> {
    let kind = kind.unwrap_or(config.sink.kind);
    info!("Using {:?} sink", kind);

    let sink: Arc<dyn RecordSink> = match kind {
        SinkKind::Influx => Arc::new(InfluxSink::new(
            &config.influx_settings(),
            &config.client.to_runtime_config(),
        )?),
        SinkKind::File => Arc::new(LineProtocolFileSink::new(
            output.unwrap_or_else(|| config.sink.output.clone()),
        )),
        SinkKind::Discard => Arc::new(DiscardSink::new()),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ConfigError, RangeError, SinkError};

    #[tokio::test]
    async fn test_inverted_period_is_rejected() {
        let period = PeriodArgs {
            start: "2021".to_string(),
            end: "2019".to_string(),
        };
        let result = parse_period(&period);
        assert!(matches!(
            result,
            Err(AppError::Range(RangeError::InvalidRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_network_fails_before_fetching() {
        let args = StationsArgs {
            period: PeriodArgs {
                start: "2020".to_string(),
                end: "2020".to_string(),
            },
            network: Some("NOPE".to_string()),
        };
        let result = handle_stations(args, &AppConfig::default()).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::UnknownNetwork { .. }))
        ));
    }

    #[test]
    fn test_build_sink_selection() {
        let config = AppConfig::default();

        let sink = build_sink(&config, Some(SinkKind::Discard), None).unwrap();
        assert_eq!(sink.name(), "discard");

        let sink = build_sink(&config, Some(SinkKind::File), Some(PathBuf::from("x.lp"))).unwrap();
        assert_eq!(sink.name(), "file");
    }

    #[test]
    fn test_influx_sink_requires_bucket() {
        let config = AppConfig::default();
        let result = build_sink(&config, Some(SinkKind::Influx), None);
        assert!(matches!(
            result,
            Err(AppError::Sink(SinkError::Misconfigured { .. }))
        ));
    }
}
