use anyhow::{Context, Result};
use powershop_nz::config::Config;
use powershop_nz::logging::init_logging;
use powershop_nz::publish::{AggregateSink, JsonSnapshotSink, LogSummarySink};
use powershop_nz::{PowershopClient, Reconciler, ReqwestTransport};
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

const USAGE: &str = "usage: powershop-nz [--once] [CONFIG]";

#[derive(Debug, Default)]
struct Args {
    once: bool,
    help: bool,
    config_path: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    for arg in args {
        match arg.as_str() {
            "--once" => parsed.once = true,
            "-h" | "--help" => parsed.help = true,
            flag if flag.starts_with('-') => anyhow::bail!("unknown option {}\n{}", flag, USAGE),
            path if parsed.config_path.is_none() => parsed.config_path = Some(path.to_string()),
            extra => anyhow::bail!("unexpected argument {}\n{}", extra, USAGE),
        }
    }
    Ok(parsed)
}

async fn run_cycle(reconciler: &Reconciler, sinks: &[Box<dyn AggregateSink>]) -> Result<()> {
    let aggregate = reconciler.refresh().await.context("refresh cycle failed")?;
    for sink in sinks {
        if let Err(e) = sink.publish(&aggregate).await {
            error!("Failed to publish aggregate: {}", e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = match &args.config_path {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    config.apply_env_overrides();

    init_logging(&config.logging).context("failed to initialise logging")?;
    config.validate().context("invalid configuration")?;

    info!(
        "Powershop NZ collector {} starting up",
        env!("APP_VERSION")
    );

    let jar = Arc::new(Jar::default());
    let transport = Arc::new(ReqwestTransport::new(Arc::clone(&jar))?);
    let client = Arc::new(PowershopClient::new(transport, &config, jar));
    let reconciler = Reconciler::new(client, &config)?;

    let mut sinks: Vec<Box<dyn AggregateSink>> = Vec::new();
    if config.output.log_summary {
        sinks.push(Box::new(LogSummarySink::new(config.tz()?)));
    }
    if let Some(path) = &config.output.snapshot_path {
        sinks.push(Box::new(JsonSnapshotSink::new(path)));
    }

    if args.once {
        return run_cycle(&reconciler, &sinks).await;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_cycle(&reconciler, &sinks).await {
                    error!("{:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Collector shutdown complete");
    Ok(())
}
