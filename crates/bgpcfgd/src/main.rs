//! bgpcfgd - BGP configuration daemon
//!
//! Watches CONFIG_DB and keeps FRR in sync through vtysh

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sonic_bgpcfg_common::{ConfigPusher, DryRunPusher, VtyshPusher};
use sonic_bgpcfgd::{default_dispatcher, DaemonConfig, RedisSource, DEFAULT_CONFIG_PATH};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// SONiC BGP configuration daemon
#[derive(Parser, Debug)]
#[command(name = "bgpcfgd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter, e.g. "debug" or "sonic_bgpcfgd=trace"
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log routing-daemon commands instead of running vtysh
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match DaemonConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bgpcfgd: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(args.log_level.as_deref().or(config.log.level.as_deref()));

    info!("--- Starting bgpcfgd (Rust) ---");

    match run(&args, &config).await {
        Ok(()) => {
            info!("bgpcfgd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("bgpcfgd exiting with error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

async fn run(args: &Args, config: &DaemonConfig) -> anyhow::Result<()> {
    let cfg_mgr: Arc<dyn ConfigPusher> = if args.dry_run {
        warn!("Dry run: routing-daemon commands will only be logged");
        Arc::new(DryRunPusher)
    } else {
        Arc::new(VtyshPusher::new(config.vtysh.path.clone()))
    };

    let mut dispatcher = default_dispatcher(cfg_mgr).context("registering managers")?;
    let tables = dispatcher.startup_order()?;

    let mut source = RedisSource::connect(config, &tables)
        .await
        .with_context(|| format!("connecting to redis at {}:{}", config.redis.host, config.redis.port))?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    let result = dispatcher.run(&mut source, shutdown).await;
    dispatcher.log_stats();
    result.context("dispatcher stopped")
}

fn spawn_signal_handler(shutdown: CancellationToken) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        shutdown.cancel();
    });
    Ok(())
}
