//! OBS MIDI GW
//!
//! Drive OBS Studio from MIDI control surfaces, with feedback to the surface.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use obs_midi_gw::agent::Engine;
use obs_midi_gw::config::{watcher::ConfigWatcher, AppConfig};
use obs_midi_gw::drivers::{ControlledApp, ObsDriver};
use obs_midi_gw::paths::AppPaths;
use obs_midi_gw::sniffer;
use obs_midi_gw::transport::{MidirTransport, Transport};
use obs_midi_gw::AgentDirectory;

/// OBS MIDI Gateway - control OBS Studio from MIDI surfaces
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: ./config.yaml or the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// OBS WebSocket password (overrides the config file)
    #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
    obs_password: Option<String>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Dump raw traffic from the input port matching this name
    #[arg(long, value_name = "PORT")]
    sniff: Option<String>,

    /// Print every inbound message while running
    #[arg(long)]
    monitor: bool,

    /// Print the configured bindings and exit
    #[arg(long)]
    list_bindings: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    let transport: Arc<dyn Transport> = Arc::new(MidirTransport::new());

    if args.list_ports {
        return sniffer::list_ports(transport.as_ref());
    }
    if let Some(pattern) = &args.sniff {
        return sniffer::run_cli_sniffer(transport.as_ref(), pattern).await;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::detect().config);
    info!("Configuration file: {}", config_path.display());

    let config = AppConfig::load_or_default(&config_path).await?;

    if args.list_bindings {
        print_bindings(&config);
        return Ok(());
    }

    run_app(args, config, config_path, transport).await?;

    info!("OBS MIDI GW shutdown complete");
    Ok(())
}

async fn run_app(
    args: Args,
    config: AppConfig,
    config_path: PathBuf,
    transport: Arc<dyn Transport>,
) -> Result<()> {
    info!("Starting OBS MIDI GW v{}", env!("CARGO_PKG_VERSION"));

    // A password from the environment is never written back to the file
    let mut obs_config = config.obs.clone();
    if let Some(password) = &args.obs_password {
        obs_config.password = Some(password.clone());
    }

    let (events_tx, mut events_rx) = mpsc::channel(1000);
    let obs = Arc::new(ObsDriver::from_config(&obs_config, events_tx));
    let app: Arc<dyn ControlledApp> = obs.clone();

    let directory = Arc::new(AgentDirectory::new(
        Engine::new(app, transport),
        Some(config_path.clone()),
    ));
    directory.load(&config);

    if args.monitor {
        tokio::spawn(sniffer::print_monitor(directory.subscribe_monitor()));
    }

    obs.start().await;

    // The watcher needs an existing file; without one, changes go unnoticed
    let mut config_watcher = match ConfigWatcher::new(&config_path) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Config hot-reload disabled: {:#}", e);
            None
        }
    };

    info!("Ready to process MIDI events!");

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => {
                directory.broadcast(&event).await;
            }

            Some(new_config) = next_config(&mut config_watcher) => {
                // Our own saves come back through the watcher
                if new_config == directory.snapshot() {
                    continue;
                }
                if new_config.obs != config.obs {
                    warn!("OBS connection settings changed, restart to apply them");
                }
                info!("Configuration file changed, reloading devices");
                directory.load(&new_config);
            }

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    directory.shutdown();
    obs.shutdown().await;
    Ok(())
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn print_bindings(config: &AppConfig) {
    for device in &config.devices {
        let state = match (device.enabled, device.bidirectional) {
            (false, _) => "disabled".dimmed(),
            (true, false) => "input only".yellow(),
            (true, true) => "bidirectional".green(),
        };
        println!("\n{} ({})", device.name.bold().cyan(), state);
        if device.hooks.is_empty() {
            println!("  {}", "No bindings".dimmed());
        }
        for (idx, binding) in device.hooks.iter().enumerate() {
            println!("  {} {}", format!("[{}]", idx).dimmed(), binding.describe());
        }
    }
    println!();
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(filter());

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "obs-midi-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(guard)
}
