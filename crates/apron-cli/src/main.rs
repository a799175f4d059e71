//! Apron fleet simulator.
//!
//! This is the entry point for the `apronsim` binary.

mod recorder;
mod scenario;
mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use apron_dispatch::{DispatchConfig, Dispatcher, DispatcherService};
use apron_fleet::{EventSink, FleetConfig, FleetState, NullSink, StorageSpec};
use recorder::FileRecorder;

/// Apron fleet simulator - baggage deliveries over a shared charging pool.
#[derive(Parser, Debug)]
#[command(name = "apronsim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of AGVs in the fleet.
    #[arg(long, default_value_t = 5)]
    agvs: u32,

    /// Number of charging stations.
    #[arg(long, default_value_t = 5)]
    stations: u32,

    /// Number of baggage items to deliver.
    #[arg(long, default_value_t = 6)]
    baggage: usize,

    /// Capacity of the main storage area.
    #[arg(long, default_value_t = 50)]
    storage_capacity: usize,

    /// Milliseconds per simulated tick.
    #[arg(long, default_value_t = 300)]
    tick_ms: u64,

    /// Directory for event log files. When omitted, events are not persisted.
    #[arg(long, env = "APRONSIM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Print the final fleet snapshot as JSON instead of the status board.
    #[arg(long, default_value = "false")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Event sink: file-backed when a log directory is given
    let recorder = match &args.log_dir {
        Some(dir) => Some(Arc::new(FileRecorder::create(dir.clone())?)),
        None => None,
    };
    let sink: Arc<dyn EventSink> = match &recorder {
        Some(recorder) => recorder.clone(),
        None => Arc::new(NullSink),
    };

    // Build the fleet
    let fleet = FleetConfig {
        agvs: args.agvs,
        stations: args.stations,
        storages: vec![StorageSpec {
            name: "Main Storage".to_string(),
            capacity: args.storage_capacity,
        }],
    };
    let dispatch = DispatchConfig {
        tick: Duration::from_millis(args.tick_ms),
        ..DispatchConfig::default()
    };
    let state = Arc::new(FleetState::new(&fleet, sink.clone()));
    let dispatcher = DispatcherService::new(state.clone(), sink, dispatch);

    // Run the scenario and wait for every task to report
    let report = scenario::run(&dispatcher, &state, args.baggage).await;
    dispatcher.shutdown().await;

    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        skipped = report.skipped,
        recharged = report.recharged,
        "Scenario finished"
    );

    // Final fleet state
    let snapshot = dispatcher.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", status::render(&snapshot));
    }

    if let Some(recorder) = recorder {
        recorder.close();
    }
    Ok(())
}
