//! Ascend Ingest - scheduled file relocation

use anyhow::Result;
use ascend_common::logging::{init_logging, LogConfig, LogLevel};
use ascend_ingest::{IngestPipeline, IngestSettings};
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ascend-ingest")]
#[command(author, version, about = "Relocate data files between storage endpoints")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Mode {
    /// Run a single pass and exit
    Run,

    /// Run a pass on every interval tick until interrupted
    Watch {
        /// Seconds between passes (defaults to RUN_INTERVAL_SECS)
        #[arg(short, long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("ascend-ingest")
        .filter_directives("aws_smithy_runtime=warn,aws_config=warn,hyper=info")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    let settings = IngestSettings::load()?;
    let pipeline = IngestPipeline::from_settings(&settings)?;

    match cli.mode {
        Mode::Run => {
            let report = pipeline.run_once().await?;
            info!(?report, "Pass finished");
        },
        Mode::Watch { interval_secs } => {
            let period = interval_secs
                .filter(|secs| *secs > 0)
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| settings.run_interval());
            info!("Running a pass every {:?}", period);

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A failed pass is reported and the next tick tries again.
                        if let Err(e) = pipeline.run_once().await {
                            error!("Ingestion pass failed: {:#}", e);
                        }
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, stopping");
                        break;
                    },
                }
            }
        },
    }

    Ok(())
}
