//! meshscan-export - MeshScan capture tool
//!
//! Replays recorded sensor captures (.mscap) into OBJ/MTL scans and
//! inspects them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use meshscan_common::formats::{load_capture, save_capture};
use meshscan_core::{Config, SessionOptions, config};
use meshscan_export::{CaptureSummary, ReplayOptions, anchor_history, replay_capture, synth};
use meshscan_shared::{AnchorId, SCAN_FORMAT};

#[derive(Parser)]
#[command(name = "meshscan-export")]
#[command(about = "MeshScan capture tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a capture through a scan session and export it as OBJ/MTL
    Replay {
        /// Input capture file
        capture: PathBuf,

        /// Output directory (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Feed records at their recorded pace
        #[arg(long)]
        realtime: bool,

        /// Seconds to wait for the export to finish
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Config file (default: the platform config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print record, anchor and geometry totals of a capture
    Info {
        /// Input capture file
        capture: PathBuf,

        /// Only count records mentioning this anchor (UUID)
        #[arg(long)]
        anchor: Option<AnchorId>,
    },

    /// Write a procedurally generated room capture
    Synth {
        /// Output capture file
        #[arg(default_value = "demo_room.mscap")]
        output: PathBuf,
    },

    /// Write a config file with every setting at its default
    InitConfig {
        /// Config file (default: the platform config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            capture,
            output,
            realtime,
            timeout,
            config: config_path,
        } => {
            let records = load_capture(&capture)?;
            tracing::info!("Replaying {:?} ({} records)", capture, records.len());

            let mut config = match config_path {
                Some(path) => config::load_from(&path),
                None => config::load(),
            };
            for warning in config::validate(&config) {
                tracing::warn!("{}", warning);
            }
            if output.is_some() {
                config.export.output_dir = output;
            }
            let session = SessionOptions::from_config(&config)?;

            let options = ReplayOptions {
                realtime,
                export_timeout: Duration::from_secs(timeout),
                ..ReplayOptions::default()
            };
            let report = replay_capture(&records, session, options)
                .with_context(|| format!("Failed to replay {:?}", capture))?;

            tracing::info!(
                "Saved {} anchors: {} vertices, {} triangles",
                report.anchor_count,
                report.saved.vertex_count,
                report.saved.triangle_count
            );
            println!("{}", report.saved.obj_path.display());
        }

        Commands::Info { capture, anchor } => {
            let mut records = load_capture(&capture)?;
            if let Some(id) = anchor {
                records = anchor_history(&records, id);
                if records.is_empty() {
                    bail!("Anchor {} does not appear in {:?}", id, capture);
                }
            }
            println!("{}", CaptureSummary::from_records(&records));
        }

        Commands::Synth { output } => {
            let output = if output.extension().is_none() {
                output.with_extension(SCAN_FORMAT.capture_ext)
            } else {
                output
            };
            let records = synth::demo_room();
            save_capture(&output, &records)?;
            tracing::info!("Wrote {} records to {:?}", records.len(), output);
            println!("{}", output.display());
        }

        Commands::InitConfig { path, force } => {
            let path = path
                .or_else(config::config_path)
                .context("No platform config directory")?;
            if path.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", path);
            }
            config::save_to(&Config::default(), &path)
                .with_context(|| format!("Failed to write {:?}", path))?;
            tracing::info!("Wrote default config to {:?}", path);
            println!("{}", path.display());
        }
    }

    Ok(())
}
