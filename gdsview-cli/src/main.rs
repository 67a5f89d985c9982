use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gdsview_core::EngineConfig;

mod commands;
mod manifest;

#[derive(Parser)]
#[command(name = "gdsview")]
#[command(about = "gdsview - visibility and level-of-detail diagnostics for large layouts")]
#[command(version)]
#[command(long_about = "
Drives the gdsview core outside of a renderer: compute viewport bounds and zoom
limits, or replay a sequence of zoom scales over a tile manifest and watch the
visibility counters and LOD decisions frame by frame.

Examples:
  gdsview bounds --width 1000 --height 800 --scale-x 2 --scale-y -2
  gdsview zoom-limits --width-db 1000 --scale 1
  gdsview simulate --manifest tiles.json --scales 1,4,16,0.5
  gdsview config > gdsview.toml
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the world rectangle covered by a screen transform
    Bounds {
        /// Screen width in pixels
        #[arg(long, default_value = "1000")]
        width: f64,

        /// Screen height in pixels
        #[arg(long, default_value = "800")]
        height: f64,

        /// Container x offset in pixels
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        container_x: f64,

        /// Container y offset in pixels
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        container_y: f64,

        /// Horizontal scale (pixels per database unit)
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        scale_x: f64,

        /// Vertical scale, usually negative
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        scale_y: f64,
    },

    /// Print the minimum and maximum zoom scale for a viewport
    ZoomLimits {
        /// Visible width in database units
        #[arg(long)]
        width_db: f64,

        /// Current scale
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        scale: f64,

        /// Database unit in metres
        #[arg(long, default_value = "1e-9")]
        database_unit: f64,
    },

    /// Replay zoom scales over a tile manifest
    Simulate {
        /// Tile manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Screen width in pixels
        #[arg(long, default_value = "1000")]
        width: f64,

        /// Screen height in pixels
        #[arg(long, default_value = "800")]
        height: f64,

        /// Comma separated zoom scales, one frame each
        #[arg(long, value_delimiter = ',', default_value = "1")]
        scales: Vec<f64>,

        /// Outline rendering: re-render on every significant zoom
        #[arg(long)]
        outline: bool,

        /// Print frames as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Bounds {
            width,
            height,
            container_x,
            container_y,
            scale_x,
            scale_y,
        } => commands::bounds::execute(width, height, container_x, container_y, scale_x, scale_y),
        Commands::ZoomLimits {
            width_db,
            scale,
            database_unit,
        } => commands::zoom_limits::execute(width_db, scale, database_unit),
        Commands::Simulate {
            manifest,
            width,
            height,
            scales,
            outline,
            json,
        } => {
            let options = commands::simulate::SimulateOptions {
                width,
                height,
                scales,
                outline,
                json,
            };
            commands::simulate::execute(&config, &manifest, &options)
        }
        Commands::Config => commands::config::execute(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}
