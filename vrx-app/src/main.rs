//! vrx
//!
//! Headless driver for the camera-control and experiment transition runtime.
//!
//! Features:
//! - Mouse-look or simulated headset camera base
//! - Cross-fading between built-in experiments
//! - A scripted guided tour run through the sequencer

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vrx_app::{RunOptions, RuntimeConfig};

/// vrx - camera control and experiment transitions
#[derive(Parser, Debug)]
#[command(name = "vrx")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON runtime config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Simulated frame duration in milliseconds
    #[arg(long, default_value_t = 16.0)]
    frame_ms: f32,

    /// Start with a connected (simulated) headset
    #[arg(long)]
    hmd: bool,

    /// Experiment to show first, overriding the config
    #[arg(short, long)]
    experiment: Option<String>,
}

fn main() {
    vrx_app::init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };
    if let Some(experiment) = args.experiment {
        config.initial_experiment = experiment;
    }
    info!(frames = args.frames, frame_ms = args.frame_ms, hmd = args.hmd, "starting vrx");

    let options = RunOptions {
        config,
        frames: args.frames,
        frame_ms: args.frame_ms,
        hmd: args.hmd,
    };
    if let Err(e) = vrx_app::run(options) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
