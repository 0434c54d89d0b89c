//! handpose-engine - headless hand-tracking engine runner.

use clap::Parser;
use handpose_engine::headless::{self, BackendChoice, HeadlessConfig};
use handpose_engine::{EngineConfig, LegacyModeHint};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "handpose-engine", about = "Headless hand-tracking engine runner")]
struct Cli {
    /// Backend to use: skeleton, native, null, or auto
    #[arg(long, default_value = "auto")]
    backend: String,

    /// Native detection rate (15-90)
    #[arg(long, default_value_t = 30)]
    max_fps: u32,

    /// Deprecated detection mode hint: auto, legacy, or modern
    #[arg(long, default_value = "auto")]
    legacy_mode: String,

    /// Frame loop rate in Hz
    #[arg(long, default_value_t = 60)]
    tick_hz: u32,

    /// Exit after N seconds
    #[arg(long)]
    exit_after: Option<u64>,

    /// Simulated camera warm-up failures before the camera starts
    #[arg(long, default_value_t = 0)]
    fail_camera_attempts: u32,

    /// Hide platform skeleton tracking so auto falls back
    #[arg(long)]
    no_skeleton: bool,

    /// Seconds between status log lines
    #[arg(long, default_value_t = 5)]
    status_interval: u64,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("handpose-engine {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handpose_engine=info".into()),
        )
        .init();

    info!("handpose-engine v{} starting", env!("CARGO_PKG_VERSION"));
    info!("backend: {}", cli.backend);

    let backend = match cli.backend.parse::<BackendChoice>() {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{e}. Use: skeleton, native, null, or auto");
            std::process::exit(1);
        }
    };
    let legacy_mode_hint = match cli.legacy_mode.parse::<LegacyModeHint>() {
        Ok(hint) => hint,
        Err(e) => {
            eprintln!("{e}. Use: auto, legacy, or modern");
            std::process::exit(1);
        }
    };

    let engine_config = EngineConfig {
        max_fps: cli.max_fps,
        legacy_mode_hint,
        ..EngineConfig::default()
    };
    let config = HeadlessConfig {
        backend,
        tick_hz: cli.tick_hz,
        exit_after: cli.exit_after.map(Duration::from_secs),
        status_interval: Duration::from_secs(cli.status_interval),
        camera_failures: cli.fail_camera_attempts,
        disable_skeleton: cli.no_skeleton,
    };

    headless::run(engine_config, config)
}
