//! Cam-scan binary: scan QR codes from a V4L2 camera.

use std::path::PathBuf;
use std::process::ExitCode;

use cam_scan::traits::Result;
use cam_scan::{CaptureConfig, Facing, QrOracle, ScanEvent, Scanner, V4L2Provider};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Scan QR codes from a camera and print their contents.
#[derive(Debug, Parser)]
#[command(name = "cam-scan", version)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera facing: front, back, or a label fragment
    #[arg(short, long)]
    facing: Option<Facing>,

    /// Raster width
    #[arg(long)]
    width: Option<u32>,

    /// Raster height
    #[arg(long)]
    height: Option<u32>,

    /// Milliseconds between capture ticks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Mirror the preview instead of flipping the raster
    #[arg(long)]
    mirrored: bool,

    /// Sample only the centered square of each frame
    #[arg(long)]
    square_crop: bool,

    /// Exit after the first decoded value
    #[arg(long)]
    once: bool,

    /// Log recoverable failures
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> Result<CaptureConfig> {
        let mut config = match &self.config {
            Some(path) => CaptureConfig::load(path)?,
            None => CaptureConfig::default(),
        };

        if let Some(facing) = self.facing {
            config.facing = facing;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.update_interval_ms = interval_ms;
        }
        config.mirrored |= self.mirrored;
        config.square_crop |= self.square_crop;
        config.stop_after_scan |= self.once;
        config.debug |= self.debug;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = args.into_config()?;
    let once = config.stop_after_scan;
    let (mut scanner, mut events) = Scanner::new(V4L2Provider::detect(), QrOracle::new(), config);

    scanner.start().await;

    let code = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ScanEvent::Read(text)) => {
                    println!("{text}");
                    if once {
                        break ExitCode::SUCCESS;
                    }
                }
                Some(ScanEvent::DeviceNotAllowed) => {
                    eprintln!("Error: camera access denied or no camera available");
                    break ExitCode::FAILURE;
                }
                Some(ScanEvent::UnsupportedPlatform) => {
                    eprintln!("Error: no V4L2 camera support on this system");
                    break ExitCode::FAILURE;
                }
                None => break ExitCode::SUCCESS,
            },
            _ = tokio::signal::ctrl_c() => break ExitCode::SUCCESS,
        }
    };

    scanner.stop().await;
    Ok(code)
}
