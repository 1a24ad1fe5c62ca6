//! Ambilight zone sampler
//!
//! Samples the screen edge into per-LED colors and serves them over HTTP.
//! The real screen-capture backend is pluggable; this binary ships with a
//! synthetic rainbow source and a screenshot-replay source.
//!
//! ## Architecture
//! - **Refresh thread** (std::thread): owns the frame source, refreshes colors
//! - **HTTP server** (tokio/axum): serves colors, forwards layout changes
//!
//! ## Usage
//! ```sh
//! ./target/release/ambilight-zones --vertical 10 --horizontal 16 --port 8080
//! ./target/release/ambilight-zones --frames-dir ./screenshots
//! ```

use ambilight_zones::frame::{FrameSource, ImageDirSource, SyntheticSource};
use ambilight_zones::refresh::{SamplerCommand, SamplerStatus, refresh_loop};
use ambilight_zones::server::{self, AppState};
use ambilight_zones::store::SampleStore;
use ambilight_zones::{SamplerOptions, ScreenSize, StripConfig, setup_signal_handler};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Ambilight zone sampler
#[derive(Parser)]
#[command(name = "ambilight-zones")]
#[command(about = "Turn the screen edge into per-LED colors for an ambient light strip")]
#[command(version)]
struct Args {
    /// LEDs on each of the left and right edges
    #[arg(long, default_value = "4")]
    vertical: u32,

    /// LEDs on each of the top and bottom edges
    #[arg(long, default_value = "8")]
    horizontal: u32,

    /// Approximate samples per zone axis
    #[arg(long, default_value = "15")]
    step_budget: u32,

    /// Refresh cycles per second
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Replay PNG/JPEG screenshots from this directory instead of the synthetic source
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Width of the synthetic source
    #[arg(long, default_value = "1920")]
    width: u32,

    /// Height of the synthetic source
    #[arg(long, default_value = "1080")]
    height: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let strip = StripConfig::new(args.vertical, args.horizontal);
    let options = SamplerOptions {
        step_budget: args.step_budget,
        fps: args.fps.max(1),
    };

    let source: Box<dyn FrameSource + Send> = match &args.frames_dir {
        Some(dir) => Box::new(ImageDirSource::open(dir)?),
        None => Box::new(SyntheticSource::new(ScreenSize::new(args.width, args.height))),
    };
    let screen = source.frame_dimensions();

    tracing::info!("Ambilight zones v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Strip: {} vertical + {} horizontal LEDs ({} zones)",
        strip.vertical,
        strip.horizontal,
        strip.zone_count()
    );
    tracing::info!("Screen: {}", screen);
    tracing::info!("Refresh: {} fps, step budget {}", options.fps, options.step_budget);

    // Fails here, before anything starts, if the screen can't fit the strip.
    let store = Arc::new(SampleStore::new(&source, strip)?);
    let status = Arc::new(Mutex::new(SamplerStatus::new(strip, screen, options)));
    let running = setup_signal_handler()?;

    let (tx, rx) = mpsc::channel();

    let refresh_handle = {
        let store = store.clone();
        let status = status.clone();
        let running = running.clone();
        std::thread::spawn(move || refresh_loop(rx, store, source, options, status, running))
    };

    let app_state = AppState {
        command_tx: tx.clone(),
        status,
        store,
    };
    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API Documentation: http://localhost:{}/docs", args.port);
    tracing::info!("Try: curl http://localhost:{}/api/v1/colors", args.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while ambilight_zones::is_running(&running) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        })
        .await?;

    let _ = tx.send(SamplerCommand::Stop);
    if refresh_handle.join().is_err() {
        tracing::error!("Refresh thread panicked");
    }

    Ok(())
}
