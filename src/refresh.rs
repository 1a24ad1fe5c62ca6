//! Refresh thread: owns the frame source and drives the sample store.
//!
//! Capture APIs are usually tied to the thread that opened them, so the
//! source lives on one dedicated `std::thread`. Everyone else talks to it by
//! sending [`SamplerCommand`] values through an `mpsc` channel, and reads
//! colors straight from the shared [`SampleStore`].
//!
//! ## Rust concepts
//! - `std::sync::mpsc` channels for thread communication
//! - `tokio::sync::oneshot` to hand a result back to an async caller
//! - `Arc<Mutex<T>>` for the status the HTTP server reports
//! - `try_recv()` so commands never stall the refresh cadence

use crate::frame::FrameSource;
use crate::store::{RefreshOutcome, SampleStore, SkipReason};
use crate::{Result, SamplerOptions, ScreenSize, StripConfig, is_running};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// How many slow cycles to log before going quiet.
const SLOW_CYCLE_LOG_LIMIT: u64 = 5;

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent to the refresh thread.
pub enum SamplerCommand {
    /// Switch LED counts; the outcome is sent back through `reply`.
    Reconfigure {
        strip: StripConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Change the refresh cadence.
    SetFps(u32),
    /// Leave the loop.
    Stop,
}

// ── Status ───────────────────────────────────────────────────────────

/// What the refresh thread is currently doing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SamplerState {
    Starting,
    /// Colors are being updated.
    Running,
    /// The last cycle was skipped: no frame, or a frame of the wrong size.
    Waiting,
    Stopped,
}

/// Shared status: the refresh thread writes, HTTP handlers read.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct SamplerStatus {
    pub state: SamplerState,
    /// Active LED configuration
    pub strip: StripConfig,
    /// Resolution the active layout was built for
    pub screen: ScreenSize,
    pub fps: u32,
    pub step_budget: u32,
    /// Cycles that published new colors
    pub cycles: u64,
    /// Cycles that kept the previous colors
    pub skipped: u64,
    /// Cycles that overran the frame interval
    pub slow_cycles: u64,
    /// Time from capture to publish for the latest colors
    pub last_frame_age_ms: Option<u64>,
    pub last_error: Option<String>,
    pub version: String,
}

impl SamplerStatus {
    pub fn new(strip: StripConfig, screen: ScreenSize, options: SamplerOptions) -> Self {
        Self {
            state: SamplerState::Starting,
            strip,
            screen,
            fps: options.fps,
            step_budget: options.step_budget,
            cycles: 0,
            skipped: 0,
            slow_cycles: 0,
            last_frame_age_ms: None,
            last_error: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn lock(status: &Mutex<SamplerStatus>) -> std::sync::MutexGuard<'_, SamplerStatus> {
    status.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Refresh loop ─────────────────────────────────────────────────────

/// Main refresh loop. Runs until `running` goes false, a `Stop` command
/// arrives, the command channel closes, or refreshing hits a fatal error.
pub fn refresh_loop<S: FrameSource>(
    rx: Receiver<SamplerCommand>,
    store: Arc<SampleStore>,
    mut source: S,
    mut options: SamplerOptions,
    status: Arc<Mutex<SamplerStatus>>,
    running: Arc<AtomicBool>,
) {
    let mut frame_interval = options.frame_interval();
    let mut size_mismatch_logged = false;

    tracing::info!(
        "Refresh thread started: {} fps, step budget {}",
        options.fps,
        options.step_budget
    );

    'refresh: while is_running(&running) {
        // Handle every pending command before sampling
        loop {
            match rx.try_recv() {
                Ok(SamplerCommand::Reconfigure { strip, reply }) => {
                    let result = store.reconfigure(&mut source, strip);
                    match &result {
                        Ok(()) => {
                            let snap = store.snapshot();
                            let mut s = lock(&status);
                            s.strip = snap.strip();
                            s.screen = snap.screen();
                            size_mismatch_logged = false;
                        }
                        Err(e) => {
                            tracing::error!("Rejected layout {:?}: {}", strip, e);
                        }
                    }
                    // The caller may have given up waiting; that's fine.
                    let _ = reply.send(result);
                }
                Ok(SamplerCommand::SetFps(fps)) => {
                    options.fps = fps.max(1);
                    frame_interval = options.frame_interval();
                    lock(&status).fps = options.fps;
                    tracing::info!("Refresh rate set to {} fps", options.fps);
                }
                Ok(SamplerCommand::Stop) => {
                    tracing::info!("Refresh thread: stop requested.");
                    break 'refresh;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Refresh thread: channel closed, shutting down.");
                    break 'refresh;
                }
            }
        }

        let cycle_start = Instant::now();

        match store.refresh(&mut source, options.step_budget) {
            Ok(RefreshOutcome::Updated { captured_at, .. }) => {
                let mut s = lock(&status);
                s.state = SamplerState::Running;
                s.cycles += 1;
                s.last_frame_age_ms = Some(captured_at.elapsed().as_millis() as u64);
            }
            Ok(RefreshOutcome::Skipped(reason)) => {
                if let SkipReason::SizeMismatch { frame, layout } = reason {
                    if !size_mismatch_logged {
                        tracing::warn!(
                            "Screen is now {} but zones were laid out for {}; reconfigure to resume",
                            frame,
                            layout
                        );
                        size_mismatch_logged = true;
                    }
                }
                let mut s = lock(&status);
                s.state = SamplerState::Waiting;
                s.skipped += 1;
            }
            Err(e) => {
                tracing::error!("Refresh failed, stopping: {}", e);
                lock(&status).last_error = Some(e.to_string());
                break 'refresh;
            }
        }

        let cycle_time = cycle_start.elapsed();
        if cycle_time > frame_interval {
            let mut s = lock(&status);
            s.slow_cycles += 1;
            if s.slow_cycles <= SLOW_CYCLE_LOG_LIMIT {
                tracing::warn!(
                    "Refresh took {}ms (target: {}ms)",
                    cycle_time.as_millis(),
                    frame_interval.as_millis()
                );
            }
        }

        thread::sleep(frame_interval.saturating_sub(cycle_time).max(Duration::from_millis(1)));
    }

    lock(&status).state = SamplerState::Stopped;
    tracing::info!("Refresh thread stopped");
}
