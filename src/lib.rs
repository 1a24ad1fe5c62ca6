//! Screen-edge zone sampling for ambient LED strips.
//!
//! The crate turns a live screen image into one averaged color per LED:
//! - [`layout`] partitions the screen edge into non-overlapping zones
//! - [`frame`] describes captured frames and the sources that produce them
//! - [`sampler`] averages a zone cheaply with a sub-sampling stride
//! - [`store`] publishes the latest colors to any number of reader threads
//!
//! The refresh loop ([`refresh`]) and HTTP API ([`server`]) wire these
//! together for the main binary.

pub mod error;
pub mod frame;
pub mod layout;
pub mod refresh;
pub mod sampler;
pub mod server;
pub mod store;

pub use error::{Result, ZoneError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ── Screen size ────────────────────────────────────────────────────

/// Pixel dimensions of the capture source.
///
/// # Rust concept: passing values instead of caching globals
/// The layout is always computed from an explicit `ScreenSize`. When the
/// resolution changes, the caller queries the source again and passes the
/// new value in; nothing is cached behind the caller's back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Strip configuration ────────────────────────────────────────────

/// How many LEDs run along each side of the screen.
///
/// `vertical` LEDs sit on the left edge and again on the right edge,
/// `horizontal` LEDs on the top and again on the bottom. The four corners
/// get their own zones on top of that.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StripConfig {
    pub vertical: u32,
    pub horizontal: u32,
}

impl StripConfig {
    pub fn new(vertical: u32, horizontal: u32) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    /// Number of edge LEDs around the whole perimeter.
    pub fn led_count(&self) -> usize {
        2 * self.vertical as usize + 2 * self.horizontal as usize
    }

    /// Edge zones plus the four corner zones.
    pub fn zone_count(&self) -> usize {
        self.led_count() + 4
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            vertical: 4,
            horizontal: 8,
        }
    }
}

// ── Sampler options ────────────────────────────────────────────────

/// Sub-sampling budget used when the caller doesn't pick one.
pub const DEFAULT_STEP_BUDGET: u32 = 15;

/// Knobs for the refresh loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerOptions {
    /// Roughly how many samples to take along each axis of a zone.
    pub step_budget: u32,
    /// Refresh cycles per second.
    pub fps: u32,
}

impl SamplerOptions {
    /// Target time between two refresh cycles.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps.max(1) as u64)
    }
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            fps: 30,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// An RGB triple, one byte per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    ///
    /// The synthetic frame source uses this to paint test patterns.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),
            1 => Self::new(falling, 255, 0),
            2 => Self::new(0, 255, rising),
            3 => Self::new(0, falling, 255),
            4 => Self::new(rising, 0, 255),
            5 => Self::new(255, 0, falling),
            _ => Self::new(255, 0, 0),
        }
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The refresh thread and the signal handler share one flag. `Arc` gives
/// both of them ownership; `AtomicBool` makes the flag safe to flip from
/// the handler without a mutex.
pub fn setup_signal_handler() -> std::result::Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the refresh loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
