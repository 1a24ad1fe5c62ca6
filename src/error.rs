//! Error type shared by layout, sampling and refresh.

use crate::ScreenSize;
use crate::layout::Rect;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// The screen is too small for the requested LED density.
    #[error("screen {screen} is too small for {vertical} vertical and {horizontal} horizontal LEDs")]
    InvalidLayout {
        screen: ScreenSize,
        vertical: u32,
        horizontal: u32,
    },

    /// A sampling rectangle produced zero samples.
    #[error("zone {rect:?} yields no samples")]
    EmptyRegion { rect: Rect },

    /// A sampling rectangle reaches past the edge of the frame.
    #[error("zone {rect:?} lies outside the {width}x{height} frame")]
    RegionOutOfBounds { rect: Rect, width: u32, height: u32 },

    /// The source had no frame ready; the cycle is skipped.
    #[error("no frame available")]
    FrameUnavailable,

    /// Frame bytes don't match the declared geometry.
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },
}

pub type Result<T> = std::result::Result<T, ZoneError>;
