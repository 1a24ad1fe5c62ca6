//! Average the color of a zone without touching every pixel.
//!
//! A zone on a 4K screen can cover tens of thousands of pixels, and every
//! refresh has to average dozens of zones. Instead of reading all of them we
//! walk a coarse grid: roughly `step_budget` samples along each axis. On a
//! uniform region the result is exact; on busy content it is a close enough
//! approximation for a light strip.

use crate::frame::{BYTES_PER_PIXEL, FrameBuffer};
use crate::layout::Rect;
use crate::{Color, Result, ZoneError};

/// Averages below this on every channel count as "black".
const LOW_LIGHT_THRESHOLD: u64 = 2;

/// Substituted for near-black so the strip doesn't switch fully off on
/// capture noise.
pub const LOW_LIGHT_FLOOR: Color = Color::new(5, 5, 5);

/// Average color of `rect` in `buffer`, sampled on a grid of about
/// `step_budget` points per axis.
///
/// A `step_budget` of 0 is treated as 1. Returns [`ZoneError::EmptyRegion`]
/// if the grid ends up with no samples and [`ZoneError::RegionOutOfBounds`]
/// if `rect` doesn't fit inside the buffer.
pub fn average(rect: Rect, buffer: &FrameBuffer<'_>, step_budget: u32) -> Result<Color> {
    if !rect.fits_within(buffer.width(), buffer.height()) {
        return Err(ZoneError::RegionOutOfBounds {
            rect,
            width: buffer.width(),
            height: buffer.height(),
        });
    }

    let budget = step_budget.max(1);
    let step_x = (rect.width / budget).max(1) as usize;
    let step_y = (rect.height / budget).max(1) as usize;
    let steps_per_row = rect.width as usize / step_x;

    let [r_off, g_off, b_off] = buffer.format().channel_offsets();
    let stride_bytes = step_x * BYTES_PER_PIXEL;

    let (mut sum_r, mut sum_g, mut sum_b) = (0u64, 0u64, 0u64);
    let mut rows = 0u64;

    for y in (rect.y..rect.bottom()).step_by(step_y) {
        let row = buffer.row(y);
        let start = rect.x as usize * BYTES_PER_PIXEL;
        for px in row[start..].chunks(stride_bytes).take(steps_per_row) {
            sum_r += px[r_off] as u64;
            sum_g += px[g_off] as u64;
            sum_b += px[b_off] as u64;
        }
        rows += 1;
    }

    let count = steps_per_row as u64 * rows;
    if count == 0 {
        return Err(ZoneError::EmptyRegion { rect });
    }

    let (r, g, b) = (sum_r / count, sum_g / count, sum_b / count);
    if r < LOW_LIGHT_THRESHOLD && g < LOW_LIGHT_THRESHOLD && b < LOW_LIGHT_THRESHOLD {
        return Ok(LOW_LIGHT_FLOOR);
    }

    Ok(Color::new(r as u8, g as u8, b as u8))
}
