//! Captured frames and the sources that produce them.
//!
//! The real screen-capture mechanism lives outside this crate. All the
//! sampler needs is something implementing [`FrameSource`] that hands out
//! owned [`Frame`]s, plus a way to re-read the screen resolution.
//!
//! ## Rust concepts
//! - Traits as the seam to an external collaborator
//! - Borrowed views (`FrameBuffer<'a>`) over owned data (`Frame`)
//! - Validating once at construction so the hot loop can index freely
//! - `Drop` releasing the pixel buffer on every exit path

use crate::{Color, Result, ScreenSize, ZoneError};
use image::ImageReader;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Bytes per pixel for every supported format.
pub const BYTES_PER_PIXEL: usize = 4;

// ── Pixel format ─────────────────────────────────────────────────────

/// Channel order of a 4-byte pixel. The fourth byte is ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red, unused. What desktop capture APIs usually hand out.
    #[default]
    Bgrx,
    /// Red, green, blue, unused.
    Rgbx,
}

impl PixelFormat {
    /// Byte offsets of the red, green and blue channels within a pixel.
    pub const fn channel_offsets(self) -> [usize; 3] {
        match self {
            PixelFormat::Bgrx => [2, 1, 0],
            PixelFormat::Rgbx => [0, 1, 2],
        }
    }

    /// Encode `color` as one pixel in this format.
    pub fn encode(self, color: Color) -> [u8; BYTES_PER_PIXEL] {
        match self {
            PixelFormat::Bgrx => [color.b, color.g, color.r, 0xFF],
            PixelFormat::Rgbx => [color.r, color.g, color.b, 0xFF],
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// One captured image, owned by whoever is refreshing.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap raw pixel bytes. Geometry is checked by [`Frame::buffer`].
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            stride,
            format,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// A tightly packed frame filled with a single color.
    pub fn solid(width: u32, height: u32, color: Color, format: PixelFormat) -> Self {
        let pixel = format.encode(color);
        let data = pixel.repeat(width as usize * height as usize);
        Self::new(data, width, height, width as usize * BYTES_PER_PIXEL, format, 0)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize::new(self.width, self.height)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Borrow a validated read-only view of the pixels.
    pub fn buffer(&self) -> Result<FrameBuffer<'_>> {
        FrameBuffer::new(&self.data, self.width, self.height, self.stride, self.format)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("size", &self.data.len())
            .finish()
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────────

/// Read-only view over a frame's pixels.
///
/// Construction checks that `stride` covers a full row and that `data`
/// holds every row, so [`FrameBuffer::row`] can't run off the end for any
/// `y < height`.
#[derive(Clone, Copy, Debug)]
pub struct FrameBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> FrameBuffer<'a> {
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self> {
        let overflow = || ZoneError::InvalidFrame {
            reason: format!("{width}x{height} with stride {stride} overflows the address space"),
        };

        let row_bytes = (width as usize)
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(overflow)?;
        if stride < row_bytes {
            return Err(ZoneError::InvalidFrame {
                reason: format!("stride {stride} is shorter than a {width}-pixel row"),
            });
        }

        let needed = match height {
            0 => 0,
            h => stride
                .checked_mul(h as usize - 1)
                .and_then(|n| n.checked_add(row_bytes))
                .ok_or_else(overflow)?,
        };
        if data.len() < needed {
            return Err(ZoneError::InvalidFrame {
                reason: format!(
                    "{width}x{height} with stride {stride} needs {needed} bytes, got {}",
                    data.len()
                ),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The pixel bytes of row `y`, exactly `width * 4` long.
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(y < self.height, "row {y} out of range for height {}", self.height);
        let start = self.stride * y as usize;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// Read one pixel. Panics if `(x, y)` lies outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let [r, g, b] = self.format.channel_offsets();
        let base = x as usize * BYTES_PER_PIXEL;
        let px = &self.row(y)[base..base + BYTES_PER_PIXEL];
        Color::new(px[r], px[g], px[b])
    }
}

// ── FrameSource ──────────────────────────────────────────────────────

/// Something that can capture the screen.
///
/// Implementations own whatever capture session they need; the sampler
/// only ever asks for one frame at a time and drops it before returning.
pub trait FrameSource {
    /// Current resolution as last seen by the source.
    fn frame_dimensions(&self) -> ScreenSize;

    /// Grab a fresh frame, or `None` if the source isn't ready yet.
    fn capture_frame(&mut self) -> Option<Frame>;

    /// Forget any cached resolution so the next
    /// [`frame_dimensions`](FrameSource::frame_dimensions) call re-reads it.
    fn invalidate_resolution_cache(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_dimensions(&self) -> ScreenSize {
        (**self).frame_dimensions()
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        (**self).capture_frame()
    }

    fn invalidate_resolution_cache(&mut self) {
        (**self).invalidate_resolution_cache()
    }
}

// ── Synthetic source ─────────────────────────────────────────────────

/// Generates a scrolling rainbow instead of capturing a real screen.
///
/// Handy for running the pipeline on a machine without a capture backend.
/// A resolution change requested with [`SyntheticSource::set_resolution`]
/// behaves like a real display change: frames switch size immediately, but
/// [`FrameSource::frame_dimensions`] keeps reporting the old size until the
/// cache is invalidated.
#[derive(Debug)]
pub struct SyntheticSource {
    actual: ScreenSize,
    cached: ScreenSize,
    hue_step: u16,
    sequence: u64,
}

impl SyntheticSource {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            actual: size,
            cached: size,
            hue_step: 3,
            sequence: 0,
        }
    }

    /// Simulate the display switching resolution.
    pub fn set_resolution(&mut self, size: ScreenSize) {
        self.actual = size;
    }
}

impl FrameSource for SyntheticSource {
    fn frame_dimensions(&self) -> ScreenSize {
        self.cached
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        let ScreenSize { width, height } = self.actual;
        let format = PixelFormat::Bgrx;
        let offset = (self.sequence % 360) as u16 * self.hue_step;

        // Build one row, then repeat it: every row of the pattern is identical.
        let mut row = Vec::with_capacity(width as usize * BYTES_PER_PIXEL);
        for x in 0..width {
            let hue = ((x as u64 * 360 / width.max(1) as u64) as u16 + offset) % 360;
            row.extend_from_slice(&format.encode(Color::from_hue(hue)));
        }
        let data = row.repeat(height as usize);

        let frame = Frame::new(
            data,
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            format,
            self.sequence,
        );
        self.sequence += 1;
        Some(frame)
    }

    fn invalidate_resolution_cache(&mut self) {
        self.cached = self.actual;
    }
}

// ── Image directory source ───────────────────────────────────────────

/// Replays screenshots from a directory, looping forever.
///
/// Frames are decoded lazily, one per capture. A file that fails to decode
/// is logged and reported as "no frame", which skips one refresh cycle.
#[derive(Debug)]
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    cached: ScreenSize,
    sequence: u64,
}

impl ImageDirSource {
    /// Collect the PNG and JPEG files in `dir`, sorted by name.
    pub fn open(dir: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let paths = load_frame_paths(dir)?;
        let cached = read_dimensions(&paths[0])?;

        tracing::info!(
            "Replaying {} frames from {} ({})",
            paths.len(),
            dir.display(),
            cached
        );

        Ok(Self {
            paths,
            next: 0,
            cached,
            sequence: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageDirSource {
    fn frame_dimensions(&self) -> ScreenSize {
        self.cached
    }

    fn capture_frame(&mut self) -> Option<Frame> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();

        let img = match ImageReader::open(path)
            .map_err(image::ImageError::from)
            .and_then(|r| r.decode())
        {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                tracing::warn!("Failed to decode frame {}: {}", path.display(), e);
                return None;
            }
        };

        let (width, height) = img.dimensions();
        let frame = Frame::new(
            img.into_raw(),
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            PixelFormat::Rgbx,
            self.sequence,
        );
        self.sequence += 1;
        Some(frame)
    }

    fn invalidate_resolution_cache(&mut self) {
        match read_dimensions(&self.paths[self.next]) {
            Ok(size) => self.cached = size,
            Err(e) => tracing::warn!("Could not re-read frame size, keeping {}: {}", self.cached, e),
        }
    }
}

/// Discover and sort all frame image files in a directory.
fn load_frame_paths(dir: &Path) -> std::result::Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "png" | "jpg" | "jpeg"));

        if is_image && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();

    if paths.is_empty() {
        return Err(format!("No image files found in {}", dir.display()).into());
    }

    Ok(paths)
}

fn read_dimensions(path: &Path) -> std::result::Result<ScreenSize, image::ImageError> {
    let (width, height) = image::image_dimensions(path)?;
    Ok(ScreenSize::new(width, height))
}
