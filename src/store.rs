//! The latest zone colors, shared between one producer and many readers.
//!
//! ## Rust concepts
//! - `ArcSwap<T>`: readers grab an `Arc` snapshot without ever blocking,
//!   the writer publishes a whole new value in one atomic swap
//! - `Mutex<()>` as a pure writer guard, so refresh and reconfigure never
//!   interleave
//! - RAII: the captured frame is dropped on every exit path of `refresh`
//!
//! A reader always sees one complete `ZoneSet`: either entirely from the
//! previous refresh or entirely from the new one, never a mix. Because a
//! reconfigure swaps in a new set the same way, the number of zones in a
//! snapshot always matches the LED counts stored alongside it.

use crate::frame::{Frame, FrameSource};
use crate::layout::{self, ZoneSet};
use crate::sampler;
use crate::{Result, ScreenSize, StripConfig, ZoneError};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// What a call to [`SampleStore::refresh`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New colors were published, computed from frame `sequence`.
    Updated { sequence: u64, captured_at: Instant },
    /// Nothing changed; the previous colors are still live.
    Skipped(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The source had no frame ready.
    NoFrame,
    /// The frame doesn't match the resolution the layout was built for.
    /// A reconfigure is needed to pick up the new size.
    SizeMismatch { frame: ScreenSize, layout: ScreenSize },
}

pub struct SampleStore {
    current: ArcSwap<ZoneSet>,
    writer: Mutex<()>,
}

impl SampleStore {
    /// Build the initial layout from the source's current resolution.
    pub fn new<S: FrameSource + ?Sized>(source: &S, strip: StripConfig) -> Result<Self> {
        let set = layout::compute(source.frame_dimensions(), strip)?;
        Ok(Self::with_layout(set))
    }

    /// Start from an already computed layout.
    pub fn with_layout(set: ZoneSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(set),
            writer: Mutex::new(()),
        }
    }

    /// The current zones and colors. Never blocks.
    pub fn snapshot(&self) -> Arc<ZoneSet> {
        self.current.load_full()
    }

    /// Capture one frame and recompute every zone's color.
    ///
    /// A missing frame or a frame of the wrong size skips the cycle and
    /// leaves the previous colors in place. Errors are only returned for
    /// broken invariants: a frame whose bytes don't match its declared
    /// geometry, or a zone that yields no samples.
    pub fn refresh<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        step_budget: u32,
    ) -> Result<RefreshOutcome> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let frame = match acquire(source) {
            Ok(frame) => frame,
            Err(ZoneError::FrameUnavailable) => {
                tracing::debug!("No frame available, keeping previous colors");
                return Ok(RefreshOutcome::Skipped(SkipReason::NoFrame));
            }
            Err(e) => return Err(e),
        };

        let current = self.current.load();
        if frame.size() != current.screen() {
            tracing::debug!(
                "Frame is {} but layout expects {}, skipping",
                frame.size(),
                current.screen()
            );
            return Ok(RefreshOutcome::Skipped(SkipReason::SizeMismatch {
                frame: frame.size(),
                layout: current.screen(),
            }));
        }

        let buffer = frame.buffer()?;
        let mut next = ZoneSet::clone(&current);
        for zone in next.zones_mut() {
            zone.color = sampler::average(zone.rect, &buffer, step_budget)?;
        }

        self.current.store(Arc::new(next));
        Ok(RefreshOutcome::Updated {
            sequence: frame.sequence(),
            captured_at: frame.captured_at(),
        })
    }

    /// Switch to a new LED configuration, re-reading the screen size.
    ///
    /// On [`ZoneError::InvalidLayout`] the previous layout stays active.
    pub fn reconfigure<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        strip: StripConfig,
    ) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        source.invalidate_resolution_cache();
        let screen = source.frame_dimensions();
        let set = layout::compute(screen, strip)?;

        tracing::info!(
            "Layout: {} vertical + {} horizontal LEDs on {} ({} zones)",
            strip.vertical,
            strip.horizontal,
            screen,
            set.len()
        );

        self.current.store(Arc::new(set));
        Ok(())
    }
}

fn acquire<S: FrameSource + ?Sized>(source: &mut S) -> Result<Frame> {
    source.capture_frame().ok_or(ZoneError::FrameUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;
    use crate::frame::{PixelFormat, SyntheticSource};
    use crate::sampler::LOW_LIGHT_FLOOR;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::thread;

    /// Hands out a scripted sequence of frames, then solid frames of `fill`.
    struct ScriptedSource {
        size: ScreenSize,
        pending_size: ScreenSize,
        script: VecDeque<Option<Frame>>,
        fill: Color,
    }

    impl ScriptedSource {
        fn new(width: u32, height: u32, fill: Color) -> Self {
            let size = ScreenSize::new(width, height);
            Self {
                size,
                pending_size: size,
                script: VecDeque::new(),
                fill,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn frame_dimensions(&self) -> ScreenSize {
            self.size
        }

        fn capture_frame(&mut self) -> Option<Frame> {
            match self.script.pop_front() {
                Some(next) => next,
                None => Some(Frame::solid(
                    self.pending_size.width,
                    self.pending_size.height,
                    self.fill,
                    PixelFormat::Bgrx,
                )),
            }
        }

        fn invalidate_resolution_cache(&mut self) {
            self.size = self.pending_size;
        }
    }

    /// Uniform frames whose color encodes the cycle number `k`.
    struct CountingSource {
        k: u8,
    }

    fn cycle_color(k: u8) -> Color {
        Color::new(k, 255 - k, k / 2)
    }

    impl FrameSource for CountingSource {
        fn frame_dimensions(&self) -> ScreenSize {
            ScreenSize::new(160, 90)
        }

        fn capture_frame(&mut self) -> Option<Frame> {
            self.k = self.k.wrapping_add(1);
            Some(Frame::solid(160, 90, cycle_color(self.k), PixelFormat::Rgbx))
        }

        fn invalidate_resolution_cache(&mut self) {}
    }

    fn assert_uniform(set: &ZoneSet, expected: Color) {
        for (i, zone) in set.zones().enumerate() {
            assert_eq!(zone.color, expected, "zone {i}");
        }
    }

    #[test]
    fn refresh_colors_every_zone() {
        let mut source = ScriptedSource::new(640, 360, Color::new(200, 100, 50));
        let store = SampleStore::new(&source, StripConfig::new(4, 8)).unwrap();

        let before = Instant::now();
        let outcome = store.refresh(&mut source, 15).unwrap();
        let RefreshOutcome::Updated { sequence, captured_at } = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert_eq!(sequence, 0);
        assert!(captured_at >= before && captured_at <= Instant::now());

        let snap = store.snapshot();
        assert_eq!(snap.len(), 28);
        assert_uniform(&snap, Color::new(200, 100, 50));
    }

    #[test]
    fn black_screen_gives_low_light_floor() {
        let mut source = ScriptedSource::new(640, 360, Color::BLACK);
        let store = SampleStore::new(&source, StripConfig::default()).unwrap();
        store.refresh(&mut source, 15).unwrap();
        assert_uniform(&store.snapshot(), LOW_LIGHT_FLOOR);
    }

    #[test]
    fn missing_frame_keeps_previous_colors() {
        let mut source = ScriptedSource::new(640, 360, Color::new(10, 20, 30));
        let store = SampleStore::new(&source, StripConfig::default()).unwrap();
        store.refresh(&mut source, 15).unwrap();

        source.script.push_back(None);
        let outcome = store.refresh(&mut source, 15).unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped(SkipReason::NoFrame));
        assert_uniform(&store.snapshot(), Color::new(10, 20, 30));
    }

    #[test]
    fn resolution_change_is_skipped_until_reconfigure() {
        let mut source = ScriptedSource::new(640, 360, Color::new(10, 20, 30));
        let store = SampleStore::new(&source, StripConfig::default()).unwrap();
        store.refresh(&mut source, 15).unwrap();

        source.pending_size = ScreenSize::new(320, 180);
        source.fill = Color::new(90, 90, 90);
        let outcome = store.refresh(&mut source, 15).unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Skipped(SkipReason::SizeMismatch {
                frame: ScreenSize::new(320, 180),
                layout: ScreenSize::new(640, 360),
            })
        );
        assert_uniform(&store.snapshot(), Color::new(10, 20, 30));

        store.reconfigure(&mut source, StripConfig::default()).unwrap();
        assert_eq!(store.snapshot().screen(), ScreenSize::new(320, 180));

        store.refresh(&mut source, 15).unwrap();
        assert_uniform(&store.snapshot(), Color::new(90, 90, 90));
    }

    #[test]
    fn malformed_frame_is_an_error() {
        let mut source = ScriptedSource::new(64, 64, Color::BLACK);
        let store = SampleStore::new(&source, StripConfig::new(1, 1)).unwrap();
        source
            .script
            .push_back(Some(Frame::new(vec![0; 16], 64, 64, 256, PixelFormat::Bgrx, 0)));

        let err = store.refresh(&mut source, 15).unwrap_err();
        assert!(matches!(err, ZoneError::InvalidFrame { .. }));
    }

    #[test]
    fn reconfigure_changes_zone_count() {
        let mut source = SyntheticSource::new(ScreenSize::new(1920, 1080));
        let store = SampleStore::new(&source, StripConfig::new(4, 8)).unwrap();

        for (v, h) in [(10, 16), (0, 3), (7, 0), (30, 60)] {
            store
                .reconfigure(&mut source, StripConfig::new(v, h))
                .unwrap();
            let snap = store.snapshot();
            assert_eq!(snap.len(), (2 * v + 2 * h + 4) as usize);
            assert_eq!(snap.num_vertical_leds(), v);
            assert_eq!(snap.num_horizontal_leds(), h);
        }
    }

    #[test]
    fn invalid_reconfigure_keeps_previous_layout() {
        let mut source = ScriptedSource::new(100, 100, Color::new(40, 40, 40));
        let store = SampleStore::new(&source, StripConfig::new(2, 2)).unwrap();
        store.refresh(&mut source, 15).unwrap();
        let before = store.snapshot();

        let err = store
            .reconfigure(&mut source, StripConfig::new(200, 2))
            .unwrap_err();
        assert!(matches!(err, ZoneError::InvalidLayout { vertical: 200, .. }));

        let after = store.snapshot();
        assert_eq!(*after, *before);
        assert_eq!(after.len(), 12);
    }

    #[test]
    fn new_rejects_too_dense_strip() {
        let source = ScriptedSource::new(10, 10, Color::BLACK);
        assert!(SampleStore::new(&source, StripConfig::new(20, 20)).is_err());
    }

    #[test]
    fn snapshots_never_mix_refresh_cycles() {
        let store = Arc::new(SampleStore::new(&CountingSource { k: 0 }, StripConfig::new(4, 8)).unwrap());
        let mut source = CountingSource { k: 0 };
        store.refresh(&mut source, 15).unwrap();

        let producer = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..5_000 {
                    store.refresh(&mut source, 15).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2_500 {
                        let snap = store.snapshot();
                        let first = snap.edges()[0].color;
                        // Every channel must come from the same cycle...
                        assert_eq!(first, cycle_color(first.r));
                        // ...and so must every zone.
                        assert!(snap.zones().all(|z| z.color == first));
                    }
                })
            })
            .collect();

        producer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn reconfigure_is_never_overwritten_by_a_stale_refresh() {
        let store = Arc::new(SampleStore::new(&CountingSource { k: 0 }, StripConfig::new(4, 8)).unwrap());

        let producer = {
            let store = store.clone();
            thread::spawn(move || {
                let mut source = CountingSource { k: 0 };
                for _ in 0..3_000 {
                    store.refresh(&mut source, 15).unwrap();
                }
            })
        };

        let mut source = CountingSource { k: 0 };
        for i in 0..500u32 {
            let strip = StripConfig::new(i % 5, (i * 3) % 7);
            store.reconfigure(&mut source, strip).unwrap();
            let snap = store.snapshot();
            assert_eq!(snap.len(), strip.zone_count());
            assert_eq!(snap.strip(), strip);
        }

        producer.join().unwrap();
    }
}
