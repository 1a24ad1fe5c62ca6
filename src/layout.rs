//! Zone geometry: map a screen and an LED count onto sampling rectangles.
//!
//! Every zone has the same size. The screen is split into `vertical + 2`
//! rows and `horizontal + 2` columns; the outer ring of that grid becomes
//! the edge zones plus four corner zones. Any remainder from the integer
//! division is split evenly into a margin around the grid.
//!
//! ## Perimeter order
//! Edge zones are stored as one continuous cycle around the screen:
//!
//! ```text
//!            top: [V, V+H)  left → right
//!          ┌───┬───┬───┬───┬───┐
//!          │TL │ → │ → │ → │TR │
//!          ├───┼───┴───┴───┼───┤
//!   left   │ ↑ │           │ ↓ │  right
//! [0, V)   │ ↑ │           │ ↓ │  [V+H, 2V+H)
//!          ├───┼───┬───┬───┼───┤
//!          │BL │ ← │ ← │ ← │BR │
//!          └───┴───┴───┴───┴───┘
//!        bottom: [2V+H, 2V+2H)  right → left
//! ```
//!
//! Index 0 and the last index both touch the bottom-left corner.

use crate::{Color, Result, ScreenSize, StripConfig, ZoneError};
use serde::Serialize;

// ── Rect ─────────────────────────────────────────────────────────────

/// A rectangle in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the rightmost column, saturating at `u32::MAX`.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// One past the bottom row, saturating at `u32::MAX`.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether the rect lies fully inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

// ── Zone ─────────────────────────────────────────────────────────────

/// One sampling rectangle and the color last computed for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Zone {
    #[serde(flatten)]
    pub rect: Rect,
    pub color: Color,
}

impl Zone {
    fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            rect: Rect::new(x, y, width, height),
            color: Color::BLACK,
        }
    }
}

/// Position of a corner zone inside [`ZoneSet::corners`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

// ── ZoneSet ──────────────────────────────────────────────────────────

/// All zones for one screen size and LED configuration.
///
/// A `ZoneSet` is rebuilt from scratch whenever the LED counts or the
/// screen size change; only the colors change between refresh cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ZoneSet {
    screen: ScreenSize,
    strip: StripConfig,
    edges: Vec<Zone>,
    #[schema(value_type = Vec<Zone>)]
    corners: [Zone; 4],
}

impl ZoneSet {
    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn strip(&self) -> StripConfig {
        self.strip
    }

    pub fn num_vertical_leds(&self) -> u32 {
        self.strip.vertical
    }

    pub fn num_horizontal_leds(&self) -> u32 {
        self.strip.horizontal
    }

    /// Edge zones in perimeter order.
    pub fn edges(&self) -> &[Zone] {
        &self.edges
    }

    /// Corner zones: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> &[Zone; 4] {
        &self.corners
    }

    pub fn corner(&self, corner: Corner) -> &Zone {
        &self.corners[corner as usize]
    }

    /// Total number of zones, corners included.
    pub fn len(&self) -> usize {
        self.edges.len() + self.corners.len()
    }

    /// Never true: the four corners are always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Edge colors in perimeter order, ready for a transport.
    pub fn edge_colors(&self) -> Vec<Color> {
        self.edges.iter().map(|z| z.color).collect()
    }

    pub fn corner_colors(&self) -> [Color; 4] {
        self.corners.map(|z| z.color)
    }

    /// Every zone, edges first, then corners.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.edges.iter().chain(self.corners.iter())
    }

    pub(crate) fn zones_mut(&mut self) -> impl Iterator<Item = &mut Zone> {
        self.edges.iter_mut().chain(self.corners.iter_mut())
    }
}

// ── Layout ───────────────────────────────────────────────────────────

/// Compute the zones for `strip` on a screen of size `screen`.
///
/// Fails with [`ZoneError::InvalidLayout`] when the screen is too small
/// for the requested density (a zone would be 0 pixels wide or tall).
pub fn compute(screen: ScreenSize, strip: StripConfig) -> Result<ZoneSet> {
    let v = strip.vertical;
    let h = strip.horizontal;

    // Widen before adding so absurd LED counts can't overflow.
    let zone_height = (screen.height as u64 / (v as u64 + 2)) as u32;
    let zone_width = (screen.width as u64 / (h as u64 + 2)) as u32;

    if zone_width == 0 || zone_height == 0 {
        return Err(ZoneError::InvalidLayout {
            screen,
            vertical: v,
            horizontal: h,
        });
    }

    let margin_top = (screen.height - zone_height * (v + 2)) / 2;
    let margin_left = (screen.width - zone_width * (h + 2)) / 2;

    let left_x = margin_left;
    let right_x = screen.width - zone_width - margin_left;
    let top_y = margin_top;
    let bottom_y = screen.height - zone_height - margin_top;

    let (vu, hu) = (v as usize, h as usize);
    let mut edges = vec![Zone::default(); strip.led_count()];

    for i in 1..=vu {
        let y = screen.height - (i as u32 + 1) * zone_height - margin_top;
        edges[i - 1] = Zone::new(left_x, y, zone_width, zone_height);
        edges[2 * vu + hu - i] = Zone::new(right_x, y, zone_width, zone_height);
    }

    for i in 1..=hu {
        let x = i as u32 * zone_width + margin_left;
        edges[vu + i - 1] = Zone::new(x, top_y, zone_width, zone_height);
        edges[2 * vu + 2 * hu - i] = Zone::new(x, bottom_y, zone_width, zone_height);
    }

    let corners = [
        Zone::new(left_x, top_y, zone_width, zone_height),
        Zone::new(right_x, top_y, zone_width, zone_height),
        Zone::new(right_x, bottom_y, zone_width, zone_height),
        Zone::new(left_x, bottom_y, zone_width, zone_height),
    ];

    Ok(ZoneSet {
        screen,
        strip,
        edges,
        corners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn layout(width: u32, height: u32, vertical: u32, horizontal: u32) -> ZoneSet {
        compute(
            ScreenSize::new(width, height),
            StripConfig::new(vertical, horizontal),
        )
        .unwrap()
    }

    #[test]
    fn full_hd_worked_example() {
        let set = layout(1920, 1080, 10, 16);

        // zone_height = 1080 / 12 = 90, zone_width = 1920 / 18 = 106,
        // margin_top = 0, margin_left = (1920 - 1908) / 2 = 6
        assert_eq!(set.edges()[0].rect, Rect::new(6, 1080 - 2 * 90, 106, 90));
        assert_eq!(set.edges()[9].rect, Rect::new(6, 90, 106, 90));

        // Top edge, left to right
        assert_eq!(set.edges()[10].rect, Rect::new(112, 0, 106, 90));
        assert_eq!(set.edges()[25].rect, Rect::new(16 * 106 + 6, 0, 106, 90));

        // Right edge, top to bottom
        assert_eq!(set.edges()[26].rect, Rect::new(1808, 90, 106, 90));
        assert_eq!(set.edges()[35].rect, Rect::new(1808, 900, 106, 90));

        // Bottom edge, right to left
        assert_eq!(set.edges()[36].rect, Rect::new(16 * 106 + 6, 990, 106, 90));
        assert_eq!(set.edges()[51].rect, Rect::new(112, 990, 106, 90));

        assert_eq!(set.corner(Corner::TopLeft).rect, Rect::new(6, 0, 106, 90));
        assert_eq!(set.corner(Corner::TopRight).rect, Rect::new(1808, 0, 106, 90));
        assert_eq!(set.corner(Corner::BottomRight).rect, Rect::new(1808, 990, 106, 90));
        assert_eq!(set.corner(Corner::BottomLeft).rect, Rect::new(6, 990, 106, 90));
    }

    #[rstest]
    #[case(1920, 1080, 10, 16)]
    #[case(1920, 1080, 4, 8)]
    #[case(2560, 1440, 0, 20)]
    #[case(1366, 768, 7, 0)]
    #[case(1280, 1024, 0, 0)]
    #[case(100, 37, 3, 5)]
    #[case(3840, 2160, 60, 120)]
    fn zones_are_counted_disjoint_and_on_screen(
        #[case] width: u32,
        #[case] height: u32,
        #[case] vertical: u32,
        #[case] horizontal: u32,
    ) {
        let set = layout(width, height, vertical, horizontal);

        assert_eq!(set.edges().len(), (2 * vertical + 2 * horizontal) as usize);
        assert_eq!(set.corners().len(), 4);
        assert_eq!(set.len(), set.strip().zone_count());

        let rects: Vec<Rect> = set.zones().map(|z| z.rect).collect();
        for (i, a) in rects.iter().enumerate() {
            assert!(a.width > 0 && a.height > 0, "zone {i} is empty: {a:?}");
            assert!(a.fits_within(width, height), "zone {i} off screen: {a:?}");
            for (j, b) in rects.iter().enumerate().skip(i + 1) {
                assert!(!a.overlaps(b), "zones {i} and {j} overlap: {a:?} {b:?}");
            }
        }
    }

    #[rstest]
    #[case(1920, 1080, 10, 16)]
    #[case(1000, 700, 1, 1)]
    #[case(640, 480, 5, 3)]
    fn perimeter_cycle_closes_at_bottom_left(
        #[case] width: u32,
        #[case] height: u32,
        #[case] vertical: u32,
        #[case] horizontal: u32,
    ) {
        let set = layout(width, height, vertical, horizontal);
        let corner = set.corner(Corner::BottomLeft).rect;
        let first = set.edges()[0].rect;
        let last = set.edges()[set.edges().len() - 1].rect;

        // First zone sits directly above the corner
        assert_eq!(first.x, corner.x);
        assert_eq!(first.bottom(), corner.y);

        // Last zone sits directly right of the corner
        assert_eq!(last.y, corner.y);
        assert_eq!(last.x, corner.right());
    }

    #[test]
    fn perimeter_runs_clockwise_from_bottom_left() {
        let set = layout(1920, 1080, 10, 16);
        let e = set.edges();

        for w in e[0..10].windows(2) {
            assert!(w[1].rect.y < w[0].rect.y, "left edge must run upward");
        }
        for w in e[10..26].windows(2) {
            assert!(w[1].rect.x > w[0].rect.x, "top edge must run rightward");
        }
        for w in e[26..36].windows(2) {
            assert!(w[1].rect.y > w[0].rect.y, "right edge must run downward");
        }
        for w in e[36..52].windows(2) {
            assert!(w[1].rect.x < w[0].rect.x, "bottom edge must run leftward");
        }

        // Each edge picks up next to the corner the previous one ended at
        assert_eq!(e[9].rect.y, set.corner(Corner::TopLeft).rect.bottom());
        assert_eq!(e[10].rect.x, set.corner(Corner::TopLeft).rect.right());
        assert_eq!(e[26].rect.y, set.corner(Corner::TopRight).rect.bottom());
        assert_eq!(e[36].rect.right(), set.corner(Corner::BottomRight).rect.x);
    }

    #[test]
    fn margins_split_the_remainder() {
        // 1001 / 5 = 200 rem 1 → margin 0; 803 / 4 = 200 rem 3 → margin 1
        let set = layout(1001, 803, 2, 3);
        assert_eq!(set.corner(Corner::TopLeft).rect, Rect::new(0, 1, 200, 200));
        assert_eq!(set.corner(Corner::BottomRight).rect, Rect::new(801, 602, 200, 200));
    }

    #[test]
    fn zero_leds_on_one_axis_leaves_that_range_empty() {
        let set = layout(800, 600, 0, 6);
        assert_eq!(set.edges().len(), 12);
        assert!(set.edges().iter().all(|z| z.rect.y == 0 || z.rect.bottom() == 600));
    }

    #[rstest]
    #[case(10, 10, 10, 1)]
    #[case(10, 10, 1, 10)]
    #[case(0, 1080, 0, 0)]
    #[case(1920, 1, 0, 0)]
    #[case(1920, 1080, u32::MAX, 0)]
    fn too_small_screen_is_invalid_layout(
        #[case] width: u32,
        #[case] height: u32,
        #[case] vertical: u32,
        #[case] horizontal: u32,
    ) {
        let err = compute(
            ScreenSize::new(width, height),
            StripConfig::new(vertical, horizontal),
        )
        .unwrap_err();
        assert!(matches!(err, ZoneError::InvalidLayout { .. }));
    }

    #[rstest]
    #[case(Rect::new(u32::MAX - 2, 0, 10, 10), u32::MAX, 16)]
    #[case(Rect::new(0, u32::MAX, 1, 1), 16, u32::MAX)]
    #[case(Rect::new(1, 1, u32::MAX, u32::MAX), u32::MAX, u32::MAX)]
    fn rect_reaching_past_u32_never_fits(#[case] rect: Rect, #[case] width: u32, #[case] height: u32) {
        assert!(!rect.fits_within(width, height));
    }

    #[test]
    fn new_layout_starts_black() {
        let set = layout(640, 480, 2, 2);
        assert!(set.edge_colors().iter().all(|c| *c == Color::BLACK));
        assert_eq!(set.corner_colors(), [Color::BLACK; 4]);
    }

    #[test]
    fn serializes_zone_fields_flat() {
        let set = layout(640, 480, 1, 1);
        let json = serde_json::to_value(&set).unwrap();
        let first = &json["edges"][0];
        assert_eq!(first["x"], 0);
        assert_eq!(first["width"], 213);
        assert_eq!(first["color"]["r"], 0);
        assert_eq!(json["strip"]["vertical"], 1);
    }
}
