use serde::Deserialize;

use crate::config::{DEFAULT_HANDLE_SIZE, DEFAULT_MIN_CROP_SIZE};
use crate::geometry::{ImageBounds, Point, Rect};

const CROP_INIT_FRACTION: f64 = 0.7;
pub const CROP_ROTATION_LIMIT_DEGREES: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    Free,
    Original,
    #[serde(rename = "1:1")]
    Ratio1x1,
    #[serde(rename = "4:3")]
    Ratio4x3,
    #[serde(rename = "3:2")]
    Ratio3x2,
    #[serde(rename = "16:9")]
    Ratio16x9,
    #[serde(rename = "9:16")]
    Ratio9x16,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 7] = [
        Self::Free,
        Self::Original,
        Self::Ratio1x1,
        Self::Ratio4x3,
        Self::Ratio3x2,
        Self::Ratio16x9,
        Self::Ratio9x16,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Original => "Original",
            Self::Ratio1x1 => "1:1",
            Self::Ratio4x3 => "4:3",
            Self::Ratio3x2 => "3:2",
            Self::Ratio16x9 => "16:9",
            Self::Ratio9x16 => "9:16",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|aspect| aspect.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Ratio enforced while resizing. `Free` and `Original` resize freely.
    pub const fn ratio(self) -> Option<(u32, u32)> {
        match self {
            Self::Free | Self::Original => None,
            Self::Ratio1x1 => Some((1, 1)),
            Self::Ratio4x3 => Some((4, 3)),
            Self::Ratio3x2 => Some((3, 2)),
            Self::Ratio16x9 => Some((16, 9)),
            Self::Ratio9x16 => Some((9, 16)),
        }
    }

    pub fn ratio_f64(self) -> Option<f64> {
        self.ratio()
            .map(|(numerator, denominator)| f64::from(numerator) / f64::from(denominator))
    }

    pub const fn is_locked(self) -> bool {
        self.ratio().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    None,
    #[default]
    RuleOfThirds,
    GoldenRatio,
    Grid4x4,
    Diagonal,
}

impl GridType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::RuleOfThirds => "Rule of thirds",
            Self::GoldenRatio => "Golden ratio",
            Self::Grid4x4 => "Grid",
            Self::Diagonal => "Diagonal",
        }
    }

    /// Guide line segments inside `bounds`, in the same coordinate space.
    pub fn lines(self, bounds: Rect) -> Vec<(Point, Point)> {
        let fractions: &[f64] = match self {
            Self::None | Self::Diagonal => &[],
            Self::RuleOfThirds => &[1.0 / 3.0, 2.0 / 3.0],
            Self::GoldenRatio => &[0.381_966, 0.618_034],
            Self::Grid4x4 => &[0.25, 0.5, 0.75],
        };
        let mut lines = Vec::with_capacity(fractions.len() * 2);
        for fraction in fractions {
            let x = bounds.x + bounds.width * fraction;
            let y = bounds.y + bounds.height * fraction;
            lines.push((Point::new(x, bounds.y), Point::new(x, bounds.bottom())));
            lines.push((Point::new(bounds.x, y), Point::new(bounds.right(), y)));
        }
        if self == Self::Diagonal {
            lines.push((
                Point::new(bounds.x, bounds.y),
                Point::new(bounds.right(), bounds.bottom()),
            ));
            lines.push((
                Point::new(bounds.right(), bounds.y),
                Point::new(bounds.x, bounds.bottom()),
            ));
        }
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropHandle {
    Nw,
    Ne,
    Sw,
    Se,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropDragState {
    Idle,
    Dragging { handle: CropHandle, last: Point },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropLimits {
    pub min_size: f64,
    pub handle_size: f64,
}

impl Default for CropLimits {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CROP_SIZE,
            handle_size: DEFAULT_HANDLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn corners(&self) -> [(CropHandle, Point); 4] {
        let right = self.x + self.width;
        let bottom = self.y + self.height;
        [
            (CropHandle::Nw, Point::new(self.x, self.y)),
            (CropHandle::Ne, Point::new(right, self.y)),
            (CropHandle::Sw, Point::new(self.x, bottom)),
            (CropHandle::Se, Point::new(right, bottom)),
        ]
    }

    /// Whole-pixel region `(x, y, width, height)` clamped to `bounds`.
    pub fn pixel_region(&self, bounds: ImageBounds) -> (u32, u32, u32, u32) {
        let x = (self.x.round().max(0.0) as u32).min(bounds.width.saturating_sub(1));
        let y = (self.y.round().max(0.0) as u32).min(bounds.height.saturating_sub(1));
        let width = (self.width.round().max(1.0) as u32).min(bounds.width - x);
        let height = (self.height.round().max(1.0) as u32).min(bounds.height - y);
        (x, y, width, height)
    }
}

/// Minimum box dimensions, shrunk when the raster itself is smaller.
fn min_dimensions(bounds: ImageBounds, limits: CropLimits) -> (f64, f64) {
    (
        limits.min_size.min(bounds.width_f64()),
        limits.min_size.min(bounds.height_f64()),
    )
}

/// Fits `(width, height)` to the raster and the minimum size, keeping `ratio` when set.
fn constrain_size(
    mut width: f64,
    mut height: f64,
    bounds: ImageBounds,
    ratio: Option<f64>,
    limits: CropLimits,
) -> (f64, f64) {
    let (max_width, max_height) = (bounds.width_f64(), bounds.height_f64());
    let (min_width, min_height) = min_dimensions(bounds, limits);

    let Some(ratio) = ratio else {
        return (
            width.min(max_width).max(min_width),
            height.min(max_height).max(min_height),
        );
    };

    if width > max_width {
        width = max_width;
        height = width / ratio;
    }
    if height > max_height {
        height = max_height;
        width = height * ratio;
    }

    let floor_width = min_width.max(min_height * ratio);
    if width < floor_width {
        width = floor_width;
        height = width / ratio;
    }
    // Only a raster smaller than the ratio-locked minimum reaches these.
    if width > max_width {
        width = max_width;
    }
    if height > max_height {
        height = max_height;
    }
    (width, height)
}

fn clamp_origin(x: f64, y: f64, width: f64, height: f64, bounds: ImageBounds) -> (f64, f64) {
    (
        x.clamp(0.0, (bounds.width_f64() - width).max(0.0)),
        y.clamp(0.0, (bounds.height_f64() - height).max(0.0)),
    )
}

/// Initial box for a fresh crop session or an aspect change.
pub fn init_crop_box(bounds: ImageBounds, aspect: AspectRatio, limits: CropLimits) -> CropBox {
    let (raster_width, raster_height) = (bounds.width_f64(), bounds.height_f64());
    if aspect == AspectRatio::Original {
        return CropBox::new(0.0, 0.0, raster_width, raster_height);
    }

    let ratio = aspect.ratio_f64();
    let mut width = raster_width * CROP_INIT_FRACTION;
    let mut height = raster_height * CROP_INIT_FRACTION;
    if let Some(ratio) = ratio {
        height = width / ratio;
        if height > raster_height {
            height = raster_height * CROP_INIT_FRACTION;
            width = height * ratio;
        }
    }
    let (width, height) = constrain_size(width, height, bounds, ratio, limits);
    CropBox::new(
        (raster_width - width) / 2.0,
        (raster_height - height) / 2.0,
        width,
        height,
    )
}

pub fn translate_box(crop: CropBox, dx: f64, dy: f64, bounds: ImageBounds) -> CropBox {
    let (x, y) = clamp_origin(crop.x + dx, crop.y + dy, crop.width, crop.height, bounds);
    CropBox::new(x, y, crop.width, crop.height)
}

/// Applies a corner drag of `(dx, dy)`; the opposite corner is the anchor.
pub fn resize_from_handle(
    crop: CropBox,
    handle: CropHandle,
    dx: f64,
    dy: f64,
    bounds: ImageBounds,
    aspect: AspectRatio,
    limits: CropLimits,
) -> CropBox {
    let (anchor_x, anchor_y, sign_x, sign_y) = match handle {
        CropHandle::Move => return translate_box(crop, dx, dy, bounds),
        CropHandle::Se => (crop.x, crop.y, 1.0, 1.0),
        CropHandle::Nw => (crop.x + crop.width, crop.y + crop.height, -1.0, -1.0),
        CropHandle::Ne => (crop.x, crop.y + crop.height, 1.0, -1.0),
        CropHandle::Sw => (crop.x + crop.width, crop.y, -1.0, 1.0),
    };

    let mut width = crop.width + sign_x * dx;
    let mut height = crop.height + sign_y * dy;
    let ratio = aspect.ratio_f64();
    if let Some(ratio) = ratio {
        let width_change = (width - crop.width).abs();
        let height_change = (height - crop.height).abs();
        if width_change >= height_change * ratio {
            height = width / ratio;
        } else {
            width = height * ratio;
        }
    }
    let (width, height) = constrain_size(width, height, bounds, ratio, limits);

    let x = if sign_x > 0.0 { anchor_x } else { anchor_x - width };
    let y = if sign_y > 0.0 { anchor_y } else { anchor_y - height };
    let (x, y) = clamp_origin(x, y, width, height, bounds);
    CropBox::new(x, y, width, height)
}

/// Interactive crop state: box, aspect, grid, pending rotation and drag state.
#[derive(Debug, Clone, PartialEq)]
pub struct CropSession {
    bounds: ImageBounds,
    aspect: AspectRatio,
    grid: GridType,
    rotation_degrees: f64,
    crop_box: CropBox,
    state: CropDragState,
    limits: CropLimits,
}

impl CropSession {
    pub fn new(bounds: ImageBounds, aspect: AspectRatio, limits: CropLimits) -> Self {
        Self {
            bounds,
            aspect,
            grid: GridType::default(),
            rotation_degrees: 0.0,
            crop_box: init_crop_box(bounds, aspect, limits),
            state: CropDragState::Idle,
            limits,
        }
    }

    pub fn bounds(&self) -> ImageBounds {
        self.bounds
    }

    pub fn aspect(&self) -> AspectRatio {
        self.aspect
    }

    pub fn grid(&self) -> GridType {
        self.grid
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn crop_box(&self) -> CropBox {
        self.crop_box
    }

    pub fn state(&self) -> CropDragState {
        self.state
    }

    pub fn handle_size(&self) -> f64 {
        self.limits.handle_size
    }

    pub fn set_aspect_ratio(&mut self, aspect: AspectRatio) {
        tracing::debug!(from = ?self.aspect, to = ?aspect, "crop aspect changed");
        self.aspect = aspect;
        self.crop_box = init_crop_box(self.bounds, aspect, self.limits);
        self.state = CropDragState::Idle;
    }

    pub fn set_grid(&mut self, grid: GridType) {
        self.grid = grid;
    }

    pub fn set_rotation_degrees(&mut self, degrees: f64) {
        if degrees.is_finite() {
            self.rotation_degrees =
                degrees.clamp(-CROP_ROTATION_LIMIT_DEGREES, CROP_ROTATION_LIMIT_DEGREES);
        }
    }

    /// Replaces the box, re-applying the aspect lock, size limits and bounds.
    pub fn set_crop_box(&mut self, crop: CropBox) {
        let ratio = self.aspect.ratio_f64();
        let width = if crop.width.is_finite() { crop.width } else { self.crop_box.width };
        let height = match ratio {
            Some(ratio) => width / ratio,
            None if crop.height.is_finite() => crop.height,
            None => self.crop_box.height,
        };
        let (width, height) = constrain_size(width, height, self.bounds, ratio, self.limits);
        let x = if crop.x.is_finite() { crop.x } else { self.crop_box.x };
        let y = if crop.y.is_finite() { crop.y } else { self.crop_box.y };
        let (x, y) = clamp_origin(x, y, width, height, self.bounds);
        self.crop_box = CropBox::new(x, y, width, height);
        self.state = CropDragState::Idle;
    }

    /// Corner handles win over the interior, tested nw, ne, sw, se.
    pub fn handle_at(&self, point: Point) -> Option<CropHandle> {
        let reach = self.limits.handle_size;
        self.crop_box
            .corners()
            .into_iter()
            .find(|(_, corner)| {
                (point.x - corner.x).abs() <= reach && (point.y - corner.y).abs() <= reach
            })
            .map(|(handle, _)| handle)
            .or_else(|| {
                self.crop_box
                    .rect()
                    .contains_padded(point, 0.0)
                    .then_some(CropHandle::Move)
            })
    }

    pub fn pointer_down(&mut self, point: Point) -> Option<CropHandle> {
        let handle = self.handle_at(point)?;
        tracing::debug!(?handle, x = point.x, y = point.y, "crop drag started");
        self.state = CropDragState::Dragging {
            handle,
            last: point,
        };
        Some(handle)
    }

    /// Returns whether the box changed.
    pub fn pointer_move(&mut self, point: Point) -> bool {
        let CropDragState::Dragging { handle, last } = self.state else {
            return false;
        };
        let (dx, dy) = point.delta_from(last);
        self.state = CropDragState::Dragging {
            handle,
            last: point,
        };
        let next = resize_from_handle(
            self.crop_box,
            handle,
            dx,
            dy,
            self.bounds,
            self.aspect,
            self.limits,
        );
        let changed = next != self.crop_box;
        self.crop_box = next;
        changed
    }

    pub fn pointer_up(&mut self) {
        if let CropDragState::Dragging { handle, .. } = self.state {
            tracing::debug!(?handle, crop = ?self.crop_box, "crop drag finished");
        }
        self.state = CropDragState::Idle;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, CropDragState::Dragging { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RASTER: ImageBounds = ImageBounds::new(800, 600);

    fn assert_within_bounds(crop: CropBox, bounds: ImageBounds) {
        let eps = 1e-6;
        assert!(crop.x >= -eps && crop.y >= -eps, "{crop:?}");
        assert!(crop.x + crop.width <= bounds.width_f64() + eps, "{crop:?}");
        assert!(crop.y + crop.height <= bounds.height_f64() + eps, "{crop:?}");
        assert!(crop.width >= 50.0 - eps && crop.height >= 50.0 - eps, "{crop:?}");
    }

    /// Deterministic pointer deltas in roughly [-150, 150).
    fn drag_deltas(seed: u64, count: usize) -> Vec<(f64, f64)> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) % 300) as f64 - 150.0
        };
        (0..count).map(|_| (next(), next())).collect()
    }

    #[test]
    fn aspect_labels_round_trip() {
        for aspect in AspectRatio::ALL {
            assert_eq!(AspectRatio::from_label(aspect.label()), Some(aspect));
        }
        assert_eq!(AspectRatio::from_label(" 16:9 "), Some(AspectRatio::Ratio16x9));
        assert_eq!(AspectRatio::from_label("7:5"), None);
    }

    #[test]
    fn only_fixed_ratios_lock() {
        assert!(!AspectRatio::Free.is_locked());
        assert!(!AspectRatio::Original.is_locked());
        assert!(AspectRatio::Ratio16x9.is_locked());
    }

    #[test]
    fn init_square_box_is_centered_at_seventy_percent_width() {
        let crop = init_crop_box(RASTER, AspectRatio::Ratio1x1, CropLimits::default());
        assert_eq!(crop, CropBox::new(120.0, 20.0, 560.0, 560.0));
    }

    #[test]
    fn init_original_covers_full_raster() {
        let crop = init_crop_box(RASTER, AspectRatio::Original, CropLimits::default());
        assert_eq!(crop, CropBox::new(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn init_portrait_ratio_shrinks_overshooting_height() {
        let crop = init_crop_box(RASTER, AspectRatio::Ratio9x16, CropLimits::default());
        assert!((crop.height - 420.0).abs() < 1e-9);
        assert!((crop.width / crop.height - 9.0 / 16.0).abs() < 1e-9);
        assert_within_bounds(crop, RASTER);
    }

    #[test]
    fn init_free_box_is_seventy_percent_of_each_side() {
        let crop = init_crop_box(RASTER, AspectRatio::Free, CropLimits::default());
        assert_eq!(crop, CropBox::new(120.0, 90.0, 560.0, 420.0));
    }

    #[test]
    fn se_drag_grows_and_reclamps_square_box() {
        let mut session = CropSession::new(RASTER, AspectRatio::Ratio1x1, CropLimits::default());
        assert_eq!(session.pointer_down(Point::new(680.0, 580.0)), Some(CropHandle::Se));
        assert!(session.pointer_move(Point::new(720.0, 620.0)));
        session.pointer_up();

        let crop = session.crop_box();
        assert!((crop.width - 600.0).abs() < 1e-9);
        assert!((crop.height - 600.0).abs() < 1e-9);
        assert_within_bounds(crop, RASTER);
        assert_eq!(session.state(), CropDragState::Idle);
    }

    #[test]
    fn corner_priority_prefers_nw_when_handles_overlap() {
        let limits = CropLimits {
            min_size: 50.0,
            handle_size: 30.0,
        };
        let mut session = CropSession::new(RASTER, AspectRatio::Free, limits);
        assert_eq!(session.pointer_down(Point::new(680.0, 510.0)), Some(CropHandle::Se));
        session.pointer_move(Point::new(170.0, 140.0));
        session.pointer_up();

        let crop = session.crop_box();
        assert_eq!(crop, CropBox::new(120.0, 90.0, 50.0, 50.0));
        let center = Point::new(crop.x + 25.0, crop.y + 25.0);
        assert_eq!(session.handle_at(center), Some(CropHandle::Nw));
    }

    #[test]
    fn pointer_down_outside_box_stays_idle() {
        let mut session = CropSession::new(RASTER, AspectRatio::Ratio1x1, CropLimits::default());
        assert_eq!(session.pointer_down(Point::new(10.0, 300.0)), None);
        assert!(!session.is_dragging());
        assert!(!session.pointer_move(Point::new(50.0, 300.0)));
    }

    #[test]
    fn move_drag_translates_and_clamps() {
        let mut session = CropSession::new(RASTER, AspectRatio::Free, CropLimits::default());
        assert_eq!(session.pointer_down(Point::new(400.0, 300.0)), Some(CropHandle::Move));
        session.pointer_move(Point::new(2000.0, -900.0));
        let crop = session.crop_box();
        assert_eq!(crop, CropBox::new(240.0, 0.0, 560.0, 420.0));
    }

    #[test]
    fn changing_aspect_reinitializes_box() {
        let mut session = CropSession::new(RASTER, AspectRatio::Free, CropLimits::default());
        session.pointer_down(Point::new(400.0, 300.0));
        session.pointer_move(Point::new(410.0, 300.0));
        session.set_aspect_ratio(AspectRatio::Ratio1x1);
        assert_eq!(session.crop_box(), CropBox::new(120.0, 20.0, 560.0, 560.0));
        assert!(!session.is_dragging());
    }

    #[test]
    fn rotation_is_clamped_to_forty_five_degrees() {
        let mut session = CropSession::new(RASTER, AspectRatio::Free, CropLimits::default());
        session.set_rotation_degrees(80.0);
        assert_eq!(session.rotation_degrees(), 45.0);
        session.set_rotation_degrees(-12.5);
        assert_eq!(session.rotation_degrees(), -12.5);
        session.set_rotation_degrees(f64::NAN);
        assert_eq!(session.rotation_degrees(), -12.5);
    }

    #[test]
    fn clamp_invariant_holds_for_random_drag_sequences() {
        let handles = [
            CropHandle::Nw,
            CropHandle::Ne,
            CropHandle::Sw,
            CropHandle::Se,
            CropHandle::Move,
        ];
        for aspect in [AspectRatio::Free, AspectRatio::Original, AspectRatio::Ratio4x3] {
            let limits = CropLimits::default();
            let mut crop = init_crop_box(RASTER, aspect, limits);
            for (index, (dx, dy)) in drag_deltas(7, 400).into_iter().enumerate() {
                let handle = handles[index % handles.len()];
                crop = resize_from_handle(crop, handle, dx, dy, RASTER, aspect, limits);
                assert_within_bounds(crop, RASTER);
            }
        }
    }

    #[test]
    fn sixteen_by_nine_stays_locked_through_corner_drags() {
        let limits = CropLimits::default();
        let aspect = AspectRatio::Ratio16x9;
        let mut crop = init_crop_box(RASTER, aspect, limits);
        let corners = [CropHandle::Nw, CropHandle::Ne, CropHandle::Sw, CropHandle::Se];
        for (index, (dx, dy)) in drag_deltas(42, 500).into_iter().enumerate() {
            crop = resize_from_handle(crop, corners[index % 4], dx, dy, RASTER, aspect, limits);
            assert!((crop.width / crop.height - 16.0 / 9.0).abs() < 1e-3, "{crop:?}");
            assert_within_bounds(crop, RASTER);
        }
    }

    #[test]
    fn nw_drag_keeps_opposite_corner_anchored() {
        let limits = CropLimits::default();
        let crop = CropBox::new(100.0, 100.0, 300.0, 200.0);
        let next = resize_from_handle(
            crop,
            CropHandle::Nw,
            20.0,
            30.0,
            RASTER,
            AspectRatio::Free,
            limits,
        );
        assert_eq!(next, CropBox::new(120.0, 130.0, 280.0, 170.0));
    }

    #[test]
    fn tiny_raster_box_never_exceeds_raster() {
        let bounds = ImageBounds::new(30, 20);
        let limits = CropLimits::default();
        let crop = init_crop_box(bounds, AspectRatio::Ratio16x9, limits);
        assert!(crop.width <= 30.0 && crop.height <= 20.0);
        let crop = resize_from_handle(
            crop,
            CropHandle::Se,
            -100.0,
            -100.0,
            bounds,
            AspectRatio::Free,
            limits,
        );
        assert_eq!((crop.width, crop.height), (30.0, 20.0));
    }

    #[test]
    fn grid_lines_match_grid_type() {
        let bounds = Rect::new(0.0, 0.0, 90.0, 60.0);
        assert!(GridType::None.lines(bounds).is_empty());
        let thirds = GridType::RuleOfThirds.lines(bounds);
        assert_eq!(thirds.len(), 4);
        let (start, end) = thirds[0];
        assert!((start.x - 30.0).abs() < 1e-9 && start.y == 0.0);
        assert!((end.x - 30.0).abs() < 1e-9 && end.y == 60.0);
        assert_eq!(GridType::Grid4x4.lines(bounds).len(), 6);
        assert_eq!(GridType::Diagonal.lines(bounds).len(), 2);
    }

    #[test]
    fn pixel_region_rounds_and_clamps() {
        let crop = CropBox::new(119.6, -0.2, 560.4, 700.0);
        assert_eq!(crop.pixel_region(RASTER), (120, 0, 560, 600));
    }

    #[test]
    fn set_crop_box_reapplies_lock_and_bounds() {
        let mut session = CropSession::new(RASTER, AspectRatio::Ratio16x9, CropLimits::default());
        session.set_crop_box(CropBox::new(700.0, -20.0, 320.0, 999.0));
        let crop = session.crop_box();
        assert!((crop.width / crop.height - 16.0 / 9.0).abs() < 1e-3);
        assert_within_bounds(crop, RASTER);
        assert_eq!((crop.x, crop.y), (480.0, 0.0));

        let mut free = CropSession::new(RASTER, AspectRatio::Free, CropLimits::default());
        free.set_crop_box(CropBox::new(10.0, 10.0, 5.0, 5000.0));
        assert_eq!(free.crop_box(), CropBox::new(10.0, 0.0, 50.0, 600.0));
    }
}
