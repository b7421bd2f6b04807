//! Zoom/pan state and the single screen-to-raster mapping every pointer consumer uses.

use crate::geometry::{ImageBounds, Point};

const VIEWPORT_ZOOM_LEVELS: &[f64] = &[
    0.1, 0.125, 0.25, 0.33, 0.5, 0.67, 0.75, 0.8, 0.9, 1.0, 1.1, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0,
    4.0, 5.0,
];
const VIEWPORT_PAN_STEP: f64 = 48.0;

/// On-screen rectangle the canvas element occupies (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasScreenRect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect whose CSS size equals the canvas buffer size.
    pub fn unscaled(buffer: ImageBounds) -> Self {
        Self::new(0.0, 0.0, buffer.width_f64(), buffer.height_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    zoom: f64,
    pan: Point,
    min_zoom: f64,
    max_zoom: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(0.1, 5.0)
    }
}

impl ViewportState {
    pub fn new(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            zoom: 1.0_f64.clamp(min_zoom, max_zoom),
            pan: Point::default(),
            min_zoom,
            max_zoom,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() || zoom <= 0.0 {
            return;
        }
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn zoom_in(&mut self) {
        let next = VIEWPORT_ZOOM_LEVELS
            .iter()
            .copied()
            .find(|level| *level > self.zoom + f64::EPSILON)
            .unwrap_or(self.max_zoom);
        self.set_zoom(next);
    }

    pub fn zoom_out(&mut self) {
        let next = VIEWPORT_ZOOM_LEVELS
            .iter()
            .rev()
            .copied()
            .find(|level| *level < self.zoom - f64::EPSILON)
            .unwrap_or(self.min_zoom);
        self.set_zoom(next);
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan.offset(dx, dy);
    }

    pub fn pan_left(&mut self) {
        self.pan_by(-VIEWPORT_PAN_STEP, 0.0);
    }

    pub fn pan_right(&mut self) {
        self.pan_by(VIEWPORT_PAN_STEP, 0.0);
    }

    pub fn pan_up(&mut self) {
        self.pan_by(0.0, -VIEWPORT_PAN_STEP);
    }

    pub fn pan_down(&mut self) {
        self.pan_by(0.0, VIEWPORT_PAN_STEP);
    }

    pub fn reset(&mut self) {
        self.zoom = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
        self.pan = Point::default();
    }

    /// Picks the largest zoom at which `image` fits inside `available`.
    pub fn fit_to(&mut self, image: ImageBounds, available: (f64, f64)) {
        if image.width == 0 || image.height == 0 || available.0 <= 0.0 || available.1 <= 0.0 {
            return;
        }
        let zoom = (available.0 / image.width_f64())
            .min(available.1 / image.height_f64())
            .min(1.0);
        self.set_zoom(zoom);
        self.pan = Point::default();
    }
}

/// Maps a pointer position to canvas-buffer (raster) coordinates.
pub fn screen_to_raster(
    pointer: Point,
    viewport: &ViewportState,
    rect: CanvasScreenRect,
    buffer: ImageBounds,
) -> Point {
    let scale_x = css_to_buffer_scale(buffer.width_f64(), rect.width);
    let scale_y = css_to_buffer_scale(buffer.height_f64(), rect.height);
    Point::new(
        (pointer.x - rect.left) * scale_x / viewport.zoom - viewport.pan.x,
        (pointer.y - rect.top) * scale_y / viewport.zoom - viewport.pan.y,
    )
}

/// Inverse of [`screen_to_raster`].
pub fn raster_to_screen(
    raster: Point,
    viewport: &ViewportState,
    rect: CanvasScreenRect,
    buffer: ImageBounds,
) -> Point {
    let scale_x = css_to_buffer_scale(buffer.width_f64(), rect.width);
    let scale_y = css_to_buffer_scale(buffer.height_f64(), rect.height);
    Point::new(
        (raster.x + viewport.pan.x) * viewport.zoom / scale_x + rect.left,
        (raster.y + viewport.pan.y) * viewport.zoom / scale_y + rect.top,
    )
}

fn css_to_buffer_scale(buffer_len: f64, css_len: f64) -> f64 {
    if css_len > 0.0 && buffer_len > 0.0 {
        buffer_len / css_len
    } else {
        1.0
    }
}
