mod crop;
mod text;

pub use crate::geometry::{Color, ImageBounds, Point, Rect};
pub use crop::{
    init_crop_box, resize_from_handle, translate_box, AspectRatio, CropBox, CropDragState,
    CropHandle, CropLimits, CropSession, GridType, CROP_ROTATION_LIMIT_DEGREES,
};
pub use text::{
    FontStyle, TextAlign, TextOverlay, TextOverlayPatch, TextShadow, TextStroke, TextStyle,
};

use thiserror::Error;

pub const DEFAULT_TEXT_POSITION: Point = Point::new(50.0, 50.0);
pub const DEFAULT_TEXT_CONTENT: &str = "Text";
pub const TEXT_HIT_PADDING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("text overlay {0} not found")]
    OverlayNotFound(u64),
}

/// Parses a pixel dimension typed into a tool panel. Anything that is not a
/// positive integer is ignored rather than reported.
pub fn parse_dimension(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().filter(|value| *value > 0)
}

/// Measures text the way the renderer lays it out.
pub trait TextMeasurer {
    fn line_width(&self, line: &str, style: &TextStyle) -> f64;

    fn line_height(&self, style: &TextStyle) -> f64 {
        style.line_height()
    }
}

/// Bounding box of an overlay with its alignment applied.
pub fn text_extents(overlay: &TextOverlay, measurer: &impl TextMeasurer) -> Rect {
    let width = overlay
        .lines()
        .map(|line| measurer.line_width(line, &overlay.style))
        .fold(0.0, f64::max);
    let height = measurer.line_height(&overlay.style) * overlay.line_count() as f64;
    Rect::new(
        overlay.position.x + overlay.style.align.left_edge_offset(width),
        overlay.position.y,
        width,
        height,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextDrag {
    id: u64,
    start_pointer: Point,
    start_position: Point,
}

/// Ordered text annotations; later overlays draw over earlier ones.
#[derive(Debug, Clone)]
pub struct TextOverlayStore {
    overlays: Vec<TextOverlay>,
    next_id: u64,
    active: Option<u64>,
    tool_style: TextStyle,
    drag: Option<TextDrag>,
}

impl Default for TextOverlayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TextOverlayStore {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut TextOverlay, ToolError> {
        self.overlays
            .iter_mut()
            .find(|overlay| overlay.id == id)
            .ok_or(ToolError::OverlayNotFound(id))
    }

    pub fn new() -> Self {
        Self {
            overlays: Vec::new(),
            next_id: 1,
            active: None,
            tool_style: TextStyle::default(),
            drag: None,
        }
    }

    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    pub fn get(&self, id: u64) -> Option<&TextOverlay> {
        self.overlays.iter().find(|overlay| overlay.id == id)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn tool_style(&self) -> &TextStyle {
        &self.tool_style
    }

    pub fn set_tool_style(&mut self, style: TextStyle) {
        self.tool_style = style.sanitized();
    }

    /// Spawns an overlay at the default position using the tool style; it becomes active.
    pub fn add(&mut self) -> u64 {
        self.add_with_text(DEFAULT_TEXT_CONTENT)
    }

    pub fn add_with_text(&mut self, text: impl Into<String>) -> u64 {
        let id = self.allocate_id();
        self.overlays.push(TextOverlay::new(
            id,
            DEFAULT_TEXT_POSITION,
            text,
            self.tool_style.clone(),
        ));
        self.active = Some(id);
        tracing::debug!(id, "text overlay added");
        id
    }

    pub fn update(&mut self, id: u64, patch: TextOverlayPatch) -> Result<(), ToolError> {
        self.find_mut(id)?.apply(patch);
        Ok(())
    }

    pub fn remove(&mut self, id: u64) -> Result<TextOverlay, ToolError> {
        let index = self
            .overlays
            .iter()
            .position(|overlay| overlay.id == id)
            .ok_or(ToolError::OverlayNotFound(id))?;
        if self.active == Some(id) {
            self.active = None;
        }
        if self.drag.is_some_and(|drag| drag.id == id) {
            self.drag = None;
        }
        tracing::debug!(id, "text overlay removed");
        Ok(self.overlays.remove(index))
    }

    pub fn remove_all(&mut self) {
        self.overlays.clear();
        self.active = None;
        self.drag = None;
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }

    pub fn active_overlay(&self) -> Option<&TextOverlay> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, id: Option<u64>) -> Result<(), ToolError> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(ToolError::OverlayNotFound(id));
            }
        }
        self.active = id;
        Ok(())
    }

    /// Topmost visible overlay whose padded extents contain `point`.
    pub fn hit_test(&self, point: Point, measurer: &impl TextMeasurer) -> Option<u64> {
        self.overlays
            .iter()
            .rev()
            .filter(|overlay| overlay.visible)
            .find(|overlay| text_extents(overlay, measurer).contains_padded(point, TEXT_HIT_PADDING))
            .map(|overlay| overlay.id)
    }

    /// Selects and starts dragging the overlay under `point`; a miss deactivates.
    pub fn pointer_down(&mut self, point: Point, measurer: &impl TextMeasurer) -> Option<u64> {
        let Some(id) = self.hit_test(point, measurer) else {
            self.active = None;
            self.drag = None;
            return None;
        };
        self.active = Some(id);
        self.begin_drag(id, point);
        Some(id)
    }

    pub fn begin_drag(&mut self, id: u64, pointer: Point) -> bool {
        let Some(overlay) = self.get(id) else {
            return false;
        };
        self.drag = Some(TextDrag {
            id,
            start_pointer: pointer,
            start_position: overlay.position,
        });
        true
    }

    /// Moves the dragged overlay by the pointer delta since drag start.
    pub fn drag_to(&mut self, pointer: Point) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        let (dx, dy) = pointer.delta_from(drag.start_pointer);
        match self.find_mut(drag.id) {
            Ok(overlay) => {
                overlay.position = drag.start_position.offset(dx, dy);
                true
            }
            Err(_) => {
                self.drag = None;
                false
            }
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Escape key: drops the selection and any drag in progress.
    pub fn escape(&mut self) {
        self.active = None;
        self.drag = None;
    }

    pub fn translate_all(&mut self, dx: f64, dy: f64) {
        for overlay in &mut self.overlays {
            overlay.position = overlay.position.offset(dx, dy);
        }
    }

    pub fn scale_all(&mut self, scale_x: f64, scale_y: f64) {
        for overlay in &mut self.overlays {
            let position = overlay.position;
            overlay.position = Point::new(position.x * scale_x, position.y * scale_y);
        }
    }

    /// Swaps in a saved overlay list. Ids stay monotonic across restores.
    pub fn restore(&mut self, overlays: Vec<TextOverlay>) {
        self.next_id = overlays
            .iter()
            .map(|overlay| overlay.id.saturating_add(1))
            .fold(self.next_id, u64::max);
        self.overlays = overlays;
        self.active = None;
        self.drag = None;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Fixed-advance measurer: every char is `size / 2` wide.
    pub(crate) struct HalfEmMeasurer;

    impl TextMeasurer for HalfEmMeasurer {
        fn line_width(&self, line: &str, style: &TextStyle) -> f64 {
            line.chars().count() as f64 * f64::from(style.size) / 2.0
        }
    }
}
