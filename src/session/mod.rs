//! One editing session: every piece of mutable editor state in a single value.
//!
//! Pointer input arrives in screen coordinates and is mapped once, through
//! [`screen_to_raster`], into canvas-buffer space (the current raster after
//! the render transform). Crop boxes and text positions live in that space.
//! Image-mutating operations (upload, crop, resize) compute their result
//! first and only then commit to history, so a failure leaves the session
//! untouched.

mod error;
mod preview;
mod upload;

pub use error::{EditorError, EditorResult};
pub use preview::{PreviewScheduler, DEFAULT_PREVIEW_DEBOUNCE, DEFAULT_PREVIEW_FRAME};
pub use upload::{spawn_decode, DecodeOutcome, DecodeTicket, UploadStatus};

use std::time::Instant;

use image::RgbaImage;

use crate::codec::{self, OutputFormat, RenderError, UploadLimits};
use crate::compositor::{
    self, crop_region, flatten_geometry, resize_exact, AdjustmentState, FontBook, RenderRequest,
    Transform,
};
use crate::config::EditorConfig;
use crate::editor::tools::{
    parse_dimension, AspectRatio, CropBox, CropHandle, CropLimits, CropSession, GridType,
    ImageBounds, Point, TextOverlayPatch, TextOverlayStore, TextStyle,
};
use crate::history::{EditState, HistoryManager, RasterImage};
use crate::resource::ResourceManager;
use crate::viewport::{screen_to_raster, CanvasScreenRect, ViewportState};

pub const ORIGINAL_IMAGE_LABEL: &str = "Original image";

/// Encodes a raster about to be committed to history.
pub type CommitEncoder = fn(&RgbaImage) -> Result<Vec<u8>, RenderError>;

fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    codec::encode(pixels, OutputFormat::Png)
}

pub struct EditorSession {
    config: EditorConfig,
    resources: ResourceManager,
    history: HistoryManager,
    image: Option<RasterImage>,
    viewport: ViewportState,
    adjustments: AdjustmentState,
    transform: Transform,
    crop: Option<CropSession>,
    overlays: TextOverlayStore,
    fonts: FontBook,
    generation: u64,
    preview: PreviewScheduler,
    commit_encoder: CommitEncoder,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_resources(config, ResourceManager::new())
    }

    pub fn with_resources(config: EditorConfig, resources: ResourceManager) -> Self {
        let config = config.sanitized();
        let fonts = FontBook::from_paths(&config.font_paths);
        Self {
            history: HistoryManager::new(config.max_history_length),
            viewport: ViewportState::new(config.min_zoom, config.max_zoom),
            preview: PreviewScheduler::from_config(&config),
            image: None,
            adjustments: AdjustmentState::default(),
            transform: Transform::IDENTITY,
            crop: None,
            overlays: TextOverlayStore::new(),
            generation: 0,
            commit_encoder: encode_png,
            fonts,
            resources,
            config,
        }
    }

    /// Replaces the encoder used for history commits (PNG by default).
    pub fn with_commit_encoder(mut self, encoder: CommitEncoder) -> Self {
        self.commit_encoder = encoder;
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn image(&self) -> Option<&RasterImage> {
        self.image.as_ref()
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportState {
        self.preview.request_redraw();
        &mut self.viewport
    }

    pub fn adjustments(&self) -> &AdjustmentState {
        &self.adjustments
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn crop(&self) -> Option<&CropSession> {
        self.crop.as_ref()
    }

    pub fn is_cropping(&self) -> bool {
        self.crop.is_some()
    }

    pub fn overlays(&self) -> &TextOverlayStore {
        &self.overlays
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        self.preview.request_redraw();
        &mut self.fonts
    }

    pub fn preview(&self) -> &PreviewScheduler {
        &self.preview
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Size of the canvas buffer: the current raster after the render transform.
    pub fn canvas_bounds(&self) -> Option<ImageBounds> {
        self.image
            .as_ref()
            .map(|image| self.transform.output_bounds(image.bounds()))
    }

    fn require_canvas(&self) -> EditorResult<ImageBounds> {
        self.canvas_bounds().ok_or(EditorError::NoImage)
    }

    fn crop_limits(&self) -> CropLimits {
        CropLimits {
            min_size: self.config.min_crop_size,
            handle_size: self.config.handle_size,
        }
    }

    fn map_pointer(&self, pointer: Point, rect: CanvasScreenRect) -> EditorResult<Point> {
        let buffer = self.require_canvas()?;
        Ok(screen_to_raster(pointer, &self.viewport, rect, buffer))
    }

    // Loading

    /// Starts a new upload. Any decode still in flight becomes stale.
    pub fn begin_upload(&mut self, bytes: Vec<u8>, declared_size: u64) -> DecodeTicket {
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(generation = self.generation, declared_size, "upload started");
        DecodeTicket::new(
            self.generation,
            bytes,
            declared_size,
            UploadLimits::from(&self.config),
        )
    }

    pub fn finish_upload(&mut self, outcome: DecodeOutcome) -> EditorResult<UploadStatus> {
        if outcome.generation != self.generation {
            tracing::debug!(
                outcome = outcome.generation,
                current = self.generation,
                "discarding stale decode"
            );
            return Ok(UploadStatus::Stale);
        }
        let pixels = match outcome.result {
            Ok(pixels) => pixels,
            Err(rejection) => {
                tracing::warn!(error = %rejection, "upload rejected");
                return Err(rejection.into());
            }
        };

        let (width, height) = pixels.dimensions();
        self.clear_editing_state();
        self.history.clear();
        let (raster, handle) = RasterImage::publish(&self.resources, pixels, outcome.bytes);
        self.image = Some(self.history.commit(raster, handle, ORIGINAL_IMAGE_LABEL).clone());
        self.preview.request_redraw();
        tracing::info!(width, height, "image loaded");
        Ok(UploadStatus::Loaded { width, height })
    }

    /// Decodes on the calling thread.
    pub fn load_image(&mut self, bytes: Vec<u8>) -> EditorResult<UploadStatus> {
        let declared_size = bytes.len() as u64;
        let ticket = self.begin_upload(bytes, declared_size);
        self.finish_upload(ticket.decode())
    }

    /// Drops every image, edit and resource. In-flight decodes become stale.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.clear_editing_state();
        let dropped = self.history.clear();
        self.image = None;
        self.preview.cancel();
        let released = self.resources.release_all();
        tracing::info!(dropped, released, "session reset");
    }

    fn clear_editing_state(&mut self) {
        self.crop = None;
        self.transform.reset();
        self.adjustments.reset();
        self.overlays.remove_all();
        self.viewport.reset();
    }

    // Crop

    pub fn start_crop(&mut self, aspect: AspectRatio) -> EditorResult<&CropSession> {
        let bounds = self.require_canvas()?;
        let limits = self.crop_limits();
        self.overlays.escape();
        self.preview.request_redraw();
        tracing::debug!(?aspect, width = bounds.width, height = bounds.height, "crop started");
        Ok(self.crop.insert(CropSession::new(bounds, aspect, limits)))
    }

    fn crop_mut(&mut self) -> EditorResult<&mut CropSession> {
        self.crop.as_mut().ok_or(EditorError::CropInactive)
    }

    pub fn set_aspect_ratio(&mut self, aspect: AspectRatio) -> EditorResult<()> {
        self.crop_mut()?.set_aspect_ratio(aspect);
        self.preview.request_redraw();
        Ok(())
    }

    pub fn set_grid(&mut self, grid: GridType) -> EditorResult<()> {
        self.crop_mut()?.set_grid(grid);
        self.preview.request_redraw();
        Ok(())
    }

    pub fn set_crop_box(&mut self, crop_box: CropBox) -> EditorResult<()> {
        self.crop_mut()?.set_crop_box(crop_box);
        self.preview.request_redraw();
        Ok(())
    }

    pub fn set_crop_rotation(&mut self, degrees: f64) -> EditorResult<()> {
        self.crop_mut()?.set_rotation_degrees(degrees);
        self.preview.request_redraw();
        Ok(())
    }

    pub fn crop_pointer_down(
        &mut self,
        pointer: Point,
        rect: CanvasScreenRect,
    ) -> EditorResult<Option<CropHandle>> {
        let point = self.map_pointer(pointer, rect)?;
        Ok(self.crop_mut()?.pointer_down(point))
    }

    pub fn crop_pointer_move(&mut self, pointer: Point, rect: CanvasScreenRect) -> EditorResult<bool> {
        let point = self.map_pointer(pointer, rect)?;
        let changed = self.crop_mut()?.pointer_move(point);
        if changed {
            self.preview.request_redraw();
        }
        Ok(changed)
    }

    pub fn crop_pointer_up(&mut self) -> EditorResult<()> {
        self.crop_mut()?.pointer_up();
        Ok(())
    }

    /// Flattens transform and crop rotation, cuts out the box and commits it.
    pub fn confirm_crop(&mut self) -> EditorResult<ImageBounds> {
        let crop = self.crop.as_ref().ok_or(EditorError::CropInactive)?;
        let image = self.image.as_ref().ok_or(EditorError::NoImage)?;

        let flattened = flatten_geometry(image.pixels(), self.transform, crop.rotation_degrees());
        let crop_box = crop.crop_box();
        let (x, y, _, _) = crop_box.pixel_region(ImageBounds::new(flattened.width(), flattened.height()));
        let region = crop_region(&flattened, crop_box).map_err(EditorError::render("crop"))?;
        let (width, height) = region.dimensions();

        self.commit_raster(region, format!("Crop to {width}×{height}"), "crop")?;
        self.crop = None;
        self.transform.reset();
        self.overlays.translate_all(-f64::from(x), -f64::from(y));
        Ok(ImageBounds::new(width, height))
    }

    pub fn cancel_crop(&mut self) {
        if self.crop.take().is_some() {
            tracing::debug!("crop cancelled");
            self.preview.request_redraw();
        }
    }

    // Text

    pub fn add_text(&mut self) -> u64 {
        self.preview.request_redraw();
        self.overlays.add()
    }

    pub fn add_text_with(&mut self, text: impl Into<String>) -> u64 {
        self.preview.request_redraw();
        self.overlays.add_with_text(text)
    }

    pub fn update_text(&mut self, id: u64, patch: TextOverlayPatch) -> EditorResult<()> {
        self.overlays.update(id, patch)?;
        self.preview.request_redraw();
        Ok(())
    }

    pub fn remove_text(&mut self, id: u64) -> EditorResult<()> {
        self.overlays.remove(id)?;
        self.preview.request_redraw();
        Ok(())
    }

    pub fn clear_text(&mut self) {
        self.overlays.remove_all();
        self.preview.request_redraw();
    }

    pub fn set_active_text(&mut self, id: Option<u64>) -> EditorResult<()> {
        self.overlays.set_active(id)?;
        self.preview.request_redraw();
        Ok(())
    }

    pub fn set_text_tool_style(&mut self, style: TextStyle) {
        self.overlays.set_tool_style(style);
    }

    /// Selects and starts dragging the overlay under the pointer; a miss deselects.
    pub fn text_pointer_down(
        &mut self,
        pointer: Point,
        rect: CanvasScreenRect,
    ) -> EditorResult<Option<u64>> {
        let point = self.map_pointer(pointer, rect)?;
        let hit = self.overlays.pointer_down(point, &self.fonts);
        self.preview.request_redraw();
        Ok(hit)
    }

    pub fn text_pointer_move(&mut self, pointer: Point, rect: CanvasScreenRect) -> EditorResult<bool> {
        if !self.overlays.is_dragging() {
            return Ok(false);
        }
        let point = self.map_pointer(pointer, rect)?;
        let moved = self.overlays.drag_to(point);
        if moved {
            self.preview.request_redraw();
        }
        Ok(moved)
    }

    pub fn text_pointer_up(&mut self) {
        self.overlays.end_drag();
    }

    pub fn escape(&mut self) {
        self.overlays.escape();
        self.preview.request_redraw();
    }

    // Geometry, adjustments and history

    /// Resamples the flattened raster to `width`×`height` and commits it.
    ///
    /// With `keep_aspect` the height follows the width.
    pub fn apply_resize(
        &mut self,
        width: u32,
        height: u32,
        keep_aspect: bool,
    ) -> EditorResult<ImageBounds> {
        let image = self.image.as_ref().ok_or(EditorError::NoImage)?;
        let flattened = flatten_geometry(image.pixels(), self.transform, 0.0);
        let (source_width, source_height) = flattened.dimensions();

        let max = self.config.max_dimension;
        let width = width.clamp(1, max);
        let height = if keep_aspect {
            let derived = f64::from(width) * f64::from(source_height) / f64::from(source_width);
            (derived.round() as u32).clamp(1, max)
        } else {
            height.clamp(1, max)
        };

        let resized = resize_exact(&flattened, width, height).map_err(EditorError::render("resize"))?;
        self.commit_raster(resized, format!("Resize to {width}×{height}"), "resize")?;
        self.crop = None;
        self.transform.reset();

        let scale_x = f64::from(width) / f64::from(source_width);
        let scale_y = f64::from(height) / f64::from(source_height);
        self.overlays.scale_all(scale_x, scale_y);
        Ok(ImageBounds::new(width, height))
    }

    /// Resize driven by raw panel input. Unparseable input leaves everything
    /// as it is and yields `Ok(None)`.
    pub fn apply_resize_input(
        &mut self,
        width: &str,
        height: &str,
        keep_aspect: bool,
    ) -> EditorResult<Option<ImageBounds>> {
        let Some(width) = parse_dimension(width) else {
            tracing::debug!(input = width, "ignoring resize width");
            return Ok(None);
        };
        let height = match (parse_dimension(height), keep_aspect) {
            (Some(height), _) => height,
            (None, true) => width,
            (None, false) => {
                tracing::debug!(input = height, "ignoring resize height");
                return Ok(None);
            }
        };
        self.apply_resize(width, height, keep_aspect).map(Some)
    }

    fn commit_raster(
        &mut self,
        pixels: RgbaImage,
        label: String,
        operation: &'static str,
    ) -> EditorResult<()> {
        let encoded = (self.commit_encoder)(&pixels).map_err(EditorError::render(operation))?;
        self.history.stash(self.edit_state());
        let (raster, handle) = RasterImage::publish(&self.resources, pixels, encoded);
        self.image = Some(self.history.commit(raster, handle, label).clone());
        self.preview.request_redraw();
        Ok(())
    }

    pub fn rotate_left(&mut self) {
        self.update_transform(Transform::rotate_left);
    }

    pub fn rotate_right(&mut self) {
        self.update_transform(Transform::rotate_right);
    }

    pub fn flip_horizontal(&mut self) {
        self.update_transform(Transform::toggle_flip_h);
    }

    pub fn flip_vertical(&mut self) {
        self.update_transform(Transform::toggle_flip_v);
    }

    pub fn reset_transform(&mut self) {
        self.update_transform(Transform::reset);
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.update_transform(|current| {
            *current = Transform {
                quarter_turns: transform.quarter_turns % 4,
                ..transform
            };
        });
    }

    fn update_transform(&mut self, change: impl FnOnce(&mut Transform)) {
        let before = self.transform;
        change(&mut self.transform);
        if before == self.transform {
            return;
        }
        tracing::debug!(from = ?before, to = ?self.transform, "transform changed");
        // The canvas changed shape under the crop box.
        if let (Some(crop), Some(bounds)) = (self.crop.as_ref(), self.canvas_bounds()) {
            let aspect = crop.aspect();
            let grid = crop.grid();
            let mut rebuilt = CropSession::new(bounds, aspect, self.crop_limits());
            rebuilt.set_grid(grid);
            self.crop = Some(rebuilt);
        }
        self.preview.request_redraw();
    }

    /// Stores clamped adjustments; the preview redraw is debounced from `now`.
    pub fn set_adjustments(&mut self, adjustments: AdjustmentState, now: Instant) {
        self.adjustments = adjustments.sanitized();
        self.preview.request_debounced(now);
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments.reset();
        self.preview.request_redraw();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Option<ImageBounds> {
        if !self.history.can_undo() {
            return None;
        }
        self.history.stash(self.edit_state());
        let raster = self.history.undo()?;
        Some(self.show_history_raster(raster))
    }

    pub fn redo(&mut self) -> Option<ImageBounds> {
        if !self.history.can_redo() {
            return None;
        }
        self.history.stash(self.edit_state());
        let raster = self.history.redo()?;
        Some(self.show_history_raster(raster))
    }

    /// Transform and overlays as they relate to the current raster.
    pub fn edit_state(&self) -> EditState {
        EditState {
            transform: self.transform,
            overlays: self.overlays.overlays().to_vec(),
        }
    }

    fn show_history_raster(&mut self, raster: RasterImage) -> ImageBounds {
        let state = self
            .history
            .current_entry()
            .map(|entry| entry.edit_state().clone())
            .unwrap_or_default();
        self.transform = state.transform;
        self.overlays.restore(state.overlays);
        let bounds = self.transform.output_bounds(raster.bounds());
        self.image = Some(raster);
        self.crop = None;
        self.preview.request_redraw();
        bounds
    }

    // Rendering

    fn render_request(&self, with_chrome: bool) -> EditorResult<RenderRequest<'_>> {
        let image = self.image.as_ref().ok_or(EditorError::NoImage)?;
        Ok(RenderRequest {
            source: image.pixels(),
            adjustments: &self.adjustments,
            transform: self.transform,
            overlays: self.overlays.overlays(),
            crop: if with_chrome { self.crop.as_ref() } else { None },
            fonts: &self.fonts,
            max_dimension: self.config.max_dimension,
        })
    }

    /// Live preview including crop chrome.
    pub fn render_preview(&self) -> EditorResult<RgbaImage> {
        let request = self.render_request(true)?;
        compositor::render(&request).map_err(EditorError::render("preview"))
    }

    /// Renders a preview if the scheduler says one is due at `now`.
    pub fn poll_preview(&mut self, now: Instant) -> EditorResult<Option<RgbaImage>> {
        if self.image.is_none() || !self.preview.poll(now) {
            return Ok(None);
        }
        self.render_preview().map(Some)
    }

    /// Full-resolution export with adjustments and overlays baked in, without chrome.
    pub fn render_final(&self, format: OutputFormat) -> EditorResult<Vec<u8>> {
        let request = self.render_request(false)?;
        let rendered = compositor::render(&request).map_err(EditorError::render("export"))?;
        let bytes = codec::encode(&rendered, format).map_err(|err| {
            tracing::warn!(error = %err, format = format.label(), "export failed");
            EditorError::Render {
                operation: "export",
                source: err,
            }
        })?;
        tracing::info!(
            format = format.label(),
            width = rendered.width(),
            height = rendered.height(),
            bytes = bytes.len(),
            "export complete"
        );
        Ok(bytes)
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.history.clear();
        self.resources.release_all();
    }
}
