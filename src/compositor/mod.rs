//! Single rendering path shared by the live preview, crop commits and export.

mod adjust;
mod chrome;
mod fonts;

pub use adjust::{apply as apply_adjustments, AdjustmentState, MAX_BLUR_RADIUS};
pub use chrome::{dimension_label, draw_crop_chrome};
pub use fonts::{FontBook, FontError, FALLBACK_ADVANCE_EM};

use image::{imageops, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use serde::Deserialize;

use crate::codec::RenderError;
use crate::config::DEFAULT_MAX_DIMENSION;
use crate::editor::tools::{Color, CropBox, CropSession, ImageBounds, TextOverlay};

/// Render-time quarter-turn rotation (clockwise) followed by screen-space flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub quarter_turns: u8,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        quarter_turns: 0,
        flip_h: false,
        flip_v: false,
    };

    pub fn rotate_right(&mut self) {
        self.quarter_turns = (self.quarter_turns % 4 + 1) % 4;
    }

    pub fn rotate_left(&mut self) {
        self.quarter_turns = (self.quarter_turns % 4 + 3) % 4;
    }

    pub fn toggle_flip_h(&mut self) {
        self.flip_h = !self.flip_h;
    }

    pub fn toggle_flip_v(&mut self) {
        self.flip_v = !self.flip_v;
    }

    pub fn reset(&mut self) {
        *self = Self::IDENTITY;
    }

    pub const fn degrees(self) -> u16 {
        (self.quarter_turns % 4) as u16 * 90
    }

    pub const fn swaps_axes(self) -> bool {
        self.quarter_turns % 2 == 1
    }

    pub const fn is_identity(self) -> bool {
        self.quarter_turns % 4 == 0 && !self.flip_h && !self.flip_v
    }

    pub const fn output_bounds(self, source: ImageBounds) -> ImageBounds {
        if self.swaps_axes() {
            ImageBounds::new(source.height, source.width)
        } else {
            source
        }
    }

    pub fn apply(self, source: &RgbaImage) -> RgbaImage {
        let mut out = match self.quarter_turns % 4 {
            1 => imageops::rotate90(source),
            2 => imageops::rotate180(source),
            3 => imageops::rotate270(source),
            _ => source.clone(),
        };
        if self.flip_h {
            imageops::flip_horizontal_in_place(&mut out);
        }
        if self.flip_v {
            imageops::flip_vertical_in_place(&mut out);
        }
        out
    }
}

/// Everything one render needs; all borrowed, nothing mutated.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub source: &'a RgbaImage,
    pub adjustments: &'a AdjustmentState,
    pub transform: Transform,
    pub overlays: &'a [TextOverlay],
    /// Crop session whose rotation and chrome are previewed; never set for export.
    pub crop: Option<&'a CropSession>,
    pub fonts: &'a FontBook,
    pub max_dimension: u32,
}

impl<'a> RenderRequest<'a> {
    pub fn new(
        source: &'a RgbaImage,
        adjustments: &'a AdjustmentState,
        fonts: &'a FontBook,
    ) -> Self {
        Self {
            source,
            adjustments,
            transform: Transform::IDENTITY,
            overlays: &[],
            crop: None,
            fonts,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Output size after the transform, scaled down to fit `max_dimension`.
pub fn output_size(source: ImageBounds, transform: Transform, max_dimension: u32) -> (ImageBounds, f64) {
    let bounds = transform.output_bounds(source);
    let limit = f64::from(max_dimension.max(1));
    let scale = (limit / bounds.width_f64().max(1.0))
        .min(limit / bounds.height_f64().max(1.0))
        .min(1.0);
    if scale >= 1.0 {
        return (bounds, 1.0);
    }
    let width = (bounds.width_f64() * scale).floor().max(1.0) as u32;
    let height = (bounds.height_f64() * scale).floor().max(1.0) as u32;
    (ImageBounds::new(width, height), scale)
}

pub fn render(request: &RenderRequest<'_>) -> Result<RgbaImage, RenderError> {
    let source_bounds = ImageBounds::new(request.source.width(), request.source.height());
    let (bounds, scale) = output_size(source_bounds, request.transform, request.max_dimension);
    ensure_allocatable(bounds)?;

    let adjusted = apply_adjustments(request.source, request.adjustments);
    let mut canvas = request.transform.apply(&adjusted);
    if let Some(crop) = request.crop {
        canvas = rotate_by_degrees(&canvas, crop.rotation_degrees());
    }
    if scale < 1.0 {
        canvas = imageops::resize(
            &canvas,
            bounds.width,
            bounds.height,
            imageops::FilterType::Triangle,
        );
    }

    let mut skipped = 0_usize;
    for overlay in request.overlays.iter().filter(|overlay| overlay.visible) {
        let drawn = if scale < 1.0 {
            request.fonts.draw_overlay(&mut canvas, &scaled_overlay(overlay, scale))
        } else {
            request.fonts.draw_overlay(&mut canvas, overlay)
        };
        if !drawn {
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "text overlays skipped without a registered font");
    }

    if let Some(crop) = request.crop {
        draw_crop_chrome(&mut canvas, crop, scale, request.fonts);
    }

    tracing::debug!(
        width = canvas.width(),
        height = canvas.height(),
        overlays = request.overlays.len(),
        chrome = request.crop.is_some(),
        "render complete"
    );
    Ok(canvas)
}

/// Bakes the render transform and a free rotation into pixels, without adjustments.
pub fn flatten_geometry(source: &RgbaImage, transform: Transform, rotation_degrees: f64) -> RgbaImage {
    rotate_by_degrees(&transform.apply(source), rotation_degrees)
}

/// Copies the whole-pixel region covered by `crop` out of `image`.
pub fn crop_region(image: &RgbaImage, crop: CropBox) -> Result<RgbaImage, RenderError> {
    if crop.width <= 0.0 || crop.height <= 0.0 || image.width() == 0 || image.height() == 0 {
        return Err(RenderError::EmptyRegion);
    }
    let (x, y, width, height) = crop.pixel_region(ImageBounds::new(image.width(), image.height()));
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyRegion);
    }
    Ok(imageops::crop_imm(image, x, y, width, height).to_image())
}

pub fn resize_exact(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, RenderError> {
    ensure_allocatable(ImageBounds::new(width, height))?;
    Ok(imageops::resize(
        image,
        width,
        height,
        imageops::FilterType::Lanczos3,
    ))
}

fn rotate_by_degrees(image: &RgbaImage, degrees: f64) -> RgbaImage {
    if !degrees.is_finite() || degrees.abs() < 0.01 {
        return image.clone();
    }
    rotate_about_center(
        image,
        (degrees as f32).to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}

fn ensure_allocatable(bounds: ImageBounds) -> Result<(), RenderError> {
    let bytes = (bounds.width as usize)
        .checked_mul(bounds.height as usize)
        .and_then(|pixels| pixels.checked_mul(4));
    match bytes {
        Some(bytes) if bytes > 0 && bytes <= isize::MAX as usize => Ok(()),
        _ => Err(RenderError::Allocation {
            width: bounds.width,
            height: bounds.height,
        }),
    }
}

fn scaled_overlay(overlay: &TextOverlay, scale: f64) -> TextOverlay {
    let mut scaled = overlay.clone();
    let factor = scale as f32;
    scaled.position.x *= scale;
    scaled.position.y *= scale;
    scaled.style.size = (scaled.style.size * factor).max(1.0);
    if let Some(stroke) = scaled.style.stroke.as_mut() {
        stroke.width *= factor;
    }
    if let Some(shadow) = scaled.style.shadow.as_mut() {
        shadow.offset_x *= factor;
        shadow.offset_y *= factor;
        shadow.blur *= factor;
    }
    scaled
}

/// Source-over blend of `color` at `coverage` onto `pixel`.
pub(crate) fn blend_pixel(pixel: &mut Rgba<u8>, color: Color, coverage: f32) {
    let source_alpha = f32::from(color.a) / 255.0 * coverage.clamp(0.0, 1.0);
    if source_alpha <= 0.0 {
        return;
    }
    let dest_alpha = f32::from(pixel.0[3]) / 255.0;
    let out_alpha = source_alpha + dest_alpha * (1.0 - source_alpha);
    if out_alpha <= 0.0 {
        pixel.0 = [0, 0, 0, 0];
        return;
    }
    let source = [color.r, color.g, color.b];
    for (channel, source) in pixel.0.iter_mut().take(3).zip(source) {
        let blended = (f32::from(source) * source_alpha
            + f32::from(*channel) * dest_alpha * (1.0 - source_alpha))
            / out_alpha;
        *channel = blended.round().clamp(0.0, 255.0) as u8;
    }
    pixel.0[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
}
