use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use thiserror::Error;

use super::blend_pixel;
use crate::editor::tools::{text_extents, Color, TextMeasurer, TextOverlay, TextStyle};

/// Advance per character, as a fraction of the font size, when no face is registered.
pub const FALLBACK_ADVANCE_EM: f64 = 0.62;

const SYNTHETIC_ITALIC_SHEAR: f32 = 0.2;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a usable font")]
    Invalid { path: PathBuf },
}

#[derive(Clone)]
struct FontFace {
    family: String,
    bold: bool,
    italic: bool,
    font: FontArc,
}

/// Registered faces keyed by family, weight class and slant.
#[derive(Clone, Default)]
pub struct FontBook {
    faces: Vec<FontFace>,
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.faces
                    .iter()
                    .map(|face| (&face.family, face.bold, face.italic)),
            )
            .finish()
    }
}

struct ResolvedFace<'a> {
    font: &'a FontArc,
    synthetic_bold: bool,
    synthetic_italic: bool,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every path, skipping (and logging) the ones that fail.
    pub fn from_paths(paths: &[PathBuf]) -> Self {
        let mut book = Self::new();
        for path in paths {
            if let Err(err) = book.load_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to load font");
            }
        }
        book
    }

    pub fn register(&mut self, family: &str, bold: bool, italic: bool, font: FontArc) {
        let family = family.trim().to_ascii_lowercase();
        self.faces
            .retain(|face| !(face.family == family && face.bold == bold && face.italic == italic));
        tracing::debug!(family = family.as_str(), bold, italic, "font registered");
        self.faces.push(FontFace {
            family,
            bold,
            italic,
            font,
        });
    }

    pub fn register_bytes(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), FontError> {
        let font = FontArc::try_from_vec(bytes).map_err(|_| FontError::Invalid {
            path: PathBuf::from(family),
        })?;
        self.register(family, bold, italic, font);
        Ok(())
    }

    /// Registers a font file under the family named by its file stem,
    /// e.g. `DejaVuSans-BoldOblique.ttf` becomes bold italic "DejaVuSans".
    pub fn load_file(&mut self, path: &Path) -> Result<(), FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|_| FontError::Invalid {
            path: path.to_path_buf(),
        })?;
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let (family, bold, italic) = parse_face_name(stem);
        self.register(family, bold, italic, font);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    fn resolve(&self, style: &TextStyle) -> Option<ResolvedFace<'_>> {
        let family = style.family.trim().to_ascii_lowercase();
        let (bold, italic) = (style.is_bold(), style.is_italic());
        let same_family: Vec<&FontFace> = self
            .faces
            .iter()
            .filter(|face| face.family == family)
            .collect();

        let face = same_family
            .iter()
            .copied()
            .find(|face| face.bold == bold && face.italic == italic)
            .or_else(|| same_family.iter().copied().find(|face| face.bold == bold))
            .or_else(|| same_family.first().copied())
            .or_else(|| {
                self.faces
                    .iter()
                    .find(|face| face.bold == bold && face.italic == italic)
            })
            .or_else(|| self.faces.first())?;

        Some(ResolvedFace {
            font: &face.font,
            synthetic_bold: bold && !face.bold,
            synthetic_italic: italic && !face.italic,
        })
    }

    /// Draws an overlay (shadow, stroke, fill) onto `canvas`.
    ///
    /// Returns `false` when no face is available to rasterize with.
    pub fn draw_overlay(&self, canvas: &mut RgbaImage, overlay: &TextOverlay) -> bool {
        let Some(face) = self.resolve(&overlay.style) else {
            return false;
        };
        let style = &overlay.style;
        let opacity = f32::from(style.opacity) / 100.0;
        if opacity <= 0.0 || overlay.text.is_empty() {
            return true;
        }

        let extents = text_extents(overlay, self);
        let stroke_width = style.stroke.map_or(0.0, |stroke| stroke.width);
        let shadow_blur = style.shadow.map_or(0.0, |shadow| shadow.blur);
        let pad = f64::from(style.size) * 0.5 + f64::from(stroke_width + shadow_blur * 3.0) + 2.0;
        let origin_x = (extents.x - pad).floor();
        let origin_y = (extents.y - pad).floor();
        let mask_width = (extents.width + pad * 2.0).ceil().max(1.0) as u32;
        let mask_height = (extents.height + pad * 2.0).ceil().max(1.0) as u32;

        let mut mask = GrayImage::new(mask_width, mask_height);
        self.fill_coverage(&mut mask, overlay, &face, origin_x, origin_y);
        let origin = (origin_x as i64, origin_y as i64);

        if let Some(shadow) = style.shadow {
            let shadow_mask = if shadow.blur > 0.0 {
                gaussian_blur_f32(&mask, shadow.blur)
            } else {
                mask.clone()
            };
            let offset = (
                origin.0 + f64::from(shadow.offset_x).round() as i64,
                origin.1 + f64::from(shadow.offset_y).round() as i64,
            );
            composite_mask(canvas, &shadow_mask, offset, shadow.color, opacity);
        }
        if let Some(stroke) = style.stroke.filter(|stroke| stroke.width > 0.0) {
            let radius = (stroke.width / 2.0).ceil().clamp(1.0, 32.0) as u8;
            let stroke_mask = dilate(&mask, Norm::LInf, radius);
            composite_mask(canvas, &stroke_mask, origin, stroke.color, opacity);
        }
        composite_mask(canvas, &mask, origin, style.color, opacity);
        true
    }

    fn fill_coverage(
        &self,
        mask: &mut GrayImage,
        overlay: &TextOverlay,
        face: &ResolvedFace<'_>,
        origin_x: f64,
        origin_y: f64,
    ) {
        let style = &overlay.style;
        let scaled = face.font.as_scaled(style.size);
        let ascent = scaled.ascent();
        let line_height = self.line_height(style);
        let (mask_width, mask_height) = (mask.width() as i64, mask.height() as i64);

        for (index, line) in overlay.lines().enumerate() {
            let width = self.line_width(line, style);
            let left = overlay.position.x + style.align.left_edge_offset(width) - origin_x;
            let top = overlay.position.y + line_height * index as f64 - origin_y;
            let baseline = top as f32 + ascent;

            let mut cursor = left as f32;
            let mut previous = None;
            for ch in line.chars() {
                let id = face.font.glyph_id(ch);
                if let Some(previous) = previous {
                    cursor += scaled.kern(previous, id);
                }
                let glyph = id.with_scale_and_position(style.size, point(cursor, baseline));
                cursor += scaled.h_advance(id);
                previous = Some(id);

                let Some(outlined) = face.font.outline_glyph(glyph) else {
                    continue;
                };
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let mut x = bounds.min.x + px as f32;
                    let y = bounds.min.y + py as f32;
                    if face.synthetic_italic {
                        x += (baseline - y) * SYNTHETIC_ITALIC_SHEAR;
                    }
                    let (ix, iy) = (x.round() as i64, y.round() as i64);
                    let spread = if face.synthetic_bold { 2 } else { 1 };
                    for dx in 0..spread {
                        let tx = ix + dx;
                        if tx < 0 || iy < 0 || tx >= mask_width || iy >= mask_height {
                            continue;
                        }
                        let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                        let pixel = mask.get_pixel_mut(tx as u32, iy as u32);
                        pixel.0[0] = pixel.0[0].max(value);
                    }
                });
            }
        }
    }
}

impl TextMeasurer for FontBook {
    fn line_width(&self, line: &str, style: &TextStyle) -> f64 {
        let Some(face) = self.resolve(style) else {
            return FALLBACK_ADVANCE_EM * f64::from(style.size) * line.chars().count() as f64;
        };
        let scaled = face.font.as_scaled(style.size);
        let mut width = 0.0_f32;
        let mut previous = None;
        for ch in line.chars() {
            let id = face.font.glyph_id(ch);
            if let Some(previous) = previous {
                width += scaled.kern(previous, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }
        f64::from(width)
    }
}

fn composite_mask(
    canvas: &mut RgbaImage,
    mask: &GrayImage,
    origin: (i64, i64),
    color: Color,
    opacity: f32,
) {
    let (canvas_width, canvas_height) = (canvas.width() as i64, canvas.height() as i64);
    for (mx, my, Luma([coverage])) in mask.enumerate_pixels() {
        if *coverage == 0 {
            continue;
        }
        let (x, y) = (origin.0 + mx as i64, origin.1 + my as i64);
        if x < 0 || y < 0 || x >= canvas_width || y >= canvas_height {
            continue;
        }
        let alpha = f32::from(*coverage) / 255.0 * opacity;
        blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
    }
}

fn parse_face_name(stem: &str) -> (&str, bool, bool) {
    let Some((family, variant)) = stem.rsplit_once('-') else {
        return (stem, false, false);
    };
    let variant = variant.to_ascii_lowercase();
    let bold = variant.contains("bold") || variant.contains("black") || variant.contains("heavy");
    let italic = variant.contains("italic") || variant.contains("oblique");
    let known = bold || italic || variant == "regular" || variant == "book";
    if known {
        (family, bold, italic)
    } else {
        (stem, false, false)
    }
}
