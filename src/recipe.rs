//! Batch edits described as JSON, replayed onto a session in a fixed order:
//! transform, crop, resize, text overlays, then adjustments.

use std::path::Path;
use std::time::Instant;

use serde::Deserialize;

use crate::compositor::{AdjustmentState, Transform};
use crate::editor::tools::{AspectRatio, CropBox, GridType, Point, TextOverlayPatch, TextStyle};
use crate::error::{AppError, AppResult};
use crate::session::{EditorResult, EditorSession};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub transform: Transform,
    pub crop: Option<CropStep>,
    pub resize: Option<ResizeStep>,
    pub overlays: Vec<OverlayStep>,
    pub adjustments: AdjustmentState,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CropStep {
    #[serde(default = "default_crop_aspect")]
    pub aspect: AspectRatio,
    /// Explicit box in canvas pixels; the aspect's initial box when absent.
    #[serde(default)]
    pub rect: Option<CropRect>,
    #[serde(default)]
    pub rotation: f64,
}

const fn default_crop_aspect() -> AspectRatio {
    AspectRatio::Free
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ResizeStep {
    pub width: u32,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlayStep {
    pub text: String,
    pub position: Point,
    #[serde(default)]
    pub style: TextStyle,
}

pub fn parse_recipe(contents: &str) -> serde_json::Result<Recipe> {
    serde_json::from_str(contents)
}

pub fn load_recipe(path: &Path) -> AppResult<Recipe> {
    let contents = std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_recipe(&contents).map_err(|source| AppError::Recipe {
        path: path.to_path_buf(),
        source,
    })
}

impl Recipe {
    pub fn apply(&self, session: &mut EditorSession) -> EditorResult<()> {
        session.set_transform(self.transform);

        if let Some(crop) = &self.crop {
            session.start_crop(crop.aspect)?;
            session.set_grid(GridType::None)?;
            if let Some(rect) = crop.rect {
                session.set_crop_box(CropBox::new(rect.x, rect.y, rect.width, rect.height))?;
            }
            session.set_crop_rotation(crop.rotation)?;
            let size = session.confirm_crop()?;
            tracing::debug!(width = size.width, height = size.height, "recipe crop applied");
        }

        if let Some(resize) = self.resize {
            let keep_aspect = resize.height.is_none();
            let height = resize.height.unwrap_or(resize.width);
            session.apply_resize(resize.width, height, keep_aspect)?;
        }

        for step in &self.overlays {
            session.set_text_tool_style(step.style.clone());
            let id = session.add_text_with(step.text.clone());
            session.update_text(
                id,
                TextOverlayPatch {
                    position: Some(step.position),
                    ..TextOverlayPatch::default()
                },
            )?;
        }
        session.set_active_text(None)?;

        session.set_adjustments(self.adjustments, Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{png_bytes, OutputFormat};
    use crate::editor::tools::ImageBounds;

    #[test]
    fn parses_partial_recipe() {
        let recipe = parse_recipe(
            r#"{
                "transform": { "quarter_turns": 1, "flip_h": true },
                "crop": { "aspect": "16:9" },
                "resize": { "width": 320 },
                "overlays": [
                    { "text": "Hi", "position": { "x": 10, "y": 12 }, "style": { "size": 20 } }
                ],
                "adjustments": { "brightness": 120 }
            }"#,
        )
        .unwrap();
        assert_eq!(recipe.transform.quarter_turns, 1);
        assert!(recipe.transform.flip_h);
        assert_eq!(recipe.crop.as_ref().map(|crop| crop.aspect), Some(AspectRatio::Ratio16x9));
        assert_eq!(recipe.resize.and_then(|resize| resize.height), None);
        assert_eq!(recipe.overlays[0].style.size, 20.0);
        assert_eq!(recipe.adjustments.brightness, 120.0);
        assert_eq!(recipe.adjustments.contrast, 100.0);
    }

    #[test]
    fn empty_recipe_is_identity() {
        assert_eq!(parse_recipe("{}").unwrap(), Recipe::default());
    }

    #[test]
    fn apply_runs_steps_in_order() {
        let mut session = EditorSession::default();
        session.load_image(png_bytes(200, 100, [10, 10, 10, 255])).unwrap();
        let recipe = parse_recipe(
            r#"{
                "transform": { "quarter_turns": 1 },
                "crop": { "rect": { "x": 0, "y": 0, "width": 100, "height": 100 } },
                "resize": { "width": 50 },
                "overlays": [ { "text": "A", "position": { "x": 5, "y": 5 } } ]
            }"#,
        )
        .unwrap();

        recipe.apply(&mut session).unwrap();
        assert_eq!(session.canvas_bounds(), Some(ImageBounds::new(50, 50)));
        assert_eq!(
            session.history().labels(),
            vec!["Original image", "Crop to 100×100", "Resize to 50×50"]
        );
        assert_eq!(session.overlays().len(), 1);
        assert_eq!(session.overlays().active(), None);
        assert!(session.render_final(OutputFormat::Png).is_ok());
    }

    #[test]
    fn missing_recipe_file_is_a_read_error() {
        let err = load_recipe(Path::new("/definitely/not/here/recipe.json")).unwrap_err();
        assert!(matches!(err, AppError::Read { .. }));
    }
}
