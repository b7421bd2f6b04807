use serde::Deserialize;

use super::{Color, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// Offset from the anchor x to the left edge of a line `width` wide.
    pub fn left_edge_offset(self, width: f64) -> f64 {
        match self {
            Self::Left => 0.0,
            Self::Center => -width / 2.0,
            Self::Right => -width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TextStroke {
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TextShadow {
    pub color: Color,
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
    #[serde(default)]
    pub blur: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub weight: u16,
    pub style: FontStyle,
    pub color: Color,
    pub align: TextAlign,
    pub opacity: u8,
    pub stroke: Option<TextStroke>,
    pub shadow: Option<TextShadow>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: "Sans".to_string(),
            size: 32.0,
            weight: 400,
            style: FontStyle::Normal,
            color: Color::WHITE,
            align: TextAlign::Left,
            opacity: 100,
            stroke: None,
            shadow: None,
        }
    }
}

impl TextStyle {
    pub fn set_size(&mut self, size: f32) {
        self.size = clamp_text_size(size);
    }

    pub fn set_weight(&mut self, weight: u16) {
        self.weight = clamp_text_weight(weight);
    }

    pub fn set_opacity(&mut self, opacity: u8) {
        self.opacity = opacity.min(100);
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }

    pub fn is_italic(&self) -> bool {
        self.style == FontStyle::Italic
    }

    pub fn line_height(&self) -> f64 {
        f64::from(self.size) * 1.2
    }

    pub(crate) fn sanitized(mut self) -> Self {
        self.set_size(self.size);
        self.set_weight(self.weight);
        self.set_opacity(self.opacity);
        if let Some(stroke) = self.stroke.as_mut() {
            stroke.width = clamp_effect_radius(stroke.width);
        }
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.blur = clamp_effect_radius(shadow.blur);
        }
        self
    }
}

fn clamp_text_size(size: f32) -> f32 {
    if size.is_finite() {
        size.clamp(1.0, 512.0)
    } else {
        1.0
    }
}

const fn clamp_text_weight(weight: u16) -> u16 {
    if weight < 100 {
        100
    } else if weight > 900 {
        900
    } else {
        weight
    }
}

fn clamp_effect_radius(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 64.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub id: u64,
    pub text: String,
    /// Alignment anchor x, top of the first line y.
    pub position: Point,
    pub style: TextStyle,
    pub visible: bool,
}

impl TextOverlay {
    pub fn new(id: u64, position: Point, text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            id,
            text: text.into(),
            position,
            style: style.sanitized(),
            visible: true,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    pub fn apply(&mut self, patch: TextOverlayPatch) {
        let TextOverlayPatch {
            text,
            position,
            family,
            size,
            weight,
            style,
            color,
            align,
            opacity,
            visible,
            stroke,
            shadow,
        } = patch;

        if let Some(text) = text {
            self.text = text;
        }
        if let Some(position) = position {
            self.position = position;
        }
        if let Some(family) = family {
            self.style.family = family;
        }
        if let Some(size) = size {
            self.style.set_size(size);
        }
        if let Some(weight) = weight {
            self.style.set_weight(weight);
        }
        if let Some(style) = style {
            self.style.style = style;
        }
        if let Some(color) = color {
            self.style.color = color;
        }
        if let Some(align) = align {
            self.style.align = align;
        }
        if let Some(opacity) = opacity {
            self.style.set_opacity(opacity);
        }
        if let Some(visible) = visible {
            self.visible = visible;
        }
        if let Some(stroke) = stroke {
            self.style.stroke = stroke;
        }
        if let Some(shadow) = shadow {
            self.style.shadow = shadow;
        }
        self.style = std::mem::take(&mut self.style).sanitized();
    }
}

/// Partial update for a [`TextOverlay`]; `None` leaves a field unchanged.
///
/// `stroke`/`shadow` use `Some(None)` to clear the effect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextOverlayPatch {
    pub text: Option<String>,
    pub position: Option<Point>,
    pub family: Option<String>,
    pub size: Option<f32>,
    pub weight: Option<u16>,
    pub style: Option<FontStyle>,
    pub color: Option<Color>,
    pub align: Option<TextAlign>,
    pub opacity: Option<u8>,
    pub visible: Option<bool>,
    pub stroke: Option<Option<TextStroke>>,
    pub shadow: Option<Option<TextShadow>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_overlay_clamps_style_domains() {
        let style = TextStyle {
            size: 0.0,
            weight: 2000,
            opacity: 250,
            ..TextStyle::default()
        };
        let overlay = TextOverlay::new(1, Point::new(0.0, 0.0), "hi", style);
        assert_eq!(overlay.style.size, 1.0);
        assert_eq!(overlay.style.weight, 900);
        assert_eq!(overlay.style.opacity, 100);
        assert!(overlay.visible);
    }

    #[test]
    fn patch_updates_only_present_fields() {
        let mut overlay = TextOverlay::new(3, Point::new(5.0, 6.0), "a", TextStyle::default());
        overlay.apply(TextOverlayPatch {
            text: Some("b\nc".to_string()),
            align: Some(TextAlign::Center),
            stroke: Some(Some(TextStroke {
                color: Color::BLACK,
                width: 100.0,
            })),
            ..TextOverlayPatch::default()
        });
        assert_eq!(overlay.text, "b\nc");
        assert_eq!(overlay.line_count(), 2);
        assert_eq!(overlay.position, Point::new(5.0, 6.0));
        assert_eq!(overlay.style.align, TextAlign::Center);
        assert_eq!(overlay.style.stroke.map(|stroke| stroke.width), Some(64.0));

        overlay.apply(TextOverlayPatch {
            stroke: Some(None),
            ..TextOverlayPatch::default()
        });
        assert_eq!(overlay.style.stroke, None);
    }

    #[test]
    fn alignment_offsets_left_edge() {
        assert_eq!(TextAlign::Left.left_edge_offset(80.0), 0.0);
        assert_eq!(TextAlign::Center.left_edge_offset(80.0), -40.0);
        assert_eq!(TextAlign::Right.left_edge_offset(80.0), -80.0);
    }

    #[test]
    fn patch_deserializes_from_partial_json() {
        let patch: TextOverlayPatch =
            serde_json::from_str(r#"{ "text": "hello", "opacity": 40, "style": "italic" }"#)
                .unwrap();
        assert_eq!(patch.text.as_deref(), Some("hello"));
        assert_eq!(patch.opacity, Some(40));
        assert_eq!(patch.style, Some(FontStyle::Italic));
        assert_eq!(patch.size, None);
    }
}
