use image::RgbaImage;
use imageproc::filter::gaussian_blur_f32;
use serde::Deserialize;

pub const MAX_BLUR_RADIUS: f32 = 20.0;

/// Live, non-destructive color adjustments in CSS filter units.
///
/// Percentages are 100 for identity; blur is the gaussian standard deviation
/// in pixels and hue a rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdjustmentState {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur: f32,
    pub hue: f32,
    pub opacity: f32,
}

impl Default for AdjustmentState {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
            hue: 0.0,
            opacity: 100.0,
        }
    }
}

impl AdjustmentState {
    pub fn set_brightness(&mut self, value: f32) {
        self.brightness = clamp_or(value, 0.0, 200.0, 100.0);
    }

    pub fn set_contrast(&mut self, value: f32) {
        self.contrast = clamp_or(value, 0.0, 200.0, 100.0);
    }

    pub fn set_saturation(&mut self, value: f32) {
        self.saturation = clamp_or(value, 0.0, 200.0, 100.0);
    }

    pub fn set_blur(&mut self, value: f32) {
        self.blur = clamp_or(value, 0.0, MAX_BLUR_RADIUS, 0.0);
    }

    pub fn set_hue(&mut self, value: f32) {
        self.hue = clamp_or(value, -180.0, 180.0, 0.0);
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.opacity = clamp_or(value, 0.0, 100.0, 100.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn sanitized(self) -> Self {
        let mut clamped = Self::default();
        clamped.set_brightness(self.brightness);
        clamped.set_contrast(self.contrast);
        clamped.set_saturation(self.saturation);
        clamped.set_blur(self.blur);
        clamped.set_hue(self.hue);
        clamped.set_opacity(self.opacity);
        clamped
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

type ColorMatrix = [[f32; 3]; 3];

/// Applies brightness, contrast, saturation, blur, hue, then opacity.
pub fn apply(source: &RgbaImage, adjustments: &AdjustmentState) -> RgbaImage {
    let adjustments = adjustments.sanitized();
    if adjustments.is_identity() {
        return source.clone();
    }

    let brightness = adjustments.brightness / 100.0;
    let contrast = adjustments.contrast / 100.0;
    let saturate = saturate_matrix(adjustments.saturation / 100.0);

    let mut out = source.clone();
    if brightness != 1.0 || contrast != 1.0 || adjustments.saturation != 100.0 {
        for pixel in out.pixels_mut() {
            let mut rgb = unit_rgb(pixel.0);
            for channel in &mut rgb {
                *channel = (*channel * brightness).clamp(0.0, 1.0);
                *channel = ((*channel - 0.5) * contrast + 0.5).clamp(0.0, 1.0);
            }
            rgb = multiply(&saturate, rgb);
            store_rgb(&mut pixel.0, rgb);
        }
    }

    if adjustments.blur > 0.0 {
        out = gaussian_blur_f32(&out, adjustments.blur);
    }

    if adjustments.hue != 0.0 {
        let hue = hue_rotate_matrix(adjustments.hue.to_radians());
        for pixel in out.pixels_mut() {
            let rgb = multiply(&hue, unit_rgb(pixel.0));
            store_rgb(&mut pixel.0, rgb);
        }
    }

    if adjustments.opacity < 100.0 {
        let alpha = adjustments.opacity / 100.0;
        for pixel in out.pixels_mut() {
            pixel.0[3] = (f32::from(pixel.0[3]) * alpha).round() as u8;
        }
    }

    out
}

fn unit_rgb(pixel: [u8; 4]) -> [f32; 3] {
    [
        f32::from(pixel[0]) / 255.0,
        f32::from(pixel[1]) / 255.0,
        f32::from(pixel[2]) / 255.0,
    ]
}

fn store_rgb(pixel: &mut [u8; 4], rgb: [f32; 3]) {
    for (target, value) in pixel.iter_mut().zip(rgb) {
        *target = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
}

fn multiply(matrix: &ColorMatrix, rgb: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (row, value) in matrix.iter().zip(out.iter_mut()) {
        *value = (row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]).clamp(0.0, 1.0);
    }
    out
}

fn saturate_matrix(s: f32) -> ColorMatrix {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(radians: f32) -> ColorMatrix {
    let (sin, cos) = radians.sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn one_pixel(rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba(rgba))
    }

    #[test]
    fn setters_clamp_domains() {
        let mut adjustments = AdjustmentState::default();
        adjustments.set_brightness(500.0);
        adjustments.set_blur(-3.0);
        adjustments.set_hue(720.0);
        adjustments.set_opacity(f32::NAN);
        assert_eq!(adjustments.brightness, 200.0);
        assert_eq!(adjustments.blur, 0.0);
        assert_eq!(adjustments.hue, 180.0);
        assert_eq!(adjustments.opacity, 100.0);
        adjustments.reset();
        assert!(adjustments.is_identity());
    }

    #[test]
    fn identity_leaves_pixels_untouched() {
        let image = one_pixel([12, 34, 56, 78]);
        assert_eq!(apply(&image, &AdjustmentState::default()), image);
    }

    #[test]
    fn brightness_scales_channels() {
        let adjustments = AdjustmentState {
            brightness: 50.0,
            ..AdjustmentState::default()
        };
        let out = apply(&one_pixel([200, 100, 0, 255]), &adjustments);
        assert_eq!(out.get_pixel(0, 0).0, [100, 50, 0, 255]);
    }

    #[test]
    fn zero_contrast_is_mid_gray() {
        let adjustments = AdjustmentState {
            contrast: 0.0,
            ..AdjustmentState::default()
        };
        let out = apply(&one_pixel([255, 0, 30, 255]), &adjustments);
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn zero_saturation_leaves_gray_unchanged() {
        let adjustments = AdjustmentState {
            saturation: 0.0,
            ..AdjustmentState::default()
        };
        let out = apply(&one_pixel([90, 90, 90, 255]), &adjustments);
        let [r, g, b, _] = out.get_pixel(0, 0).0;
        assert!(r.abs_diff(90) <= 1 && g.abs_diff(90) <= 1 && b.abs_diff(90) <= 1);
    }

    #[test]
    fn opacity_multiplies_alpha() {
        let adjustments = AdjustmentState {
            opacity: 50.0,
            ..AdjustmentState::default()
        };
        let out = apply(&one_pixel([1, 2, 3, 200]), &adjustments);
        assert_eq!(out.get_pixel(0, 0).0, [1, 2, 3, 100]);
    }

    #[test]
    fn hue_rotation_moves_red_off_red() {
        let adjustments = AdjustmentState {
            hue: 120.0,
            ..AdjustmentState::default()
        };
        let out = apply(&one_pixel([255, 0, 0, 255]), &adjustments);
        let [r, g, _, _] = out.get_pixel(0, 0).0;
        assert!(g > r, "expected green to dominate, got {:?}", out.get_pixel(0, 0));
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let mut image = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        image.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let adjustments = AdjustmentState {
            blur: 1.5,
            ..AdjustmentState::default()
        };
        let out = apply(&image, &adjustments);
        assert!(out.get_pixel(4, 4).0[0] < 255);
        assert!(out.get_pixel(5, 4).0[0] > 0);
    }
}
