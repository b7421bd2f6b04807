use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;

use super::{blend_pixel, FontBook};
use crate::editor::tools::{
    Color, CropBox, CropSession, Point, TextOverlay, TextShadow, TextStyle,
};

const CROP_DIM_ALPHA: f32 = 0.35;
const CROP_BORDER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CROP_GRID_LINE: Rgba<u8> = Rgba([230, 230, 230, 255]);
const CROP_HANDLE_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CROP_LABEL_SIZE: f32 = 14.0;
const CROP_LABEL_GAP: f64 = 6.0;

/// Live size readout, e.g. `600 × 600`.
pub fn dimension_label(crop: CropBox) -> String {
    format!("{} × {}", crop.width.round(), crop.height.round())
}

/// Draws the crop overlay: dimmed exterior, border, grid, handles and size label.
///
/// `scale` maps canvas-buffer coordinates to `canvas` pixels.
pub fn draw_crop_chrome(canvas: &mut RgbaImage, crop: &CropSession, scale: f64, fonts: &FontBook) {
    let crop_box = crop.crop_box();
    let scaled = CropBox::new(
        crop_box.x * scale,
        crop_box.y * scale,
        crop_box.width * scale,
        crop_box.height * scale,
    );

    dim_exterior(canvas, scaled);

    let (left, top) = (scaled.x.round() as i32, scaled.y.round() as i32);
    let (width, height) = (
        scaled.width.round().max(1.0) as u32,
        scaled.height.round().max(1.0) as u32,
    );
    draw_hollow_rect_mut(
        canvas,
        PixelRect::at(left, top).of_size(width, height),
        CROP_BORDER,
    );

    for (start, end) in crop.grid().lines(scaled.rect()) {
        draw_line_segment_mut(
            canvas,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            CROP_GRID_LINE,
        );
    }

    let handle = (crop.handle_size() * scale).round().max(2.0);
    for (_, corner) in scaled.corners() {
        let x = (corner.x - handle / 2.0).round() as i32;
        let y = (corner.y - handle / 2.0).round() as i32;
        draw_filled_rect_mut(
            canvas,
            PixelRect::at(x, y).of_size(handle as u32, handle as u32),
            CROP_HANDLE_FILL,
        );
    }

    let label_top = if scaled.y >= f64::from(CROP_LABEL_SIZE) * 1.2 + CROP_LABEL_GAP {
        scaled.y - f64::from(CROP_LABEL_SIZE) * 1.2 - CROP_LABEL_GAP
    } else {
        scaled.y + CROP_LABEL_GAP
    };
    let label = TextOverlay::new(
        0,
        Point::new(scaled.x + CROP_LABEL_GAP, label_top),
        dimension_label(crop_box),
        TextStyle {
            size: CROP_LABEL_SIZE,
            color: Color::WHITE,
            shadow: Some(TextShadow {
                color: Color::rgba(0, 0, 0, 200),
                offset_x: 1.0,
                offset_y: 1.0,
                blur: 1.0,
            }),
            ..TextStyle::default()
        },
    );
    fonts.draw_overlay(canvas, &label);
}

fn dim_exterior(canvas: &mut RgbaImage, crop: CropBox) {
    let (left, top) = (crop.x, crop.y);
    let (right, bottom) = (crop.x + crop.width, crop.y + crop.height);
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let (cx, cy) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
        let inside = cx >= left && cx < right && cy >= top && cy < bottom;
        if !inside {
            blend_pixel(pixel, Color::BLACK, CROP_DIM_ALPHA);
        }
    }
}
