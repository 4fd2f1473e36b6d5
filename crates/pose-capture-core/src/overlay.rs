use image::{Rgb, RgbImage};

use crate::landmarks::Detection;

const NODE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const NODE_RADIUS: i64 = 1;

/// Copy of `frame` with a small dot on every landmark. Points outside the
/// frame are clipped.
pub fn draw_landmarks(frame: &RgbImage, detection: &Detection) -> RgbImage {
    let mut canvas = frame.clone();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    for lm in detection.iter() {
        if !lm.x.is_finite() || !lm.y.is_finite() {
            continue;
        }
        let cx = (lm.x * width as f32).round() as i64;
        let cy = (lm.y * height as f32).round() as i64;
        for dy in -NODE_RADIUS..=NODE_RADIUS {
            for dx in -NODE_RADIUS..=NODE_RADIUS {
                let (px, py) = (cx + dx, cy + dy);
                if px >= 0 && py >= 0 && px < i64::from(width) && py < i64::from(height) {
                    canvas.put_pixel(px as u32, py as u32, NODE_COLOR);
                }
            }
        }
    }
    canvas
}
