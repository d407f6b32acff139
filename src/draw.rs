// Software compositing into a pixel canvas.
// Visual effects provided here:
// 1) The wallpaper image, pixel for pixel.
// 2) Rectangles with a border and a fill on top of it.
// 3) A single white dot where the mouse is.

use crate::types::{Canvas, Overlay, RasterImage};

pub const OPAQUE: u32 = 0xFF00_0000;
pub const CURSOR_COLOR: u32 = 0xFFFF_FFFF;

/// Compose one full frame into `canvas`.
/// The image must have exactly as many pixels as the canvas; the caller checks
/// that (ResolutionMismatch) before the first frame.
/// Every pixel is written once, then the cursor dot is written on top.
pub fn composite(
    canvas: &mut Canvas<'_>,
    image: &RasterImage,
    overlays: &[Overlay],
    cursor: Option<(u32, u32)>,
) {
    let width = canvas.width();
    let count = (width * canvas.height()).min(image.pixel_count());

    for i in 0..count {
        let (x, y) = (i % width, i / width);
        let color = overlay_color(overlays, x as u32, y as u32)
            .unwrap_or_else(|| image_color(image, i));
        canvas.put(x, y, color);
    }

    if let Some((cx, cy)) = cursor {
        draw_cursor(canvas, cx, cy);
    }
}

/// Base color from the flat RGB buffer, alpha forced opaque.
#[inline]
fn image_color(image: &RasterImage, i: usize) -> u32 {
    let px = &image.bytes[i * 3..i * 3 + 3];
    OPAQUE | (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32
}

/// First overlay (in configured order) covering (x,y) decides the color.
/// Later overlays are never looked at, even if they also cover the pixel.
#[inline]
fn overlay_color(overlays: &[Overlay], x: u32, y: u32) -> Option<u32> {
    overlays.iter().find_map(|o| o.color_at(x, y))
}

/// Put the cursor dot on the canvas if (x,y) is inside bounds.
/// Visual: the exact pixel under the mouse turns white.
#[inline]
fn draw_cursor(canvas: &mut Canvas<'_>, x: u32, y: u32) {
    let (x, y) = (x as usize, y as usize);
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    canvas.put(x, y, CURSOR_COLOR);
}
