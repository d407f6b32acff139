// Writes a composed frame to disk as PNG.
// Uses the packed FrameBuffer (pitch = width*4), not the device mapping.

use crate::error::Error;
use crate::types::FrameBuffer;
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::Path;
use tracing::info;

/// Convert XRGB8888 pixels into an RGB image (alpha byte dropped).
pub fn to_rgb_image(frame: &FrameBuffer) -> RgbImage {
    ImageBuffer::from_fn(frame.width as u32, frame.height as u32, |x, y| {
        let px = frame.pixel(x as usize, y as usize);
        Rgb([(px >> 16) as u8, (px >> 8) as u8, px as u8])
    })
}

pub fn save(frame: &FrameBuffer, path: &Path) -> Result<(), Error> {
    to_rgb_image(frame)
        .save(path)
        .map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
    info!(path = %path.display(), "Wrote snapshot");
    Ok(())
}
