// Core types shared by the loader, the compositor and the cursor thread.

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Bytes per pixel of every surface we draw into (XRGB8888).
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded P6 image: rows of R,G,B bytes, no alpha, no padding.
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>, // length = width * height * 3
}

impl RasterImage {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Axis-aligned rectangle drawn on top of the image.
/// Bounds are inclusive on all four edges; colors are 0xAARRGGBB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Overlay {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub fill: u32,
    pub border: u32,
    pub thickness: u32,
}

impl Overlay {
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    /// Inside the rectangle shrunk by `thickness` on every side.
    /// A thickness over half the span leaves no inner region at all.
    #[inline]
    pub fn inner_contains(&self, x: u32, y: u32) -> bool {
        let t = self.thickness as u64;
        let (x, y) = (x as u64, y as u64);
        x >= self.left as u64 + t
            && x + t <= self.right as u64
            && y >= self.top as u64 + t
            && y + t <= self.bottom as u64
    }

    /// Color of (x,y) if the rectangle covers it.
    #[inline]
    pub fn color_at(&self, x: u32, y: u32) -> Option<u32> {
        if !self.contains(x, y) {
            return None;
        }
        Some(if self.inner_contains(x, y) { self.fill } else { self.border })
    }
}

/// Mutable view over a block of XRGB8888 rows.
/// `pitch` is bytes per row and may be larger than `width * 4`.
pub struct Canvas<'a> {
    bytes: &'a mut [u8],
    width: usize,
    height: usize,
    pitch: usize,
}

impl<'a> Canvas<'a> {
    /// Returns None when the geometry does not fit the slice.
    pub fn new(bytes: &'a mut [u8], width: usize, height: usize, pitch: usize) -> Option<Self> {
        if pitch < width * BYTES_PER_PIXEL || bytes.len() < pitch * height {
            return None;
        }
        Some(Self { bytes, width, height, pitch })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Write one pixel; caller guarantees x < width and y < height.
    #[inline]
    pub fn put(&mut self, x: usize, y: usize, color: u32) {
        let off = y * self.pitch + x * BYTES_PER_PIXEL;
        self.bytes[off..off + BYTES_PER_PIXEL].copy_from_slice(&color.to_le_bytes());
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> u32 {
        let off = y * self.pitch + x * BYTES_PER_PIXEL;
        let mut px = [0u8; BYTES_PER_PIXEL];
        px.copy_from_slice(&self.bytes[off..off + BYTES_PER_PIXEL]);
        u32::from_le_bytes(px)
    }
}

/// Heap-backed frame with tightly packed rows (pitch = width * 4).
/// Used for snapshots and tests; real output goes through the mapped surface.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, bytes: vec![0u8; width * height * BYTES_PER_PIXEL] }
    }

    pub fn pitch(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    pub fn canvas(&mut self) -> Canvas<'_> {
        let pitch = self.pitch();
        Canvas { bytes: &mut self.bytes, width: self.width, height: self.height, pitch }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        let off = y * self.pitch() + x * BYTES_PER_PIXEL;
        u32::from_le_bytes([self.bytes[off], self.bytes[off + 1], self.bytes[off + 2], self.bytes[off + 3]])
    }
}

/// Cursor coordinates shared between the mouse thread and the present loop.
/// The mouse thread is the only writer of x, y and running; the present loop
/// only writes `stop`.
pub struct CursorState {
    x: AtomicU32,
    y: AtomicU32,
    running: AtomicBool,
    stop: AtomicBool,
}

impl CursorState {
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x: AtomicU32::new(x),
            y: AtomicU32::new(y),
            running: AtomicBool::new(true),
            stop: AtomicBool::new(false),
        }
    }

    /// May mix x and y from two different reports; fine for one frame.
    pub fn position(&self) -> (u32, u32) {
        (self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }

    pub fn set_x(&self, x: u32) {
        self.x.store(x, Ordering::Relaxed);
    }

    pub fn set_y(&self, y: u32) {
        self.y.store(y, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
