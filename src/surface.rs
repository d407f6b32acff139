// Dumb buffer + framebuffer that the CRTC scans out.
// Visual expectation: whatever is written into the mapping shows up on the
// monitor after the next `present`.

use crate::device::Card;
use crate::error::Error;
use crate::output::{DisplayMode, Selection};
use crate::types::{Canvas, BYTES_PER_PIXEL};
use drm::buffer::{Buffer, DrmFourcc};
use drm::control::dumbbuffer::{DumbBuffer, DumbMapping};
use drm::control::{framebuffer, Device as ControlDevice};
use std::io;
use tracing::{debug, info, warn};

const DEPTH: u32 = 24; // alpha byte is ignored by scanout
const BPP: u32 = 32;

/// Owns the device buffer and its framebuffer id.
/// Dropping it removes the framebuffer and frees the buffer.
pub struct Surface<'c> {
    card: &'c Card,
    buffer: Option<DumbBuffer>,
    framebuffer: framebuffer::Handle,
    width: u32,
    height: u32,
    pitch: u32,
}

impl<'c> Surface<'c> {
    /// Create a 32 bpp dumb buffer for `mode` and register it as a framebuffer.
    pub fn allocate(card: &'c Card, mode: &DisplayMode) -> Result<Self, Error> {
        // 1) Ask the kernel for a CPU-visible buffer; it picks the pitch.
        let buffer = card
            .create_dumb_buffer((mode.width, mode.height), DrmFourcc::Xrgb8888, BPP)
            .map_err(Error::Allocation)?;
        let pitch = buffer.pitch();

        if !pitch_fits(pitch, mode.width) {
            discard(card, buffer);
            return Err(Error::Allocation(io::Error::other(format!(
                "pitch {pitch} is smaller than a {}-pixel row",
                mode.width
            ))));
        }

        // 2) Register it so a CRTC can scan it out.
        let framebuffer = match card.add_framebuffer(&buffer, DEPTH, BPP) {
            Ok(fb) => fb,
            Err(e) => {
                discard(card, buffer);
                return Err(Error::Registration(e));
            }
        };

        info!(width = mode.width, height = mode.height, pitch, "Allocated scanout buffer");
        Ok(Self {
            card,
            buffer: Some(buffer),
            framebuffer,
            width: mode.width,
            height: mode.height,
            pitch,
        })
    }

    pub fn framebuffer(&self) -> framebuffer::Handle {
        self.framebuffer
    }

    /// Bytes covered by the visible rows.
    pub fn size(&self) -> usize {
        self.pitch as usize * self.height as usize
    }

    /// Map the buffer read/write into our address space.
    /// The mapping cannot outlive the surface; dropping it unmaps.
    pub fn map(&mut self) -> Result<MappedSurface<'_>, Error> {
        let (width, height, pitch, size) = (self.width, self.height, self.pitch, self.size());
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::Mapping("buffer already released".into()))?;
        let mapping = self
            .card
            .map_dumb_buffer(buffer)
            .map_err(|e| Error::Mapping(format!("map dumb buffer: {e}")))?;

        let bytes: &[u8] = mapping.as_ref();
        let len = bytes.len();
        if len < size {
            return Err(Error::Mapping(format!("mapping is {len} bytes, need {size}")));
        }
        debug!(len, "Mapped scanout buffer");
        Ok(MappedSurface { mapping, width, height, pitch })
    }
}

impl Drop for Surface<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.card.destroy_framebuffer(self.framebuffer) {
            warn!(error = %e, "Failed to remove framebuffer");
        }
        if let Some(buffer) = self.buffer.take() {
            discard(self.card, buffer);
        }
    }
}

/// CPU view of a mapped surface.
pub struct MappedSurface<'a> {
    mapping: DumbMapping<'a>,
    width: u32,
    height: u32,
    pitch: u32,
}

impl MappedSurface<'_> {
    /// Pitch-addressed canvas over the visible rows.
    pub fn canvas(&mut self) -> Result<Canvas<'_>, Error> {
        let (w, h, pitch) = (self.width as usize, self.height as usize, self.pitch as usize);
        let bytes: &mut [u8] = self.mapping.as_mut();
        Canvas::new(bytes, w, h, pitch)
            .ok_or_else(|| Error::Mapping(format!("{w}x{h} rows do not fit pitch {pitch}")))
    }
}

/// A target the present loop draws into and then puts on screen.
pub trait Scanout {
    fn canvas(&mut self) -> Result<Canvas<'_>, Error>;
    fn present(&mut self) -> Result<(), Error>;
}

/// The mapped surface bound to the negotiated connector and CRTC.
pub struct Screen<'s, 'c> {
    pub mapped: MappedSurface<'s>,
    pub card: &'c Card,
    pub selection: &'c Selection<DisplayMode>,
    pub framebuffer: framebuffer::Handle,
}

impl Scanout for Screen<'_, '_> {
    fn canvas(&mut self) -> Result<Canvas<'_>, Error> {
        self.mapped.canvas()
    }

    fn present(&mut self) -> Result<(), Error> {
        present(self.card, self.selection, self.framebuffer)
    }
}

/// Full mode-set: bind CRTC, connector, mode and framebuffer.
/// Every visible update goes through here; there is no page flip.
pub fn present(
    card: &Card,
    selection: &Selection<DisplayMode>,
    framebuffer: framebuffer::Handle,
) -> Result<(), Error> {
    card.set_crtc(
        selection.crtc,
        Some(framebuffer),
        (0, 0),
        &[selection.output.connector],
        Some(selection.mode.timing),
    )
    .map_err(Error::Present)
}

fn pitch_fits(pitch: u32, width: u32) -> bool {
    pitch as usize >= width as usize * BYTES_PER_PIXEL
}

fn discard(card: &Card, buffer: DumbBuffer) {
    if let Err(e) = card.destroy_dumb_buffer(buffer) {
        warn!(error = %e, "Failed to destroy dumb buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_must_hold_a_full_row() {
        assert!(pitch_fits(7680, 1920));
        assert!(pitch_fits(8192, 1920)); // padded rows are fine
        assert!(!pitch_fits(7676, 1920));
    }
}
