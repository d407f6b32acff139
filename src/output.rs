// Picks the connector, mode and CRTC we are going to light up.
// Policy: first connected connector with an encoder, first advertised mode.
// No ranking by resolution or refresh rate.

use crate::device::Card;
use crate::error::Error;
use drm::control::{connector, crtc, encoder, Device as ControlDevice, Mode};
use std::io;
use tracing::{debug, info};

/// Video timing chosen for the output.
#[derive(Debug, Clone, Copy)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub timing: Mode,
}

impl From<Mode> for DisplayMode {
    fn from(timing: Mode) -> Self {
        let (w, h) = timing.size();
        Self { width: w as u32, height: h as u32, refresh: timing.vrefresh(), timing }
    }
}

/// One connector as seen during enumeration.
#[derive(Debug, Clone)]
pub struct Output<M> {
    pub connector: connector::Handle,
    pub connected: bool,
    pub encoder: Option<encoder::Handle>,
    pub modes: Vec<M>,
}

/// Result of negotiation: where to present and with which timing.
#[derive(Debug, Clone)]
pub struct Selection<M> {
    pub output: Output<M>,
    pub mode: M,
    pub crtc: crtc::Handle,
}

/// Anything that can list connectors and resolve encoders to CRTCs.
pub trait OutputSource {
    type Mode: Clone;

    fn connectors(&self) -> io::Result<Vec<connector::Handle>>;
    fn output(&self, handle: connector::Handle) -> io::Result<Output<Self::Mode>>;
    fn crtc_of(&self, encoder: encoder::Handle) -> io::Result<Option<crtc::Handle>>;
}

impl OutputSource for Card {
    type Mode = DisplayMode;

    fn connectors(&self) -> io::Result<Vec<connector::Handle>> {
        Ok(self.resource_handles()?.connectors().to_vec())
    }

    fn output(&self, handle: connector::Handle) -> io::Result<Output<DisplayMode>> {
        // Force a fresh detect. The cached state of a connector nobody has
        // queried yet is Unknown with no modes, which would skip a live monitor.
        let info = self.get_connector(handle, true)?;
        Ok(Output {
            connector: info.handle(),
            connected: info.state() == connector::State::Connected,
            encoder: info.current_encoder(),
            modes: info.modes().iter().copied().map(DisplayMode::from).collect(),
        })
    }

    fn crtc_of(&self, encoder: encoder::Handle) -> io::Result<Option<crtc::Handle>> {
        Ok(self.get_encoder(encoder)?.crtc())
    }
}

/// Walk connectors in enumeration order and take the first usable one.
pub fn select_output<S: OutputSource>(source: &S) -> Result<Selection<S::Mode>, Error> {
    let handles = source
        .connectors()
        .map_err(|e| Error::ResourceQuery("get resources".into(), e))?;

    for handle in handles {
        let output = source
            .output(handle)
            .map_err(|e| Error::ResourceQuery(format!("get connector {handle:?}"), e))?;

        // Rejected connectors are dropped right here, before the next fetch.
        let Some(encoder) = output.encoder.filter(|_| output.connected) else {
            debug!(connector = ?handle, connected = output.connected, "Skipping connector");
            continue;
        };

        // A broken encoder aborts negotiation instead of trying the next connector.
        let crtc = source
            .crtc_of(encoder)
            .map_err(|e| Error::ResourceQuery(format!("get encoder {encoder:?}"), e))?
            .ok_or_else(|| {
                Error::ResourceQuery(
                    format!("encoder {encoder:?}"),
                    io::Error::new(io::ErrorKind::NotFound, "encoder has no CRTC"),
                )
            })?;

        let mode = output.modes.first().cloned().ok_or(Error::NoMode)?;
        info!(connector = ?handle, crtc = ?crtc, modes = output.modes.len(), "Selected output");
        return Ok(Selection { output, mode, crtc });
    }

    Err(Error::NoConnectedOutput)
}
