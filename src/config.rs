// TOML configuration: device candidates, pointer source, overlays.
// Missing file means defaults; a present but broken file is an error.

use crate::device::default_candidates;
use crate::error::Error;
use crate::types::Overlay;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_ENV: &str = "DRM_WALLPAPER_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub input: InputConfig,
    pub render: RenderConfig,
    /// Rectangles drawn over the wallpaper, first match wins.
    pub overlays: Vec<Overlay>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            input: InputConfig::default(),
            render: RenderConfig::default(),
            overlays: default_overlays(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Card nodes tried in order; the first that opens is used.
    pub candidates: Vec<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { candidates: default_candidates() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Draw the cursor dot. The pointer is sampled either way, it times the run.
    pub draw_cursor: bool,
    pub path: PathBuf,
    /// The run ends after this many motion reports.
    pub max_reports: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            draw_cursor: true,
            path: PathBuf::from("/dev/input/mice"),
            max_reports: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pause between two mode-sets.
    pub frame_interval_ms: u64,
    /// Also write the first composed frame here as PNG.
    pub snapshot: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { frame_interval_ms: 16, snapshot: None }
    }
}

/// Two overlapping panels, so border, fill and precedence are all visible.
fn default_overlays() -> Vec<Overlay> {
    vec![
        Overlay { left: 100, top: 100, right: 499, bottom: 399, fill: 0xFF20_2830, border: 0xFFE0_E0E0, thickness: 4 },
        Overlay { left: 300, top: 250, right: 799, bottom: 599, fill: 0xFF30_2020, border: 0xFFFF_CC33, thickness: 8 },
    ]
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let config: AppConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.device.candidates.is_empty() {
            return Err(Error::Config("device.candidates is empty".into()));
        }
        for (i, o) in self.overlays.iter().enumerate() {
            if o.left > o.right || o.top > o.bottom {
                return Err(Error::Config(format!(
                    "overlay {i}: ({}, {})-({}, {}) is inverted",
                    o.left, o.top, o.right, o.bottom
                )));
            }
        }
        Ok(())
    }
}

/// Default config location: <config dir>/drm-wallpaper/config.toml
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("drm-wallpaper").join("config.toml"))
}

/// Load config from `explicit`, then $DRM_WALLPAPER_CONFIG, then the default
/// location. Only the default location may be absent.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, Error> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let path = match named {
        Some(path) => path,
        None => match default_path() {
            Some(path) if path.exists() => path,
            _ => {
                info!("No config found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    let config = AppConfig::parse(&text)?;
    info!(path = %path.display(), overlays = config.overlays.len(), "Loaded config");
    Ok(config)
}
