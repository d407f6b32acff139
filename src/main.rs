// What you SEE when this runs (from a text console, not a desktop session):
// • The PPM wallpaper fills the whole screen.
// • Configured rectangles sit on top of it (border + fill).
// • A white dot follows the mouse until the pointer thread hits its report cap.
// Teardown runs in reverse: unmap, drop framebuffer + buffer, drop master, close.

mod config;
mod device;
mod draw;
mod error;
mod mouse;
mod output;
mod ppm;
mod snapshot;
mod surface;
mod types;

use clap::Parser;
use config::AppConfig;
use device::Card;
use error::Error;
use output::DisplayMode;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use surface::{Scanout, Screen, Surface};
use tracing::{debug, error, info, warn};
use types::{CursorState, FrameBuffer, Overlay, RasterImage};

#[derive(Parser, Debug)]
#[command(name = "drm-wallpaper", version, about = "Show a PPM wallpaper on a DRM/KMS output")]
struct Cli {
    /// Binary PPM (P6) with as many pixels as the display mode
    image: PathBuf,
    /// TOML config (falls back to $DRM_WALLPAPER_CONFIG, then the user config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drm_wallpaper=info".into()),
        )
        .init();

    // Usage errors exit with 2, --help / --version with 0.
    let cli = Cli::try_parse().unwrap_or_else(|e| e.exit());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    /* --- Arguments + config --- */
    check_image_path(&cli.image)?;
    let config = config::load(cli.config.as_deref())?;

    /* --- Device session ---
       Visual: nothing yet; we only own the card now. */
    let card = Card::open(&config.device.candidates)?;

    /* --- Output negotiation ---
       Visual: decides which monitor lights up and at what resolution. */
    let selection = output::select_output(&card)?;
    let mode = selection.mode;
    info!(
        width = mode.width,
        height = mode.height,
        refresh = mode.refresh,
        name = ?mode.timing.name(),
        "Using mode"
    );

    /* --- Wallpaper ---
       Checked against the mode before any buffer is allocated. */
    let image = ppm::load(&cli.image)?;
    check_resolution(&image, (mode.width, mode.height))?;

    if let Some(path) = &config.render.snapshot {
        let center = config.input.draw_cursor.then(|| center_of(&mode));
        let mut frame = FrameBuffer::new(mode.width as usize, mode.height as usize);
        draw::composite(&mut frame.canvas(), &image, &config.overlays, center);
        snapshot::save(&frame, path)?;
    }

    /* --- Scanout buffer ---
       Visual: still nothing; the buffer exists but is not bound to the CRTC. */
    let mut surface = Surface::allocate(&card, &mode)?;
    let framebuffer = surface.framebuffer();
    let mut screen = Screen { mapped: surface.map()?, card: &card, selection: &selection, framebuffer };

    /* --- Pointer thread ---
       Visual: the dot starts at the screen center. */
    let (cx, cy) = center_of(&mode);
    let cursor = Arc::new(CursorState::new(cx, cy));
    let sampler = mouse::spawn(
        config.input.path.clone(),
        Arc::clone(&cursor),
        (mode.width, mode.height),
        config.input.max_reports,
    )
    .map_err(|e| Error::Io("spawn mouse thread".into(), e))?;

    /* --- Main loop --- */
    let frames = Frame::new(&image, &config).drive(&mut screen, &cursor, sampler)?;
    info!(frames, "Done");
    Ok(())
}

/// What every present cycle draws, and how often.
struct Frame<'a> {
    image: &'a RasterImage,
    overlays: &'a [Overlay],
    draw_cursor: bool,
    interval: Duration,
}

impl<'a> Frame<'a> {
    fn new(image: &'a RasterImage, config: &'a AppConfig) -> Self {
        Self {
            image,
            overlays: &config.overlays,
            draw_cursor: config.input.draw_cursor,
            interval: Duration::from_millis(config.render.frame_interval_ms),
        }
    }

    /// Run the present loop, then stop and join the pointer thread whatever
    /// the loop returned.
    fn drive<S: Scanout>(
        &self,
        screen: &mut S,
        cursor: &CursorState,
        sampler: JoinHandle<()>,
    ) -> Result<u64, Error> {
        let result = self.present_loop(screen, cursor);

        // Unblocks the pointer thread's loop at its next report.
        cursor.request_stop();
        if sampler.join().is_err() {
            warn!("Mouse thread panicked");
        }
        result
    }

    /// Compose + present until the pointer thread reports it is done.
    /// Always presents at least once. Returns the number of presents.
    fn present_loop<S: Scanout>(&self, screen: &mut S, cursor: &CursorState) -> Result<u64, Error> {
        let mut frames = 0u64;

        loop {
            // 1) Draw: wallpaper, overlays, then the dot on top.
            let dot = self.draw_cursor.then(|| cursor.position());
            draw::composite(&mut screen.canvas()?, self.image, self.overlays, dot);

            // 2) Present: a full mode-set every time.
            screen.present()?;
            frames += 1;
            if frames == 1 {
                info!("First frame presented");
            }

            if !cursor.is_running() {
                debug!(frames, "Pointer thread finished, leaving main loop");
                return Ok(frames);
            }
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
    }
}

/// The image must be a regular file we can open for reading. Checked before
/// the card is touched.
fn check_image_path(path: &Path) -> Result<(), Error> {
    let file = File::open(path).map_err(|e| Error::Argument(format!("{}: {e}", path.display())))?;
    let meta = file
        .metadata()
        .map_err(|e| Error::Argument(format!("{}: {e}", path.display())))?;
    if !meta.is_file() {
        return Err(Error::Argument(format!("{} is not a file", path.display())));
    }
    Ok(())
}

/// Same pixel count as the mode; the image is laid out row-major with the
/// mode's width.
fn check_resolution(image: &RasterImage, mode: (u32, u32)) -> Result<(), Error> {
    if image.pixel_count() != mode.0 as usize * mode.1 as usize {
        return Err(Error::ResolutionMismatch { image: (image.width, image.height), mode });
    }
    Ok(())
}

fn center_of(mode: &DisplayMode) -> (u32, u32) {
    (mode.width / 2, mode.height / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_takes_exactly_one_image() {
        assert!(Cli::try_parse_from(["drm-wallpaper"]).is_err());
        assert!(Cli::try_parse_from(["drm-wallpaper", "a.ppm", "b.ppm"]).is_err());
        let cli = Cli::try_parse_from(["drm-wallpaper", "--config", "c.toml", "a.ppm"]).unwrap();
        assert_eq!(cli.image, PathBuf::from("a.ppm"));
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn usage_errors_keep_clap_exit_codes() {
        assert_eq!(Cli::try_parse_from(["drm-wallpaper"]).unwrap_err().exit_code(), 2);
        assert_eq!(Cli::try_parse_from(["drm-wallpaper", "--help"]).unwrap_err().exit_code(), 0);
    }

    #[test]
    fn missing_image_is_an_argument_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(check_image_path(&dir.path().join("x.ppm")), Err(Error::Argument(_))));
        assert!(matches!(check_image_path(dir.path()), Err(Error::Argument(_))));
    }

    #[test]
    fn unreadable_image_is_an_argument_error() {
        use std::os::unix::fs::PermissionsExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(file.path()).is_ok() {
            // Root reads through mode 000; nothing to check.
            return;
        }
        assert!(matches!(check_image_path(file.path()), Err(Error::Argument(_))));
    }

    #[test]
    fn image_must_match_the_mode_pixel_count() {
        let image = RasterImage { width: 4, height: 2, bytes: vec![0; 24] };
        assert!(check_resolution(&image, (4, 2)).is_ok());
        assert!(check_resolution(&image, (2, 4)).is_ok());
        assert!(matches!(
            check_resolution(&image, (4, 3)),
            Err(Error::ResolutionMismatch { image: (4, 2), mode: (4, 3) })
        ));
    }

    /* --- Present loop --- */

    use crate::draw::CURSOR_COLOR;
    use std::io::{self, Cursor};

    /// Heap frame standing in for the mapped surface; counts presents and can
    /// fail the Nth one.
    struct FakeScreen {
        frame: FrameBuffer,
        presents: u64,
        fail_at: Option<u64>,
    }

    impl FakeScreen {
        fn new(fail_at: Option<u64>) -> Self {
            Self { frame: FrameBuffer::new(4, 4), presents: 0, fail_at }
        }
    }

    impl Scanout for FakeScreen {
        fn canvas(&mut self) -> Result<types::Canvas<'_>, Error> {
            Ok(self.frame.canvas())
        }

        fn present(&mut self) -> Result<(), Error> {
            if self.fail_at == Some(self.presents + 1) {
                return Err(Error::Present(io::Error::other("set_crtc refused")));
            }
            self.presents += 1;
            Ok(())
        }
    }

    fn gray_4x4() -> RasterImage {
        RasterImage { width: 4, height: 4, bytes: vec![0x40; 4 * 4 * 3] }
    }

    fn frame(image: &RasterImage) -> Frame<'_> {
        Frame { image, overlays: &[], draw_cursor: true, interval: Duration::ZERO }
    }

    #[test]
    fn finished_sampler_still_gets_one_present() {
        let image = gray_4x4();
        let cursor = Arc::new(CursorState::new(1, 2));
        let c = Arc::clone(&cursor);
        let sampler = thread::spawn(move || mouse::run(Cursor::new(Vec::new()), &c, (4, 4), 500));
        while cursor.is_running() {
            thread::yield_now();
        }

        let mut screen = FakeScreen::new(None);
        let frames = frame(&image).drive(&mut screen, &cursor, sampler).unwrap();

        assert_eq!(frames, 1);
        assert_eq!(screen.presents, 1);
        assert_eq!(screen.frame.pixel(1, 2), CURSOR_COLOR);
        assert_eq!(screen.frame.pixel(0, 0), 0xFF40_4040);
    }

    #[test]
    fn sampler_reaching_eof_ends_the_loop() {
        let image = gray_4x4();
        let cursor = Arc::new(CursorState::new(1, 1));
        let c = Arc::clone(&cursor);
        // Right by 2, then down by 1.
        let reports: Vec<u8> = vec![0x08, 2, 0, 0x08, 0, 0xFF];
        let sampler = thread::spawn(move || mouse::run(Cursor::new(reports), &c, (4, 4), 500));

        let mut screen = FakeScreen::new(None);
        let frames = frame(&image).drive(&mut screen, &cursor, sampler).unwrap();

        assert!(frames >= 1);
        assert_eq!(screen.presents, frames);
        assert!(!cursor.is_running());
        assert_eq!(cursor.position(), (3, 2));
    }

    #[test]
    fn failed_present_stops_and_joins_the_sampler() {
        let image = gray_4x4();
        let cursor = Arc::new(CursorState::new(0, 0));
        let c = Arc::clone(&cursor);
        // Endless zero-motion reports: only a stop request ends this sampler.
        let sampler = thread::spawn(move || mouse::run(io::repeat(0), &c, (4, 4), u32::MAX));

        let mut screen = FakeScreen::new(Some(3));
        let result = frame(&image).drive(&mut screen, &cursor, sampler);

        assert!(matches!(result, Err(Error::Present(_))));
        assert_eq!(screen.presents, 2);
        assert!(cursor.stop_requested());
        assert!(!cursor.is_running()); // joined, so the sampler has finished
    }
}
