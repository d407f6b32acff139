// Relative pointer sampling on its own thread.
// Visual expectation: moving the mouse moves the white dot; moving it past a
// screen edge leaves the dot where it was on that axis.

use crate::types::CursorState;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// PS/2-style report from /dev/input/mice: buttons, dx, dy.
pub const REPORT_LEN: usize = 3;

/// Tracks the thread-local cursor position and applies motion reports.
pub struct PointerTracker {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

impl PointerTracker {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x: x as i64, y: y as i64, width, height }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x as u32, self.y as u32)
    }

    /// Apply one report. Returns the axes that moved.
    /// The device reports "up" as positive dy, screen y grows downward.
    /// An axis whose candidate leaves the screen is dropped, not clamped.
    pub fn apply(&mut self, report: [u8; REPORT_LEN]) -> (Option<u32>, Option<u32>) {
        let dx = report[1] as i8 as i64;
        let dy = report[2] as i8 as i64;

        let new_x = self.x + dx;
        let moved_x = (0..self.width as i64).contains(&new_x).then(|| {
            self.x = new_x;
            new_x as u32
        });

        let new_y = self.y - dy;
        let moved_y = (0..self.height as i64).contains(&new_y).then(|| {
            self.y = new_y;
            new_y as u32
        });

        (moved_x, moved_y)
    }
}

/// Read up to `max_reports` reports from `source` into `cursor`.
/// Stops early on a failed/short read or when the present loop asks to stop.
/// Always clears `running` on the way out.
pub fn run<R: Read>(mut source: R, cursor: &CursorState, bounds: (u32, u32), max_reports: u32) {
    let (x, y) = cursor.position();
    let mut tracker = PointerTracker::new(x, y, bounds.0, bounds.1);
    let mut report = [0u8; REPORT_LEN];
    let mut seen = 0u32;

    while seen < max_reports && !cursor.stop_requested() {
        if let Err(e) = source.read_exact(&mut report) {
            error!(error = %e, "Read from pointer device failed");
            break;
        }
        seen += 1;

        let (moved_x, moved_y) = tracker.apply(report);
        if let Some(x) = moved_x {
            cursor.set_x(x);
        }
        if let Some(y) = moved_y {
            cursor.set_y(y);
        }
    }

    debug!(reports = seen, position = ?tracker.position(), "Pointer sampling finished");
    cursor.finish();
}

/// Start the sampling thread on the device at `path`.
/// If the device cannot be opened the thread logs it and stops the run.
pub fn spawn(
    path: PathBuf,
    cursor: Arc<CursorState>,
    bounds: (u32, u32),
    max_reports: u32,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("mouse".into()).spawn(move || {
        match File::open(&path) {
            Ok(file) => {
                info!(path = %path.display(), max_reports, "Sampling pointer");
                run(file, &cursor, bounds, max_reports);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Could not open pointer device");
                cursor.finish();
            }
        }
    })
}
