// Opens a DRM card node and holds DRM master for as long as the Card lives.
// Dropping the Card releases master and closes the file, on every exit path.

use crate::error::Error;
use drm::control::Device as ControlDevice;
use drm::Device;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Card nodes tried when the config does not name any.
pub fn default_candidates() -> Vec<PathBuf> {
    (0..8).map(|i| PathBuf::from(format!("/dev/dri/card{i}"))).collect()
}

pub struct Card {
    file: File,
    path: PathBuf,
    master: bool,
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl Device for Card {}
impl ControlDevice for Card {}

impl Card {
    /// Open the first candidate that accepts read/write, then take DRM master.
    pub fn open(candidates: &[PathBuf]) -> Result<Self, Error> {
        let (file, path) = candidates
            .iter()
            .find_map(|path| match OpenOptions::new().read(true).write(true).open(path) {
                Ok(file) => Some((file, path.clone())),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Card not usable");
                    None
                }
            })
            .ok_or_else(|| Error::NoDevice(candidates.to_vec()))?;

        // From here on Drop closes the file even if master is refused.
        let mut card = Card { file, path, master: false };
        card.acquire_master_lock().map_err(Error::Permission)?;
        card.master = true;

        info!(path = %card.path.display(), "Opened display device as DRM master");
        Ok(card)
    }
}

impl Drop for Card {
    fn drop(&mut self) {
        if self.master {
            if let Err(e) = self.release_master_lock() {
                warn!(error = %e, "Failed to drop DRM master");
            }
        }
        debug!(path = %self.path.display(), "Closing display device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_candidates_cover_card0_to_card7_in_order() {
        let c = default_candidates();
        assert_eq!(c.len(), 8);
        assert_eq!(c[0], PathBuf::from("/dev/dri/card0"));
        assert_eq!(c[7], PathBuf::from("/dev/dri/card7"));
    }

    #[test]
    fn no_openable_candidate_is_no_device() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![dir.path().join("card0"), dir.path().join("card1")];
        match Card::open(&paths) {
            Err(Error::NoDevice(tried)) => assert_eq!(tried, paths),
            _ => panic!("expected NoDevice"),
        }
    }

    #[test]
    fn regular_file_cannot_become_master() {
        // Opens fine, but the master ioctl is refused on a non-DRM file.
        let file = tempfile::NamedTempFile::new().unwrap();
        let paths = vec![file.path().to_path_buf()];
        assert!(matches!(Card::open(&paths), Err(Error::Permission(_))));
    }
}
