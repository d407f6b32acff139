// A tiny error type so we don't rely on anyhow/thiserror.
// Every variant states *where* things went wrong; all of them end the run.
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Argument(String),                       // Bad command line usage or image path
    NoDevice(Vec<PathBuf>),                 // None of the candidate cards could be opened
    Permission(io::Error),                  // DRM master was refused
    ResourceQuery(String, io::Error),       // Enumerating connectors/encoders failed
    NoConnectedOutput,                      // No connector is connected with an encoder
    NoMode,                                 // The chosen connector advertises no modes
    Allocation(io::Error),                  // Creating the dumb buffer failed
    Mapping(String),                        // Mapping the dumb buffer failed
    Registration(io::Error),                // Adding the framebuffer failed
    Format(String),                         // The PPM header is not what we support
    SizeMismatch { expected: usize, actual: usize }, // PPM pixel data length is off
    Io(String, io::Error),                  // Reading a file failed
    ResolutionMismatch { image: (u32, u32), mode: (u32, u32) }, // Image does not fit the mode
    Present(io::Error),                     // The mode-set was rejected
    Config(String),                         // The TOML config is unreadable or invalid
    Snapshot(String),                       // Writing the PNG snapshot failed
}

impl Display for Error {
    // This decides how the error is printed to your console.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Argument(s) => write!(f, "Argument error: {s}"),
            Error::NoDevice(paths) => {
                let first = paths.first().map(|p| p.display().to_string()).unwrap_or_default();
                let last = paths.last().map(|p| p.display().to_string()).unwrap_or_default();
                write!(f, "Could not open a display device ({first} .. {last})")
            }
            Error::Permission(e) => write!(
                f,
                "Could not become DRM master ({e}); run this from a text console, not a graphical session"
            ),
            Error::ResourceQuery(what, e) => write!(f, "Resource query error ({what}): {e}"),
            Error::NoConnectedOutput => write!(f, "Did not find a connected connector"),
            Error::NoMode => write!(f, "Connected connector has no available modes"),
            Error::Allocation(e) => write!(f, "Dumb buffer allocation error: {e}"),
            Error::Mapping(s) => write!(f, "Dumb buffer mapping error: {s}"),
            Error::Registration(e) => write!(f, "Framebuffer registration error: {e}"),
            Error::Format(s) => write!(f, "Bad PPM format: {s}"),
            Error::SizeMismatch { expected, actual } => {
                write!(f, "Bad PPM pixel data: expected {expected} bytes, found {actual}")
            }
            Error::Io(what, e) => write!(f, "I/O error ({what}): {e}"),
            Error::ResolutionMismatch { image, mode } => write!(
                f,
                "Image resolution {}x{} does not match the display mode {}x{}",
                image.0, image.1, mode.0, mode.1
            ),
            Error::Present(e) => write!(f, "Mode-set error: {e}"),
            Error::Config(s) => write!(f, "Config error: {s}"),
            Error::Snapshot(s) => write!(f, "Snapshot error: {s}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Permission(e)
            | Error::ResourceQuery(_, e)
            | Error::Allocation(e)
            | Error::Registration(e)
            | Error::Io(_, e)
            | Error::Present(e) => Some(e),
            _ => None,
        }
    }
}
