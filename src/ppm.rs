// Loader for binary PPM (P6) wallpapers.
// Visual expectation: the bytes returned here are exactly what ends up on
// screen, row by row, R,G,B per pixel.

use crate::error::Error;
use crate::types::RasterImage;
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 2] = b"P6";
const MAX_VALUE: u32 = 255; // only 8 bits per channel are supported

/// Read and parse a P6 file from disk.
pub fn load(path: &Path) -> Result<RasterImage, Error> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Io(format!("read {}", path.display()), e))?;
    let image = parse(&bytes)?;
    debug!(path = %path.display(), width = image.width, height = image.height, "Loaded PPM");
    Ok(image)
}

/// Parse a P6 image held in memory.
pub fn parse(data: &[u8]) -> Result<RasterImage, Error> {
    // 1) Magic tag.
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(Error::Format("bad magic, expected P6".into()));
    }
    let mut header = Header { data, pos: MAGIC.len() };

    // 2) Dimensions; zero on either axis is rejected.
    let width = header.number("width")?;
    let height = header.number("height")?;
    if width == 0 || height == 0 {
        return Err(Error::Format(format!("bad dimensions {width}x{height}")));
    }

    // 3) Max channel value.
    let max = header.number("max value")?;
    if max != MAX_VALUE {
        return Err(Error::Format(format!("unsupported max value {max}")));
    }

    // 4) A single whitespace byte separates the header from the raster.
    match data.get(header.pos) {
        Some(b) if b.is_ascii_whitespace() => header.pos += 1,
        _ => return Err(Error::Format("missing whitespace after header".into())),
    }

    // 5) The raster must be exactly width*height*3 bytes, no more, no less.
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| Error::Format(format!("dimensions {width}x{height} overflow")))?;
    let actual = data.len() - header.pos;
    if actual != expected {
        return Err(Error::SizeMismatch { expected, actual });
    }

    Ok(RasterImage { width, height, bytes: data[header.pos..].to_vec() })
}

// Cursor over the ASCII part of the header.
struct Header<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Header<'_> {
    /// Skip at least one whitespace (and any `#` comment lines), then read a decimal.
    fn number(&mut self, what: &str) -> Result<u32, Error> {
        let start = self.pos;
        self.skip_blank();
        if self.pos == start {
            return Err(Error::Format(format!("expected whitespace before {what}")));
        }

        let digits_start = self.pos;
        while self.data.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        let digits = &self.data[digits_start..self.pos];
        if digits.is_empty() {
            return Err(Error::Format(format!("expected a number for {what}")));
        }

        // Digits are ASCII, so from_utf8 cannot fail; parse can overflow.
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| Error::Format(format!("{what} out of range")))
    }

    fn skip_blank(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b'#' {
                while self.data.get(self.pos).is_some_and(|&c| c != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ppm(header: &str, pixels: &[u8]) -> Vec<u8> {
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(pixels);
        out
    }

    #[test]
    fn parses_a_small_image() {
        let data = ppm("P6\n2 1\n255\n", &[1, 2, 3, 4, 5, 6]);
        let img = parse(&data).unwrap();
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(img.bytes.len(), 3 * img.pixel_count());
    }

    #[test]
    fn skips_header_comments() {
        let data = ppm("P6\n# made by hand\n1 1\n255\n", &[9, 9, 9]);
        let img = parse(&data).unwrap();
        assert_eq!((img.width, img.height), (1, 1));
    }

    #[test]
    fn rejects_other_magic() {
        let data = ppm("P3\n1 1\n255\n", &[0, 0, 0]);
        assert!(matches!(parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let data = ppm("P6\n0 4\n255\n", &[]);
        assert!(matches!(parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_unparsable_dimensions() {
        let data = ppm("P6\nabc 4\n255\n", &[]);
        assert!(matches!(parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_sixteen_bit_images() {
        let data = ppm("P6\n1 1\n65535\n", &[0; 6]);
        assert!(matches!(parse(&data), Err(Error::Format(_))));
    }

    #[test]
    fn truncated_raster_is_a_size_mismatch() {
        let data = ppm("P6\n2 2\n255\n", &[0; 11]);
        match parse(&data) {
            Err(Error::SizeMismatch { expected, actual }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            _ => panic!("expected SizeMismatch"),
        }
    }

    #[test]
    fn trailing_bytes_are_a_size_mismatch() {
        let data = ppm("P6\n2 2\n255\n", &[0; 13]);
        assert!(matches!(parse(&data), Err(Error::SizeMismatch { expected: 12, actual: 13 })));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&ppm("P6 2 2 255\n", &[0; 12])).unwrap();
        let img = load(file.path()).unwrap();
        assert_eq!((img.width, img.height, img.bytes.len()), (2, 2, 12));
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ppm");
        assert!(matches!(load(&missing), Err(Error::Io(_, _))));
    }
}
