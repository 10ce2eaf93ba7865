//! HTTP `Range` header parsing (single byte ranges only)

use crate::error::{LibraryError, Result};

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

/// Inclusive byte range within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `size` bytes
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// `None` means the whole file. Accepted forms are `bytes=S-E`, `bytes=S-`
/// and the suffix form `bytes=-N`. An end past EOF is clamped; a start at or
/// past EOF, `S > E`, `N = 0` and multiple ranges are rejected.
pub fn parse_range(header: Option<&str>, size: u64) -> Result<Option<ByteRange>> {
    let header = match header {
        Some(h) => h.trim(),
        None => return Ok(None),
    };
    let invalid = || LibraryError::InvalidRange(header.to_string());

    let caps = regex!(r"^bytes=\s*(\d*)\s*-\s*(\d*)$")
        .captures(header)
        .ok_or_else(invalid)?;
    let start = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let end = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let range = match (start.is_empty(), end.is_empty()) {
        (true, true) => return Err(invalid()),
        (true, false) => {
            let suffix: u64 = end.parse().map_err(|_| invalid())?;
            if suffix == 0 || size == 0 {
                return Err(invalid());
            }
            ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            }
        }
        (false, _) => {
            let start: u64 = start.parse().map_err(|_| invalid())?;
            if start >= size {
                return Err(invalid());
            }
            let end = if end.is_empty() {
                size - 1
            } else {
                let end: u64 = end.parse().map_err(|_| invalid())?;
                if start > end {
                    return Err(invalid());
                }
                end.min(size - 1)
            };
            ByteRange { start, end }
        }
    };
    Ok(Some(range))
}
