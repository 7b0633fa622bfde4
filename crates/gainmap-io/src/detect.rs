//! Format detection by magic bytes and file extension.

use crate::IoResult;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// File formats handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Radiance RGBE.
    Hdr,
    /// PNG.
    Png,
    /// Gain map container.
    GainMap,
    /// Anything else.
    Unknown,
}

impl Format {
    /// Detects format from file path.
    ///
    /// Magic bytes win; the extension is the fallback for short or
    /// unreadable headers.
    pub fn detect<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        match Self::from_magic_bytes(path)? {
            Format::Unknown => Ok(Self::from_extension(path)),
            format => Ok(format),
        }
    }

    /// Detects format from file extension only.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("hdr") | Some("pic") | Some("rgbe") => Format::Hdr,
            Some("png") => Format::Png,
            Some("gmap") => Format::GainMap,
            _ => Format::Unknown,
        }
    }

    /// Detects format from the first bytes of a file.
    pub fn from_magic_bytes<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 8];
        let n = file.read(&mut header)?;
        Ok(Self::from_bytes(&header[..n]))
    }

    /// Detects format from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() >= 8 && bytes[0..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
            return Format::Png;
        }
        if bytes.len() >= 4 && &bytes[0..4] == b"GMAP" {
            return Format::GainMap;
        }
        if bytes.len() >= 2 && &bytes[0..2] == b"#?" {
            return Format::Hdr;
        }
        Format::Unknown
    }

    /// Typical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Hdr => "hdr",
            Format::Png => "png",
            Format::GainMap => "gmap",
            Format::Unknown => "",
        }
    }
}
