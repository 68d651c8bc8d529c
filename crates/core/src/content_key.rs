//! Content store keys derived from fingerprints.

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::media::normalize_extension;
use std::fmt;

/// Location of a payload in the content store: its fingerprint plus an
/// optional file extension.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    fingerprint: Fingerprint,
    extension: Option<String>,
}

impl ContentKey {
    /// Create a key. The extension, when given, must be a short ASCII
    /// alphanumeric string without the leading dot.
    pub fn new(fingerprint: Fingerprint, extension: Option<&str>) -> Result<Self> {
        let extension = match extension {
            None => None,
            Some(ext) => Some(
                normalize_extension(ext)
                    .ok_or_else(|| Error::InvalidContentKey(format!("bad extension: {ext:?}")))?,
            ),
        };
        Ok(Self {
            fingerprint,
            extension,
        })
    }

    /// Parse a stored filename (`<hex>` or `<hex>.<ext>`).
    pub fn parse(stored_filename: &str) -> Result<Self> {
        let (hex, ext) = match stored_filename.split_once('.') {
            Some((hex, ext)) => (hex, Some(ext)),
            None => (stored_filename, None),
        };
        let fingerprint = Fingerprint::from_hex(hex)
            .map_err(|e| Error::InvalidContentKey(format!("{stored_filename}: {e}")))?;
        Self::new(fingerprint, ext)
    }

    /// The fingerprint this key addresses.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// File name recorded in image metadata.
    pub fn file_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{ext}", self.fingerprint.to_hex()),
            None => self.fingerprint.to_hex(),
        }
    }

    /// Relative object path, fanned out by the first byte of the fingerprint.
    pub fn object_path(&self) -> String {
        let hex = self.fingerprint.to_hex();
        format!("{}/{}", &hex[..2], self.file_name())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.object_path())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_path())
    }
}
