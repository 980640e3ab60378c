//! Compression support for APT repository index files.

use crate::Result;
use std::io::{Read, Write};

/// Compression formats used for published index files. Every Packages and
/// Sources text is published both uncompressed and gzipped, side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
}

impl Compression {
    /// Get the file extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
        }
    }

    /// Content type to use when uploading a file in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Compression::None => "text/plain",
            Compression::Gzip => "binary/octet-stream",
        }
    }

    /// Compress data using this compression format.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut compressed = Vec::new();
                let mut encoder =
                    flate2::write::GzEncoder::new(&mut compressed, flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?;
                Ok(compressed)
            }
        }
    }

    /// Decompress data using this compression format.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut decompressed = Vec::new();
                let mut decoder = flate2::read::GzDecoder::new(data);
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
        }
    }

    /// Get all supported compression formats.
    pub fn all() -> &'static [Compression] {
        &[Compression::None, Compression::Gzip]
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
        }
    }
}
