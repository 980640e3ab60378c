//! Packages file rendering and parsing.
//!
//! A catalog entry carries the hashes and size extracted at ingest time plus
//! the raw control paragraph of the .deb; a Packages stanza is the pool
//! location and file information followed by that control text verbatim.

use crate::error::{AptRepositoryError, Result};
use crate::pool::pool_path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary package entry to be rendered into a Packages file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPackage {
    /// Package name.
    pub name: String,
    /// Artifact file name (basename, no pool prefix).
    pub filename: String,
    /// MD5 digest of the artifact, hex-encoded.
    pub md5: String,
    /// SHA-1 digest of the artifact, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest of the artifact, hex-encoded.
    pub sha256: String,
    /// Artifact size in bytes.
    pub size: u64,
    /// Raw control paragraph of the package.
    pub control: String,
}

impl BinaryPackage {
    /// Render the stanza for this package within the given distribution.
    ///
    /// The control text goes last; it may carry trailing newlines of its own
    /// and the closing newline keeps stanzas separated by a blank line.
    pub fn to_stanza(&self, dist: &str) -> String {
        let mut stanza = String::new();
        stanza.push_str(&format!(
            "Filename: {}\n",
            pool_path(dist, &self.name, &self.filename)
        ));
        stanza.push_str(&format!("MD5sum: {}\n", self.md5));
        stanza.push_str(&format!("SHA1: {}\n", self.sha1));
        stanza.push_str(&format!("SHA256: {}\n", self.sha256));
        stanza.push_str(&format!("Size: {}\n", self.size));
        stanza.push_str(&self.control);
        stanza.push('\n');
        stanza
    }
}

/// One Packages file for a single distribution, accumulated stanza by
/// stanza in caller-chosen order.
#[derive(Debug, Clone)]
pub struct PackagesFile {
    dist: String,
    text: String,
    count: usize,
}

impl PackagesFile {
    /// Create an empty Packages file for a distribution.
    pub fn new<S: Into<String>>(dist: S) -> Self {
        Self {
            dist: dist.into(),
            text: String::new(),
            count: 0,
        }
    }

    /// Append one package stanza.
    pub fn push(&mut self, package: &BinaryPackage) {
        self.text.push_str(&package.to_stanza(&self.dist));
        self.count += 1;
    }

    /// The rendered file content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the file, returning the rendered content.
    pub fn into_text(self) -> String {
        self.text
    }

    /// Number of stanzas in the file.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the file has no stanzas.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Parse a rendered Packages file back into its stanzas.
    pub fn parse(text: &str) -> Result<Vec<ParsedPackage>> {
        let mut offsets = Vec::new();
        let mut pos = 0;
        for line in text.split_inclusive('\n') {
            if line.starts_with("Filename: ") {
                offsets.push(pos);
            }
            pos += line.len();
        }

        let mut stanzas = Vec::new();
        for (idx, &start) in offsets.iter().enumerate() {
            let end = offsets.get(idx + 1).copied().unwrap_or(text.len());
            stanzas.push(ParsedPackage::parse(&text[start..end])?);
        }
        Ok(stanzas)
    }
}

impl fmt::Display for PackagesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A stanza read back from a Packages file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPackage {
    /// Pool path of the artifact (`pool/<dist>/<c>/<name>/<file>`).
    pub filename: String,
    /// MD5 digest, hex-encoded.
    pub md5: String,
    /// SHA-1 digest, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest, hex-encoded.
    pub sha256: String,
    /// Artifact size in bytes.
    pub size: u64,
    /// The control paragraph, exactly as it was rendered.
    pub control: String,
}

impl ParsedPackage {
    fn parse(stanza: &str) -> Result<Self> {
        let (filename, rest) = take_field(stanza, "Filename")?;
        let (md5, rest) = take_field(rest, "MD5sum")?;
        let (sha1, rest) = take_field(rest, "SHA1")?;
        let (sha256, rest) = take_field(rest, "SHA256")?;
        let (size_str, rest) = take_field(rest, "Size")?;
        let size = size_str
            .parse::<u64>()
            .map_err(|_| AptRepositoryError::invalid_field("Size", &size_str))?;
        let control = rest
            .strip_suffix('\n')
            .unwrap_or(rest)
            .to_string();
        Ok(Self {
            filename,
            md5,
            sha1,
            sha256,
            size,
            control,
        })
    }

    /// Look up a field in the control paragraph, e.g. `Package` or
    /// `Version`.
    pub fn control_field(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}: ", name);
        self.control
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
    }
}

/// Split one `Name: value` header line off the front of a stanza.
fn take_field<'a>(text: &'a str, name: &str) -> Result<(String, &'a str)> {
    let (line, rest) = text
        .split_once('\n')
        .ok_or_else(|| AptRepositoryError::invalid_stanza(format!("truncated stanza at {}", name)))?;
    let value = line
        .strip_prefix(&format!("{}: ", name))
        .ok_or_else(|| AptRepositoryError::missing_field(name))?;
    Ok((value.to_string(), rest))
}
