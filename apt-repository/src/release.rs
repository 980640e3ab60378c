//! Release file rendering.
//!
//! Two flavors: the small per-section Release stanza placed next to each
//! Packages/Sources file, and the top-level Release for a distribution,
//! which lists the size and digests of every index file below it and is the
//! text that gets a detached signature.

use crate::hash::{ContentDigests, HashAlgorithm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The Release stanza for one (distribution, component, architecture) leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRelease {
    /// Distribution name.
    pub archive: String,
    /// Component name.
    pub component: String,
    /// Repository origin.
    pub origin: String,
    /// Repository label.
    pub label: String,
    /// Architecture name (or `source`).
    pub architecture: String,
}

impl fmt::Display for SectionRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Archive: {}\nComponent: {}\nOrigin: {}\nLabel: {}\nArchitecture: {}\n",
            self.archive, self.component, self.origin, self.label, self.architecture
        )
    }
}

/// One checksummed entry in a top-level Release file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    /// Path relative to `dists/<dist>/`.
    pub path: String,
    /// Digests and size of the file content.
    pub digests: ContentDigests,
}

/// The top-level Release file for one distribution.
///
/// Rendering is deterministic for fixed inputs, including the injected
/// date; signatures and tests both rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFile {
    /// Repository origin.
    pub origin: String,
    /// Repository label.
    pub label: String,
    /// Distribution name.
    pub codename: String,
    /// Timestamp written into the Date field.
    pub date: DateTime<Utc>,
    /// Component names, in listing order.
    pub components: Vec<String>,
    /// Architecture names, in listing order. The caller is expected to
    /// exclude `all` here; `source` is listed.
    pub architectures: Vec<String>,
    /// Checksummed index files, in listing order.
    pub files: Vec<ReleaseEntry>,
}

impl ReleaseFile {
    /// Create a Release file with no components, architectures or files.
    pub fn new<S: Into<String>>(origin: S, label: S, codename: S, date: DateTime<Utc>) -> Self {
        Self {
            origin: origin.into(),
            label: label.into(),
            codename: codename.into(),
            date,
            components: Vec::new(),
            architectures: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Set the component list.
    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.components = components;
        self
    }

    /// Set the architecture list.
    pub fn with_architectures(mut self, architectures: Vec<String>) -> Self {
        self.architectures = architectures;
        self
    }

    /// Register an index file; its digests are computed here.
    pub fn add_file<S: Into<String>>(&mut self, path: S, data: &[u8]) {
        self.files.push(ReleaseEntry {
            path: path.into(),
            digests: ContentDigests::of(data),
        });
    }
}

impl fmt::Display for ReleaseFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin: {}\n", self.origin)?;
        write!(f, "Label: {}\n", self.label)?;
        write!(f, "Codename: {}\n", self.codename)?;
        write!(f, "Acquire-By-Hash: no\n")?;
        write!(f, "Date: {}\n", self.date.format("%a, %d %b %Y %H:%M:%S +0000"))?;
        write!(f, "Components: {}\n", self.components.join(" "))?;
        write!(f, "Architectures: {}\n", self.architectures.join(" "))?;
        for algorithm in HashAlgorithm::all() {
            write!(f, "{}:\n", algorithm.as_str())?;
            for entry in &self.files {
                // note the leading space before the digest
                write!(
                    f,
                    " {} {} {}\n",
                    entry.digests.get(*algorithm),
                    entry.digests.size,
                    entry.path
                )?;
            }
        }
        write!(f, "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_section_release() {
        let section = SectionRelease {
            archive: "d1".to_string(),
            component: "c1".to_string(),
            origin: "test".to_string(),
            label: "test".to_string(),
            architecture: "a1".to_string(),
        };
        assert_eq!(
            section.to_string(),
            "Archive: d1\nComponent: c1\nOrigin: test\nLabel: test\nArchitecture: a1\n"
        );
    }

    #[test]
    fn test_release_rendering() {
        let date = Utc.timestamp_opt(1497895073, 0).unwrap();
        let mut release = ReleaseFile::new("test", "test", "d1", date)
            .with_components(vec!["c1".to_string()])
            .with_architectures(vec!["a1".to_string()]);
        release.add_file("c1/source/Sources", b"bar");
        release.add_file("c1/source/Sources.gz", b"0xBEEFCAFE");
        release.add_file("c1/binary-a1/Packages", b"foo");
        release.add_file("c1/binary-a1/Packages.gz", b"0xDEADBEEF");

        let expected = "Origin: test\n\
Label: test\n\
Codename: d1\n\
Acquire-By-Hash: no\n\
Date: Mon, 19 Jun 2017 17:57:53 +0000\n\
Components: c1\n\
Architectures: a1\n\
MD5Sum:\n \
37b51d194a7513e45b56f6524f2d51f2 3 c1/source/Sources\n \
a4d4f03fbcc4a36782648488dd07319f 10 c1/source/Sources.gz\n \
acbd18db4cc2f85cedef654fccc4a4d8 3 c1/binary-a1/Packages\n \
545882e2eba6b126518d07c954698c83 10 c1/binary-a1/Packages.gz\n\
SHA1:\n \
62cdb7020ff920e5aa642c3d4066950dd1f01f4d 3 c1/source/Sources\n \
cef0d0350de7697c4abe1e6b7db788d46dc748b1 10 c1/source/Sources.gz\n \
0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33 3 c1/binary-a1/Packages\n \
fbc02cbc52f9aa96fefa06c567b180df6df832db 10 c1/binary-a1/Packages.gz\n\
SHA256:\n \
fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9 3 c1/source/Sources\n \
09a597d7489048ac580a36b0381b35d9140738f8e3b8dfc19a5edfd41f09cc2b 10 c1/source/Sources.gz\n \
2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae 3 c1/binary-a1/Packages\n \
5fce5f5878415a3bae17db60a69b08d51f0f962228bfdbb462993a3ac16171e4 10 c1/binary-a1/Packages.gz\n\
\n";
        assert_eq!(release.to_string(), expected);
    }

    #[test]
    fn test_rendering_is_reproducible() {
        let date = Utc.timestamp_opt(1497895073, 0).unwrap();
        let mut a = ReleaseFile::new("o", "l", "d", date);
        a.add_file("c/binary-amd64/Packages", b"foo");
        let b = a.clone();
        assert_eq!(a.to_string(), b.to_string());
    }
}
