//! # APT Repository Index Library
//!
//! A Rust library for rendering the index files of an APT repository:
//! per-architecture Packages files, per-component Sources files, the small
//! per-section Release stanzas and the checksummed top-level Release file.
//!
//! The renderers in this crate are pure text assembly: they take
//! already-extracted package metadata (hashes, sizes, raw control text) and
//! produce the exact bytes that APT clients consume. Where the files end up
//! (local disk, object storage) is the caller's concern.
//!
//! ## Example
//!
//! ```rust
//! use apt_repository::{BinaryPackage, PackagesFile};
//!
//! let mut packages = PackagesFile::new("xenial");
//! packages.push(&BinaryPackage {
//!     name: "foo".to_string(),
//!     filename: "foo_1.0_amd64.deb".to_string(),
//!     md5: "d3b07384d113edec49eaa6238ad5ff00".to_string(),
//!     sha1: "f1d2d2f924e986ac86fdf7b36c94bcdf32beec15".to_string(),
//!     sha256: "b5bb9d8014a0f9b1d61e21e796d78dccdf1352f23cd32812f4850b878ae4944c".to_string(),
//!     size: 1234,
//!     control: "Package: foo\nVersion: 1.0\nArchitecture: amd64\n".to_string(),
//! });
//! assert!(packages.text().starts_with("Filename: pool/xenial/f/foo/"));
//! ```

pub mod compression;
pub mod error;
pub mod hash;
pub mod packages;
pub mod pool;
pub mod release;
pub mod sources;

pub use compression::Compression;
pub use error::{AptRepositoryError, Result};
pub use hash::{ContentDigests, HashAlgorithm};
pub use packages::{BinaryPackage, PackagesFile, ParsedPackage};
pub use pool::{pool_dir, pool_path};
pub use release::{ReleaseFile, SectionRelease};
pub use sources::{SourcePackage, SourcesFile};
