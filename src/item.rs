//! The catalog item: one package build placed in one (distribution,
//! component) location, plus its storage-key derivation and the mapping to
//! and from the attribute store's multi-valued maps.

use crate::error::{Error, Result};
use crate::store::AttrMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Attribute values in the backing store are capped well below the size of
/// a Debian control paragraph, and control text can contain multi-byte
/// characters. Fragments are therefore capped by character count so that
/// even a fragment of four-byte characters stays within a 1024-byte value.
pub const CONTROL_FRAGMENT_CHARS: usize = 256;

const CONTROL_FRAGMENT_PREFIX: &str = "controltxt";

/// The architecture name used for source bundles.
pub const SOURCE_ARCH: &str = "source";

/// The architecture name used for architecture-independent binaries.
pub const ALL_ARCH: &str = "all";

/// Payload of a catalog item: what kind of artifact it indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// A binary package: one .deb file with its digests.
    Binary {
        /// Artifact file name (basename).
        filename: String,
        /// MD5 digest, hex-encoded.
        md5: String,
        /// SHA-1 digest, hex-encoded.
        sha1: String,
        /// SHA-256 digest, hex-encoded.
        sha256: String,
        /// Artifact size in bytes.
        size: u64,
    },
    /// A source bundle: the ordered list of files named by the .dsc.
    Source {
        /// File names belonging to the bundle.
        files: Vec<String>,
    },
}

/// One package artifact placed in one repository location.
///
/// The five identity fields are immutable once created; copy produces a new
/// item with a different placement, never an in-place mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Package name.
    pub name: String,
    /// Debian version string.
    pub version: String,
    /// Distribution the item is placed in.
    pub distribution: String,
    /// Component the item is placed in.
    pub component: String,
    /// Architecture, `all`, or `source`.
    pub architecture: String,
    /// What the item indexes.
    pub payload: Payload,
    /// Raw control paragraph, fragmented at the store boundary.
    pub control: String,
}

impl CatalogItem {
    /// The storage key of this item: a pure function of the five identity
    /// fields.
    pub fn key(&self) -> String {
        derive_key(
            &self.name,
            &self.version,
            &self.distribution,
            &self.component,
            &self.architecture,
        )
    }

    /// Every artifact file belonging to this item: the single .deb for a
    /// binary, or each file of a source bundle.
    pub fn artifact_files(&self) -> Vec<&str> {
        match &self.payload {
            Payload::Binary { filename, .. } => vec![filename.as_str()],
            Payload::Source { files } => files.iter().map(String::as_str).collect(),
        }
    }

    /// A copy of this item placed at a different (distribution, component).
    /// All other fields, including the version, are carried over.
    pub fn with_placement(&self, distribution: &str, component: &str) -> Self {
        let mut item = self.clone();
        item.distribution = distribution.to_string();
        item.component = component.to_string();
        item
    }

    /// Render this item as a multi-valued attribute map, with the control
    /// text split into `controltxtNN` fragments.
    pub fn to_attributes(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("name".to_string(), vec![self.name.clone()]);
        attrs.insert("version".to_string(), vec![self.version.clone()]);
        attrs.insert("distribution".to_string(), vec![self.distribution.clone()]);
        attrs.insert("component".to_string(), vec![self.component.clone()]);
        attrs.insert("architecture".to_string(), vec![self.architecture.clone()]);
        match &self.payload {
            Payload::Binary {
                filename,
                md5,
                sha1,
                sha256,
                size,
            } => {
                attrs.insert("filename".to_string(), vec![filename.clone()]);
                attrs.insert("md5".to_string(), vec![md5.clone()]);
                attrs.insert("sha1".to_string(), vec![sha1.clone()]);
                attrs.insert("sha256".to_string(), vec![sha256.clone()]);
                attrs.insert("size".to_string(), vec![size.to_string()]);
            }
            Payload::Source { files } => {
                if !files.is_empty() {
                    attrs.insert("files".to_string(), files.clone());
                }
            }
        }
        for (key, frag) in split_control_text(&self.control, CONTROL_FRAGMENT_CHARS) {
            attrs.insert(key, vec![frag]);
        }
        attrs
    }

    /// Reconstruct an item from a stored attribute map.
    pub fn from_attributes(attrs: &AttrMap) -> Result<Self> {
        let architecture = single(attrs, "architecture")?.to_string();
        let payload = if architecture == SOURCE_ARCH {
            Payload::Source {
                files: attrs.get("files").cloned().unwrap_or_default(),
            }
        } else {
            let size_str = single(attrs, "size")?;
            Payload::Binary {
                filename: single(attrs, "filename")?.to_string(),
                md5: single(attrs, "md5")?.to_string(),
                sha1: single(attrs, "sha1")?.to_string(),
                sha256: single(attrs, "sha256")?.to_string(),
                size: size_str.parse::<u64>().map_err(|_| {
                    Error::invalid_attributes(format!("size is not an integer: {}", size_str))
                })?,
            }
        };
        Ok(Self {
            name: single(attrs, "name")?.to_string(),
            version: single(attrs, "version")?.to_string(),
            distribution: single(attrs, "distribution")?.to_string(),
            component: single(attrs, "component")?.to_string(),
            architecture,
            payload,
            control: join_control_fragments(attrs),
        })
    }
}

/// Derive the storage key for an item identity: a hex SHA-256 of the five
/// fields concatenated with no separators. Content-addressed by identity,
/// not by payload.
pub fn derive_key(name: &str, version: &str, dist: &str, comp: &str, arch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(version.as_bytes());
    hasher.update(dist.as_bytes());
    hasher.update(comp.as_bytes());
    hasher.update(arch.as_bytes());
    hex::encode(hasher.finalize())
}

/// Split control text into attribute fragments of at most `max_chars`
/// characters, keyed `controltxt00`, `controltxt01`, … with the index
/// zero-padded to the width of the fragment count so that a plain sort of
/// the attribute names recovers the original order.
pub fn split_control_text(text: &str, max_chars: usize) -> Vec<(String, String)> {
    let chars: Vec<char> = text.chars().collect();
    let frags: Vec<String> = chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect();
    let width = frags.len().to_string().len();
    frags
        .into_iter()
        .enumerate()
        .map(|(idx, frag)| {
            (
                format!("{}{:0width$}", CONTROL_FRAGMENT_PREFIX, idx, width = width),
                frag,
            )
        })
        .collect()
}

/// Reassemble control text from the fragments of an attribute map. The map
/// is sorted by attribute name, which is exactly fragment-index order.
pub fn join_control_fragments(attrs: &AttrMap) -> String {
    let mut text = String::new();
    for (key, values) in attrs {
        if key.starts_with(CONTROL_FRAGMENT_PREFIX) {
            if let Some(frag) = values.first() {
                text.push_str(frag);
            }
        }
    }
    text
}

fn single<'a>(attrs: &'a AttrMap, key: &str) -> Result<&'a str> {
    attrs
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .ok_or_else(|| Error::invalid_attributes(format!("missing attribute '{}'", key)))
}
