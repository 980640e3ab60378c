//! Sources file rendering.
//!
//! Source stanzas are simpler than binary ones: the per-file checksums
//! already live inside the .dsc control paragraph, so the index only adds
//! the pool directory and the package name.

use crate::pool::pool_dir;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A source package entry to be rendered into a Sources file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePackage {
    /// Source package name.
    pub name: String,
    /// Raw control paragraph of the .dsc.
    pub control: String,
}

impl SourcePackage {
    /// Render the stanza for this source within the given distribution.
    pub fn to_stanza(&self, dist: &str) -> String {
        let mut stanza = String::new();
        stanza.push_str(&format!("Directory: {}\n", pool_dir(dist, &self.name)));
        stanza.push_str(&format!("Package: {}\n", self.name));
        stanza.push_str(&self.control);
        stanza.push('\n');
        stanza
    }
}

/// One Sources file for a single distribution.
#[derive(Debug, Clone)]
pub struct SourcesFile {
    dist: String,
    text: String,
    count: usize,
}

impl SourcesFile {
    /// Create an empty Sources file for a distribution.
    pub fn new<S: Into<String>>(dist: S) -> Self {
        Self {
            dist: dist.into(),
            text: String::new(),
            count: 0,
        }
    }

    /// Append one source stanza.
    pub fn push(&mut self, source: &SourcePackage) {
        self.text.push_str(&source.to_stanza(&self.dist));
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
}

impl fmt::Display for SourcesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
