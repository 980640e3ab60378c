//! Repository-wide configuration, stored in the attribute store under the
//! well-known `meta` key: the known distributions, components and
//! architectures, plus origin, label and the notification topic.

use crate::store::AttrMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The attribute-store key holding the repository metadata.
pub const META_KEY: &str = "meta";

/// The architectures every repository serves implicitly. They can never be
/// added or removed through configuration.
pub const SENTINEL_ARCHS: [&str; 2] = ["all", "source"];

/// Default origin and label when unset.
const DEFAULT_ORIGIN: &str = "repoman";

/// Repository-wide settings. `archs` is the stored set; the sentinels
/// `all` and `source` are excluded from storage but always part of the
/// effective set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMeta {
    /// Known distribution names.
    pub dists: BTreeSet<String>,
    /// Known component names.
    pub comps: BTreeSet<String>,
    /// Configured concrete architectures (sentinels excluded).
    pub archs: BTreeSet<String>,
    /// Notification topic; unset disables notifications.
    pub topic: Option<String>,
    /// Repository origin.
    pub origin: Option<String>,
    /// Repository label.
    pub label: Option<String>,
}

impl RepoMeta {
    /// The effective architecture set: configured architectures plus the
    /// sentinels.
    pub fn effective_archs(&self) -> BTreeSet<String> {
        let mut archs = self.archs.clone();
        for sentinel in SENTINEL_ARCHS {
            archs.insert(sentinel.to_string());
        }
        archs
    }

    /// The concrete binary architectures: effective set minus the
    /// sentinels. These are the architectures that get their own
    /// `binary-<arch>` section.
    pub fn binary_archs(&self) -> Vec<String> {
        self.archs.iter().cloned().collect()
    }

    /// The configured origin, or the default.
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN)
    }

    /// The configured label, or the default.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_ORIGIN)
    }

    /// Render as the attribute map stored under [`META_KEY`].
    pub fn to_attributes(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("dists".to_string(), self.dists.iter().cloned().collect());
        attrs.insert("comps".to_string(), self.comps.iter().cloned().collect());
        attrs.insert("archs".to_string(), self.archs.iter().cloned().collect());
        attrs.insert(
            "topic_name".to_string(),
            vec![self.topic.clone().unwrap_or_default()],
        );
        attrs.insert(
            "origin".to_string(),
            vec![self.origin.clone().unwrap_or_default()],
        );
        attrs.insert(
            "label".to_string(),
            vec![self.label.clone().unwrap_or_default()],
        );
        attrs
    }

    /// Reconstruct from a stored attribute map. Empty strings for the
    /// scalar settings mean "unset".
    pub fn from_attributes(attrs: &AttrMap) -> Self {
        let list = |key: &str| -> BTreeSet<String> {
            attrs
                .get(key)
                .map(|values| values.iter().cloned().collect())
                .unwrap_or_default()
        };
        let scalar = |key: &str| -> Option<String> {
            attrs
                .get(key)
                .and_then(|values| values.first())
                .filter(|value| !value.is_empty())
                .cloned()
        };
        Self {
            dists: list("dists"),
            comps: list("comps"),
            archs: list("archs"),
            topic: scalar("topic_name"),
            origin: scalar("origin"),
            label: scalar("label"),
        }
    }
}

/// A change request against the repository metadata.
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    /// Distributions to add or remove.
    pub dists: Vec<String>,
    /// Components to add or remove.
    pub comps: Vec<String>,
    /// Architectures to add or remove. Sentinels are stripped.
    pub archs: Vec<String>,
    /// Topic to set (add) or clear (remove, any value).
    pub topic: Option<String>,
    /// Origin to set or clear.
    pub origin: Option<String>,
    /// Label to set or clear.
    pub label: Option<String>,
}

/// The closed set of metadata operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaAction {
    /// Add values / set scalar settings.
    Add,
    /// Remove values / clear scalar settings.
    Remove,
}
