//! The grouped catalog view: a request-scoped, four-level ordered tree
//! (`name → distribution → component → architecture → items`) used for
//! querying, rendering and diffing. Leaf lists are kept in ascending Debian
//! version order; pruning policies operate per leaf.

use crate::item::CatalogItem;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

type ArchMap = BTreeMap<String, Vec<CatalogItem>>;
type CompMap = BTreeMap<String, ArchMap>;
type DistMap = BTreeMap<String, CompMap>;

/// Compare two Debian version strings. Unparseable versions fall back to
/// plain string comparison rather than poisoning the whole sort.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (
        a.parse::<debversion::Version>(),
        b.parse::<debversion::Version>(),
    ) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// An ephemeral, typed four-level tree of catalog items. Rebuilt on every
/// query, never persisted (except through the backup surface).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedView {
    entries: BTreeMap<String, DistMap>,
}

impl GroupedView {
    /// An empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view from a flat item sequence, sort every leaf and apply
    /// the pruning policy.
    pub fn from_items<I: IntoIterator<Item = CatalogItem>>(items: I, keep_count: i64) -> Self {
        let mut view = Self::new();
        for item in items {
            view.insert(item);
        }
        view.sort_leaves();
        view.prune(keep_count);
        view
    }

    /// Place one item at its own `[name][dist][comp][arch]` leaf.
    pub fn insert(&mut self, item: CatalogItem) {
        self.entries
            .entry(item.name.clone())
            .or_default()
            .entry(item.distribution.clone())
            .or_default()
            .entry(item.component.clone())
            .or_default()
            .entry(item.architecture.clone())
            .or_default()
            .push(item);
    }

    /// Place one item at an explicit leaf, regardless of the placement its
    /// own fields carry. The copy engine keys the target side by the
    /// candidate placement so that both sides share one shape.
    pub fn insert_at(&mut self, name: &str, dist: &str, comp: &str, arch: &str, item: CatalogItem) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .entry(dist.to_string())
            .or_default()
            .entry(comp.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default()
            .push(item);
    }

    /// Sort every leaf ascending by Debian version order.
    pub fn sort_leaves(&mut self) {
        for items in self.leaves_mut() {
            items.sort_by(|a, b| compare_versions(&a.version, &b.version));
        }
    }

    /// Apply the retention policy to every (sorted) leaf.
    ///
    /// * `keep_count > 0`: retain only the `keep_count` newest entries.
    /// * `keep_count < 0`: drop the `|keep_count|` newest entries and keep
    ///   the rest; when `|keep_count| - 1 >= len` the leaf is left alone.
    ///   The guard is asymmetric on purpose: with `|keep_count| == len` the
    ///   leaf prunes to nothing. Candidate for product review, but the
    ///   behavior is long-standing.
    /// * `keep_count == 0`: no pruning.
    ///
    /// Leaves (and branches) emptied by pruning are removed.
    pub fn prune(&mut self, keep_count: i64) {
        if keep_count != 0 {
            for items in self.leaves_mut() {
                let len = items.len();
                if keep_count > 0 {
                    let keep = keep_count as usize;
                    if len > keep {
                        items.drain(..len - keep);
                    }
                } else {
                    let drop = keep_count.unsigned_abs() as usize;
                    if drop - 1 < len {
                        items.truncate(len - drop);
                    }
                }
            }
        }
        self.drop_empty();
    }

    /// Iterate over every item with its tree position.
    pub fn walk(&self) -> impl Iterator<Item = (&str, &str, &str, &str, &CatalogItem)> {
        self.entries.iter().flat_map(|(name, dists)| {
            dists.iter().flat_map(move |(dist, comps)| {
                comps.iter().flat_map(move |(comp, archs)| {
                    archs.iter().flat_map(move |(arch, items)| {
                        items.iter().map(move |item| {
                            (
                                name.as_str(),
                                dist.as_str(),
                                comp.as_str(),
                                arch.as_str(),
                                item,
                            )
                        })
                    })
                })
            })
        })
    }

    /// The (name, dist, comp, arch) key of every leaf.
    pub fn leaf_keys(&self) -> Vec<(String, String, String, String)> {
        let mut keys = Vec::new();
        for (name, dists) in &self.entries {
            for (dist, comps) in dists {
                for (comp, archs) in comps {
                    for arch in archs.keys() {
                        keys.push((name.clone(), dist.clone(), comp.clone(), arch.clone()));
                    }
                }
            }
        }
        keys
    }

    /// The package names in the view, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Look up one leaf.
    pub fn leaf(&self, name: &str, dist: &str, comp: &str, arch: &str) -> Option<&[CatalogItem]> {
        self.entries
            .get(name)?
            .get(dist)?
            .get(comp)?
            .get(arch)
            .map(Vec::as_slice)
    }

    /// Total number of items in the view.
    pub fn len(&self) -> usize {
        self.walk().count()
    }

    /// Whether the view holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.walk().next().is_none()
    }

    /// Verify that `self` and `other` have identical shapes: the same keys
    /// at every level and the same number of items at every leaf. Returns a
    /// diagnostic for the first mismatch found.
    pub fn shape_matches(&self, other: &GroupedView) -> Result<(), String> {
        let ours = self.leaf_lengths();
        let theirs = other.leaf_lengths();
        for (key, len) in &ours {
            match theirs.get(key) {
                None => {
                    return Err(format!(
                        "leaf {:?} missing from the other view",
                        key
                    ))
                }
                Some(other_len) if other_len != len => {
                    return Err(format!(
                        "leaf {:?} has {} items on one side and {} on the other",
                        key, len, other_len
                    ))
                }
                Some(_) => {}
            }
        }
        for key in theirs.keys() {
            if !ours.contains_key(key) {
                return Err(format!("leaf {:?} missing from this view", key));
            }
        }
        Ok(())
    }

    /// Remove leaves with no items, and branches with no leaves.
    fn drop_empty(&mut self) {
        for dists in self.entries.values_mut() {
            for comps in dists.values_mut() {
                for archs in comps.values_mut() {
                    archs.retain(|_, items| !items.is_empty());
                }
                comps.retain(|_, archs| !archs.is_empty());
            }
            dists.retain(|_, comps| !comps.is_empty());
        }
        self.entries.retain(|_, dists| !dists.is_empty());
    }

    fn leaves_mut(&mut self) -> impl Iterator<Item = &mut Vec<CatalogItem>> {
        self.entries.values_mut().flat_map(|dists| {
            dists
                .values_mut()
                .flat_map(|comps| comps.values_mut().flat_map(|archs| archs.values_mut()))
        })
    }

    fn leaf_lengths(&self) -> BTreeMap<(String, String, String, String), usize> {
        let mut lengths = BTreeMap::new();
        for (name, dists) in &self.entries {
            for (dist, comps) in dists {
                for (comp, archs) in comps {
                    for (arch, items) in archs {
                        lengths.insert(
                            (name.clone(), dist.clone(), comp.clone(), arch.clone()),
                            items.len(),
                        );
                    }
                }
            }
        }
        lengths
    }
}
