//! The copy / promote engine: computes a minimal, idempotent
//! transformation between a source placement and a destination placement,
//! then executes it with the necessary pool copies, catalog writes and
//! notifications.

use crate::catalog::{check_comps, check_dists, describe, BatchReport, Catalog};
use crate::error::{Error, Result};
use crate::group::{compare_versions, GroupedView};
use crate::query::Filter;
use crate::store::{Event, ObjectStore};
use apt_repository::pool_path;
use log::{debug, info, warn};
use std::cmp::Ordering;

/// A validated copy plan: the surviving candidates and the items to create,
/// keyed identically (both sides use the candidate placement as tree keys,
/// while the target items already carry the destination placement).
#[derive(Debug, Clone)]
pub struct CopySpec {
    /// The source items that remain after no-op elimination.
    pub candidates: GroupedView,
    /// The items to create, one per surviving candidate.
    pub targets: GroupedView,
}

impl Catalog {
    /// Candidate items for a copy: a query restricted to one source
    /// distribution and component.
    pub async fn candidates(
        &self,
        src_dist: &str,
        src_comp: &str,
        filter: &Filter,
        keep_count: i64,
    ) -> Result<GroupedView> {
        let mut filter = filter.clone();
        filter.dists = vec![src_dist.to_string()];
        filter.comps = vec![src_comp.to_string()];
        self.query(&filter, keep_count).await
    }

    /// Compute the copy spec for moving `candidates` to (`dst_dist`,
    /// `dst_comp`).
    ///
    /// No-ops are eliminated: a target identical to its source, or already
    /// present at the destination, drops the candidate from both sides.
    /// Under `promote`, a candidate whose version is not strictly newer
    /// than the newest destination version for that (name, architecture)
    /// is dropped as well. After pruning, both sides must have identical
    /// shapes; a mismatch is an internal-consistency error.
    pub async fn copy_spec(
        &self,
        candidates: &GroupedView,
        dst_dist: &str,
        dst_comp: &str,
        promote: bool,
    ) -> Result<CopySpec> {
        let meta = self.meta().await?;
        check_dists(&meta, std::slice::from_ref(&dst_dist.to_string()))?;
        check_comps(&meta, std::slice::from_ref(&dst_comp.to_string()))?;

        let names: Vec<String> = candidates.names().map(str::to_string).collect();
        let existing = self
            .query_with_meta(
                &meta,
                &Filter {
                    names,
                    dists: vec![dst_dist.to_string()],
                    comps: vec![dst_comp.to_string()],
                    ..Filter::default()
                },
                0,
            )
            .await?;

        let mut kept = GroupedView::new();
        let mut targets = GroupedView::new();
        for (name, dist, comp, arch, item) in candidates.walk() {
            let target = item.with_placement(dst_dist, dst_comp);
            if target == *item {
                debug!("same as source: {}", describe(item));
                continue;
            }
            if existing
                .leaf(name, dst_dist, dst_comp, arch)
                .map_or(false, |leaf| leaf.contains(&target))
            {
                debug!("already at target: {}", describe(&target));
                continue;
            }
            if promote {
                // only strictly newer versions move forward
                if let Some(leaf) = existing.leaf(name, dst_dist, dst_comp, arch) {
                    if let Some(newest) = leaf.last() {
                        if compare_versions(&newest.version, &target.version) != Ordering::Less {
                            warn!(
                                "skipping {}: destination already has {}",
                                describe(item),
                                newest.version
                            );
                            continue;
                        }
                    }
                }
            }
            kept.insert_at(name, dist, comp, arch, item.clone());
            targets.insert_at(name, dist, comp, arch, target);
        }

        if let Err(mismatch) = kept.shape_matches(&targets) {
            return Err(Error::CopySpecMismatch(mismatch));
        }
        Ok(CopySpec {
            candidates: kept,
            targets,
        })
    }

    /// Execute a copy spec: for every surviving target, copy the artifact
    /// objects across pool paths when the distribution changes, then write
    /// the new catalog item and notify. An artifact already present at the
    /// destination is tolerated. With `auto_purge > 0`, every touched
    /// destination leaf is afterwards pruned to its newest `auto_purge`
    /// versions.
    pub async fn execute_copy(
        &self,
        spec: &CopySpec,
        objects: &dyn ObjectStore,
        overwrite: bool,
        auto_purge: i64,
    ) -> Result<BatchReport> {
        let meta = self.meta().await?;
        let mut report = BatchReport::new();
        for ((_, _, _, _, src), (name, _, _, _, target)) in
            spec.candidates.walk().zip(spec.targets.walk())
        {
            let subject = describe(target);
            match self
                .copy_one(src, target, objects, overwrite)
                .await
            {
                Ok(()) => {
                    report.push(subject, Ok(()));
                    let event = Event::new("copy", "package", name, self.caller())
                        .version(target.version.as_str())
                        .placement(target.distribution.as_str(), target.component.as_str())
                        .source_placement(src.distribution.as_str(), src.component.as_str());
                    self.notify(&meta, &event).await;
                }
                Err(err) => report.push(subject, Err(err)),
            }
        }

        if auto_purge > 0 {
            for (name, dist, comp, arch) in spec.targets.leaf_keys() {
                let Some(leaf) = spec.targets.leaf(&name, &dist, &comp, &arch) else {
                    continue;
                };
                let Some(first) = leaf.first() else { continue };
                let (dst_dist, dst_comp) = (first.distribution.clone(), first.component.clone());
                warn!(
                    "automatically purging all but the {} newest versions of {} in {}/{} ({})",
                    auto_purge, name, dst_dist, dst_comp, arch
                );
                match self
                    .purge_old(&meta, &name, &dst_dist, &dst_comp, &arch, auto_purge)
                    .await
                {
                    Ok(purged) => report.merge(purged),
                    Err(err) => report.push(format!("purge {}", name), Err(err)),
                }
            }
        }
        Ok(report)
    }

    async fn copy_one(
        &self,
        src: &crate::item::CatalogItem,
        target: &crate::item::CatalogItem,
        objects: &dyn ObjectStore,
        overwrite: bool,
    ) -> Result<()> {
        if src.distribution != target.distribution {
            warn!(
                "copy of package {} from distribution {} to {} requires an object copy",
                target.name, src.distribution, target.distribution
            );
            for file in target.artifact_files() {
                let old_path = pool_path(&src.distribution, &target.name, file);
                let new_path = pool_path(&target.distribution, &target.name, file);
                match objects.copy(&old_path, &new_path, overwrite).await {
                    Ok(()) => {}
                    Err(Error::ArtifactExists(path)) => {
                        warn!("artifact already exists at {}", path);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        info!("creating {}", describe(target));
        self.store()
            .put(&target.key(), &target.to_attributes(), true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PackageDesc;
    use crate::config::MetaPatch;
    use crate::store::{MemoryAttributeStore, MemoryNotifier, MemoryObjectStore, Notifier};
    use std::sync::Arc;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn catalog() -> (Catalog, Arc<MemoryNotifier>) {
        let store = Arc::new(MemoryAttributeStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let catalog = Catalog::new(
            "testdomain",
            store,
            notifier.clone() as Arc<dyn Notifier>,
            "tester",
        );
        catalog
            .initialize(MetaPatch {
                dists: strings(&["xenial", "jessie"]),
                comps: strings(&["main", "nightly"]),
                archs: strings(&["amd64"]),
                topic: Some("repo-events".to_string()),
                ..MetaPatch::default()
            })
            .await
            .unwrap();
        (catalog, notifier)
    }

    fn package(version: &str) -> PackageDesc {
        PackageDesc {
            name: "foo".to_string(),
            version: version.to_string(),
            architecture: "amd64".to_string(),
            filename: format!("foo_{}_amd64.deb", version),
            md5: "md5".to_string(),
            sha1: "sha1".to_string(),
            sha256: "sha256".to_string(),
            size: 1,
            control: format!("Package: foo\nVersion: {}\n", version),
        }
    }

    async fn add(catalog: &Catalog, version: &str, dist: &str, comp: &str) {
        let report = catalog
            .add_package(&package(version), &strings(&[dist]), &strings(&[comp]), false, 0)
            .await
            .unwrap();
        assert!(report.is_ok());
    }

    #[tokio::test]
    async fn test_noop_copy_prunes_everything() {
        let (catalog, _) = catalog().await;
        add(&catalog, "1.0", "xenial", "main").await;
        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "xenial", "main", false)
            .await
            .unwrap();
        assert!(spec.candidates.is_empty());
        assert!(spec.targets.is_empty());
    }

    #[tokio::test]
    async fn test_copy_already_at_destination_is_pruned() {
        let (catalog, _) = catalog().await;
        add(&catalog, "1.0", "xenial", "main").await;
        add(&catalog, "1.0", "jessie", "main").await;
        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", false)
            .await
            .unwrap();
        assert!(spec.targets.is_empty());
    }

    #[tokio::test]
    async fn test_promote_prunes_older_retains_newer() {
        let (catalog, _) = catalog().await;
        add(&catalog, "2.0", "jessie", "main").await;
        add(&catalog, "1.0", "xenial", "main").await;
        add(&catalog, "3.0", "xenial", "main").await;

        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", true)
            .await
            .unwrap();
        // 1.0 is older than the destination's 2.0 and gets pruned; 3.0 moves
        assert_eq!(spec.targets.len(), 1);
        let (_, _, _, _, target) = spec.targets.walk().next().unwrap();
        assert_eq!(target.version, "3.0");
        assert_eq!(target.distribution, "jessie");
    }

    #[tokio::test]
    async fn test_promote_equal_version_is_pruned() {
        let (catalog, _) = catalog().await;
        add(&catalog, "2.0", "jessie", "main").await;
        add(&catalog, "2.0", "xenial", "nightly").await;
        let candidates = catalog
            .candidates("xenial", "nightly", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", true)
            .await
            .unwrap();
        assert!(spec.targets.is_empty());
    }

    #[tokio::test]
    async fn test_cross_dist_copy_moves_artifacts() {
        let (catalog, notifier) = catalog().await;
        add(&catalog, "1.0", "xenial", "main").await;

        let objects = MemoryObjectStore::new();
        objects
            .put("pool/xenial/f/foo/foo_1.0_amd64.deb", b"deb-bytes", "binary/octet-stream")
            .await
            .unwrap();

        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", false)
            .await
            .unwrap();
        assert_eq!(spec.targets.len(), 1);

        let report = catalog
            .execute_copy(&spec, &objects, false, 0)
            .await
            .unwrap();
        assert!(report.is_ok());

        // the artifact was copied to the destination pool path
        assert_eq!(
            objects.get("pool/jessie/f/foo/foo_1.0_amd64.deb").unwrap(),
            b"deb-bytes"
        );
        // and the destination catalog entry exists
        let view = catalog
            .query(
                &Filter {
                    dists: strings(&["jessie"]),
                    ..Filter::default()
                },
                0,
            )
            .await
            .unwrap();
        assert_eq!(view.len(), 1);

        let copies: Vec<_> = notifier
            .events()
            .into_iter()
            .filter(|event| event.action == "copy")
            .collect();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].src_distribution.as_deref(), Some("xenial"));
        assert_eq!(copies[0].distribution.as_deref(), Some("jessie"));
    }

    #[tokio::test]
    async fn test_copy_tolerates_existing_artifact() {
        let (catalog, _) = catalog().await;
        add(&catalog, "1.0", "xenial", "main").await;

        let objects = MemoryObjectStore::new();
        objects
            .put("pool/xenial/f/foo/foo_1.0_amd64.deb", b"deb-bytes", "binary/octet-stream")
            .await
            .unwrap();
        objects
            .put("pool/jessie/f/foo/foo_1.0_amd64.deb", b"already-there", "binary/octet-stream")
            .await
            .unwrap();

        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", false)
            .await
            .unwrap();
        let report = catalog
            .execute_copy(&spec, &objects, false, 0)
            .await
            .unwrap();
        assert!(report.is_ok());
        // the existing artifact was not clobbered
        assert_eq!(
            objects.get("pool/jessie/f/foo/foo_1.0_amd64.deb").unwrap(),
            b"already-there"
        );
    }

    #[tokio::test]
    async fn test_copy_with_auto_purge() {
        let (catalog, _) = catalog().await;
        add(&catalog, "1.0", "jessie", "main").await;
        add(&catalog, "2.0", "xenial", "main").await;

        let objects = MemoryObjectStore::new();
        objects
            .put("pool/xenial/f/foo/foo_2.0_amd64.deb", b"deb", "binary/octet-stream")
            .await
            .unwrap();

        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        let spec = catalog
            .copy_spec(&candidates, "jessie", "main", false)
            .await
            .unwrap();
        let report = catalog
            .execute_copy(&spec, &objects, false, 1)
            .await
            .unwrap();
        assert!(report.is_ok());

        // only the newest version survives at the destination
        let view = catalog
            .query(
                &Filter {
                    dists: strings(&["jessie"]),
                    ..Filter::default()
                },
                0,
            )
            .await
            .unwrap();
        assert_eq!(view.len(), 1);
        let (_, _, _, _, item) = view.walk().next().unwrap();
        assert_eq!(item.version, "2.0");
    }

    #[tokio::test]
    async fn test_copy_to_unknown_destination_aborts() {
        let (catalog, _) = catalog().await;
        add(&catalog, "1.0", "xenial", "main").await;
        let candidates = catalog
            .candidates("xenial", "main", &Filter::default(), 0)
            .await
            .unwrap();
        assert!(matches!(
            catalog.copy_spec(&candidates, "wheezy", "main", false).await,
            Err(Error::UnknownDistributions(_))
        ));
    }
}
