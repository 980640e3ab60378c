//! The catalog engine: repository setup, metadata changes, ingest, query,
//! removal and the backup surface. All backend access goes through the
//! injected capabilities; nothing in here caches remote state beyond the
//! current call.

use crate::config::{MetaAction, MetaPatch, RepoMeta, META_KEY, SENTINEL_ARCHS};
use crate::error::{Error, Result};
use crate::group::GroupedView;
use crate::item::{CatalogItem, Payload, SOURCE_ARCH};
use crate::query::{Filter, Query};
use crate::store::{AttrMap, AttributeStore, Event, Notifier};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An already-parsed binary package descriptor, as produced by whatever
/// ingests the .deb. Control parsing is not this crate's concern.
#[derive(Debug, Clone)]
pub struct PackageDesc {
    /// Package name.
    pub name: String,
    /// Debian version string.
    pub version: String,
    /// Package architecture.
    pub architecture: String,
    /// Artifact file name (basename).
    pub filename: String,
    /// MD5 digest, hex-encoded.
    pub md5: String,
    /// SHA-1 digest, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest, hex-encoded.
    pub sha256: String,
    /// Artifact size in bytes.
    pub size: u64,
    /// Raw control paragraph.
    pub control: String,
}

impl PackageDesc {
    fn item(&self, dist: &str, comp: &str) -> CatalogItem {
        CatalogItem {
            name: self.name.clone(),
            version: self.version.clone(),
            distribution: dist.to_string(),
            component: comp.to_string(),
            architecture: self.architecture.clone(),
            payload: Payload::Binary {
                filename: self.filename.clone(),
                md5: self.md5.clone(),
                sha1: self.sha1.clone(),
                sha256: self.sha256.clone(),
                size: self.size,
            },
            control: self.control.clone(),
        }
    }
}

/// An already-parsed source package descriptor (.dsc contents).
#[derive(Debug, Clone)]
pub struct SourceDesc {
    /// Source package name.
    pub name: String,
    /// Debian version string.
    pub version: String,
    /// File names belonging to the bundle, in .dsc order.
    pub files: Vec<String>,
    /// Raw control paragraph.
    pub control: String,
}

impl SourceDesc {
    fn item(&self, dist: &str, comp: &str) -> CatalogItem {
        CatalogItem {
            name: self.name.clone(),
            version: self.version.clone(),
            distribution: dist.to_string(),
            component: comp.to_string(),
            architecture: SOURCE_ARCH.to_string(),
            payload: Payload::Source {
                files: self.files.clone(),
            },
            control: self.control.clone(),
        }
    }
}

/// The result of one item within a batch operation.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Human-readable identity of the item.
    pub subject: String,
    /// What happened to it.
    pub result: Result<()>,
}

/// Per-item results of a batch operation. Batches continue past individual
/// conflicts and report the aggregate instead of failing fast.
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn push<S: Into<String>>(&mut self, subject: S, result: Result<()>) {
        self.outcomes.push(BatchOutcome {
            subject: subject.into(),
            result,
        });
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// Every recorded outcome.
    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    /// The failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    /// Number of failed items.
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Number of successful items.
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }

    /// Whether every item succeeded.
    pub fn is_ok(&self) -> bool {
        self.failed() == 0
    }
}

/// A full repository export: the metadata item plus every catalog entry.
/// Restoring into an empty catalog reproduces an identical grouped view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    /// The raw `meta` attribute map.
    pub metadata: AttrMap,
    /// Every item, grouped with no filters applied.
    pub packages: GroupedView,
}

/// The repository catalog engine.
pub struct Catalog {
    domain: String,
    store: Arc<dyn AttributeStore>,
    notifier: Arc<dyn Notifier>,
    caller: String,
}

impl Catalog {
    /// Create an engine for one attribute-store domain. `caller` is the
    /// identity recorded in every notification.
    pub fn new<S: Into<String>>(
        domain: S,
        store: Arc<dyn AttributeStore>,
        notifier: Arc<dyn Notifier>,
        caller: S,
    ) -> Self {
        Self {
            domain: domain.into(),
            store,
            notifier,
            caller: caller.into(),
        }
    }

    /// The attribute-store domain this catalog lives in.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn caller(&self) -> &str {
        &self.caller
    }

    pub(crate) fn store(&self) -> &dyn AttributeStore {
        self.store.as_ref()
    }

    /// Fetch the repository metadata. Fetched per call; never cached.
    pub async fn meta(&self) -> Result<RepoMeta> {
        match self.store.get(META_KEY).await? {
            Some(attrs) => Ok(RepoMeta::from_attributes(&attrs)),
            None => Err(Error::MetaNotFound(self.domain.clone())),
        }
    }

    /// Create the backing domain (if needed) and write the initial
    /// repository metadata, merging with whatever is already there.
    pub async fn initialize(&self, patch: MetaPatch) -> Result<RepoMeta> {
        if self.store.domain_exists().await? {
            warn!("domain \"{}\" already exists", self.domain);
        } else {
            warn!("creating domain {}", self.domain);
            self.store.create_domain().await?;
        }
        let current = match self.store.get(META_KEY).await? {
            Some(attrs) => RepoMeta::from_attributes(&attrs),
            None => RepoMeta::default(),
        };
        self.apply_meta_patch(current, MetaAction::Add, patch).await
    }

    /// Apply one metadata change. Removing a value that is not configured
    /// warns and skips it; the sentinels `all` and `source` can be neither
    /// added nor removed.
    pub async fn update_meta(&self, action: MetaAction, patch: MetaPatch) -> Result<RepoMeta> {
        let current = self.meta().await?;
        self.apply_meta_patch(current, action, patch).await
    }

    async fn apply_meta_patch(
        &self,
        mut meta: RepoMeta,
        action: MetaAction,
        patch: MetaPatch,
    ) -> Result<RepoMeta> {
        let old_topic = meta.topic.clone();
        let mut events = Vec::new();
        let action_name = match action {
            MetaAction::Add => "add",
            MetaAction::Remove => "delete",
        };

        let mut archs = patch.archs;
        archs.retain(|arch| {
            if SENTINEL_ARCHS.contains(&arch.as_str()) {
                warn!("the \"{}\" architecture is implicit and cannot be changed", arch);
                false
            } else {
                true
            }
        });

        let lists: [(&str, &[String], &mut BTreeSet<String>); 3] = [
            ("dists", &patch.dists, &mut meta.dists),
            ("comps", &patch.comps, &mut meta.comps),
            ("archs", &archs, &mut meta.archs),
        ];
        for (kind, values, set) in lists {
            for value in values {
                let changed = match action {
                    MetaAction::Add => set.insert(value.clone()),
                    MetaAction::Remove => set.remove(value),
                };
                if changed {
                    events.push(Event::new(action_name, kind, value.as_str(), self.caller.as_str()));
                } else {
                    match action {
                        MetaAction::Add => warn!("{} {} already configured; skipping", kind, value),
                        MetaAction::Remove => {
                            warn!("{} {} is not configured; cannot delete", kind, value)
                        }
                    }
                }
            }
        }

        let scalars = [
            ("sns_topic", patch.topic, &mut meta.topic),
            ("origin", patch.origin, &mut meta.origin),
            ("label", patch.label, &mut meta.label),
        ];
        for (kind, requested, setting) in scalars {
            if let Some(value) = requested {
                match action {
                    MetaAction::Add => {
                        debug!("setting {}: {}", kind, value);
                        *setting = Some(value.clone());
                        events.push(Event::new("add", kind, value.as_str(), self.caller.as_str()));
                    }
                    MetaAction::Remove => {
                        if let Some(old) = setting.take() {
                            debug!("clearing {}", kind);
                            events.push(Event::new("delete", kind, old.as_str(), self.caller.as_str()));
                        }
                    }
                }
            }
        }

        self.store.put(META_KEY, &meta.to_attributes(), true).await?;
        // a freshly set topic receives its own events; a removed topic
        // still receives the removal
        let topic = match action {
            MetaAction::Add => meta.topic.clone(),
            MetaAction::Remove => old_topic,
        };
        for event in events {
            self.notify_to(topic.as_deref(), &event).await;
        }
        Ok(meta)
    }

    /// Query the catalog: validate the filter against the repository
    /// configuration, select, group, sort and prune.
    pub async fn query(&self, filter: &Filter, keep_count: i64) -> Result<GroupedView> {
        let meta = self.meta().await?;
        self.query_with_meta(&meta, filter, keep_count).await
    }

    pub(crate) async fn query_with_meta(
        &self,
        meta: &RepoMeta,
        filter: &Filter,
        keep_count: i64,
    ) -> Result<GroupedView> {
        if !filter.dists.is_empty() {
            check_dists(meta, &filter.dists)?;
        }
        if !filter.comps.is_empty() {
            check_comps(meta, &filter.comps)?;
        }
        if !filter.archs.is_empty() {
            check_archs(meta, &filter.archs)?;
        }
        let query = Query::build(&self.domain, filter);
        debug!("query: {}", query.expression());
        let rows = self.store.select(&query).await?;
        let mut items = Vec::with_capacity(rows.len());
        for attrs in &rows {
            items.push(CatalogItem::from_attributes(attrs)?);
        }
        Ok(GroupedView::from_items(items, keep_count))
    }

    /// Ingest a binary package into each (distribution, component). One
    /// catalog entry per placement; duplicates without `overwrite` are
    /// per-item conflicts and the batch continues. With `auto_purge > 0`,
    /// every successful placement is followed by a purge of everything but
    /// the `auto_purge` newest versions at that leaf.
    pub async fn add_package(
        &self,
        pkg: &PackageDesc,
        dists: &[String],
        comps: &[String],
        overwrite: bool,
        auto_purge: i64,
    ) -> Result<BatchReport> {
        let meta = self.meta().await?;
        check_archs(&meta, std::slice::from_ref(&pkg.architecture))?;
        check_dists(&meta, dists)?;
        check_comps(&meta, comps)?;
        let mut report = BatchReport::new();
        for dist in dists {
            for comp in comps {
                let item = pkg.item(dist, comp);
                self.ingest_item(&meta, item, "package", overwrite, auto_purge, &mut report)
                    .await;
            }
        }
        Ok(report)
    }

    /// Ingest a source bundle into each (distribution, component).
    pub async fn add_source(
        &self,
        src: &SourceDesc,
        dists: &[String],
        comps: &[String],
        overwrite: bool,
        auto_purge: i64,
    ) -> Result<BatchReport> {
        let meta = self.meta().await?;
        check_dists(&meta, dists)?;
        check_comps(&meta, comps)?;
        let mut report = BatchReport::new();
        for dist in dists {
            for comp in comps {
                let item = src.item(dist, comp);
                self.ingest_item(&meta, item, "source", overwrite, auto_purge, &mut report)
                    .await;
            }
        }
        Ok(report)
    }

    async fn ingest_item(
        &self,
        meta: &RepoMeta,
        item: CatalogItem,
        kind: &str,
        overwrite: bool,
        auto_purge: i64,
        report: &mut BatchReport,
    ) {
        let subject = describe(&item);
        match self.put_new_item(&item, overwrite).await {
            Ok(()) => {
                info!("created {} {}", kind, subject);
                report.push(subject, Ok(()));
                let event = Event::new("add", kind, item.name.as_str(), self.caller.as_str())
                    .version(item.version.as_str())
                    .placement(item.distribution.as_str(), item.component.as_str());
                self.notify(meta, &event).await;
                if auto_purge > 0 {
                    warn!(
                        "automatically purging all but the {} newest versions of {} in {}/{} ({})",
                        auto_purge, item.name, item.distribution, item.component, item.architecture
                    );
                    match self
                        .purge_old(
                            meta,
                            &item.name,
                            &item.distribution,
                            &item.component,
                            &item.architecture,
                            auto_purge,
                        )
                        .await
                    {
                        Ok(purged) => report.merge(purged),
                        Err(err) => report.push(format!("purge {}", item.name), Err(err)),
                    }
                }
            }
            Err(err) => {
                report.push(subject, Err(err));
            }
        }
    }

    async fn put_new_item(&self, item: &CatalogItem, overwrite: bool) -> Result<()> {
        let key = item.key();
        debug!("key name: {}", key);
        if !overwrite && self.store.get(&key).await?.is_some() {
            return Err(Error::ItemExists(describe(item)));
        }
        self.store.put(&key, &item.to_attributes(), true).await
    }

    /// Delete every item in the target view from the catalog. Artifact
    /// blobs are deliberately left in the object store; removal only
    /// affects what publish will index.
    pub async fn remove(&self, targets: &GroupedView) -> Result<BatchReport> {
        let meta = self.meta().await?;
        self.remove_with_meta(&meta, targets).await
    }

    pub(crate) async fn remove_with_meta(
        &self,
        meta: &RepoMeta,
        targets: &GroupedView,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new();
        for (_, _, _, _, item) in targets.walk() {
            let subject = describe(item);
            warn!("deleting {}", subject);
            match self.store.delete(&item.key(), &item.to_attributes()).await {
                Ok(()) => {
                    report.push(subject, Ok(()));
                    let event =
                        Event::new("delete", "package", item.name.as_str(), self.caller.as_str())
                            .version(item.version.as_str())
                            .placement(item.distribution.as_str(), item.component.as_str());
                    self.notify(meta, &event).await;
                }
                Err(err) => report.push(subject, Err(err)),
            }
        }
        Ok(report)
    }

    pub(crate) async fn purge_old(
        &self,
        meta: &RepoMeta,
        name: &str,
        dist: &str,
        comp: &str,
        arch: &str,
        keep: i64,
    ) -> Result<BatchReport> {
        let filter = Filter {
            names: vec![name.to_string()],
            dists: vec![dist.to_string()],
            comps: vec![comp.to_string()],
            archs: vec![arch.to_string()],
            ..Filter::default()
        };
        let targets = self.query_with_meta(meta, &filter, -keep).await?;
        self.remove_with_meta(meta, &targets).await
    }

    /// Export the whole repository: the metadata item and every catalog
    /// entry, grouped with no filters.
    pub async fn export(&self) -> Result<Backup> {
        let metadata = self
            .store
            .get(META_KEY)
            .await?
            .ok_or_else(|| Error::MetaNotFound(self.domain.clone()))?;
        let packages = self.query(&Filter::default(), 0).await?;
        Ok(Backup { metadata, packages })
    }

    /// Replay a backup: every leaf item becomes a catalog write and the
    /// metadata item is replaced wholesale. Restore does not notify.
    pub async fn restore(&self, backup: &Backup) -> Result<BatchReport> {
        let mut report = BatchReport::new();
        for (_, _, _, _, item) in backup.packages.walk() {
            let subject = describe(item);
            info!("restoring item: {}", subject);
            let result = self
                .store
                .put(&item.key(), &item.to_attributes(), true)
                .await;
            report.push(subject, result);
        }
        info!("restoring repo configuration");
        self.store.put(META_KEY, &backup.metadata, true).await?;
        Ok(report)
    }

    pub(crate) async fn notify(&self, meta: &RepoMeta, event: &Event) {
        self.notify_to(meta.topic.as_deref(), event).await;
    }

    async fn notify_to(&self, topic: Option<&str>, event: &Event) {
        match topic {
            Some(_) => self.notifier.publish(event).await,
            None => debug!("no notification topic configured; dropping event"),
        }
    }
}

pub(crate) fn describe(item: &CatalogItem) -> String {
    format!(
        "{} {} in {}/{} ({})",
        item.name, item.version, item.distribution, item.component, item.architecture
    )
}

pub(crate) fn check_dists(meta: &RepoMeta, dists: &[String]) -> Result<()> {
    let unknown = missing_from(&meta.dists, dists);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::UnknownDistributions(unknown))
    }
}

pub(crate) fn check_comps(meta: &RepoMeta, comps: &[String]) -> Result<()> {
    let unknown = missing_from(&meta.comps, comps);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::UnknownComponents(unknown))
    }
}

pub(crate) fn check_archs(meta: &RepoMeta, archs: &[String]) -> Result<()> {
    let unknown = missing_from(&meta.effective_archs(), archs);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(Error::UnknownArchitectures(unknown))
    }
}

fn missing_from(known: &BTreeSet<String>, candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .filter(|candidate| !known.contains(*candidate))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryAttributeStore, MemoryNotifier};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> (Catalog, Arc<MemoryNotifier>) {
        let store = Arc::new(MemoryAttributeStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let catalog = Catalog::new(
            "testdomain",
            store,
            notifier.clone() as Arc<dyn Notifier>,
            "tester",
        );
        (catalog, notifier)
    }

    async fn initialized() -> (Catalog, Arc<MemoryNotifier>) {
        let (catalog, notifier) = catalog();
        catalog
            .initialize(MetaPatch {
                dists: strings(&["xenial", "jessie"]),
                comps: strings(&["main", "nightly"]),
                archs: strings(&["amd64", "i386"]),
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
            size: 1296,
            control: format!("Package: foo\nVersion: {}\nArchitecture: amd64\n", version),
        }
    }

    #[tokio::test]
    async fn test_initialize_and_meta() {
        let (catalog, notifier) = initialized().await;
        let meta = catalog.meta().await.unwrap();
        assert_eq!(meta.dists.len(), 2);
        assert!(meta.effective_archs().contains("all"));
        assert!(meta.effective_archs().contains("source"));
        // one event per added value, plus the topic itself
        assert_eq!(notifier.events().len(), 7);
    }

    #[tokio::test]
    async fn test_meta_missing_is_an_error() {
        let (catalog, _) = catalog();
        assert!(matches!(
            catalog.meta().await,
            Err(Error::MetaNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sentinels_cannot_be_configured() {
        let (catalog, _) = initialized().await;
        let meta = catalog
            .update_meta(
                MetaAction::Add,
                MetaPatch {
                    archs: strings(&["all", "source", "armhf"]),
                    ..MetaPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(meta.archs.contains("armhf"));
        assert!(!meta.archs.contains("all"));
        assert!(!meta.archs.contains("source"));

        let meta = catalog
            .update_meta(
                MetaAction::Remove,
                MetaPatch {
                    archs: strings(&["all", "armhf"]),
                    ..MetaPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(meta.effective_archs().contains("all"));
        assert!(!meta.archs.contains("armhf"));
    }

    #[tokio::test]
    async fn test_update_meta_remove_clears_topic() {
        let (catalog, _) = initialized().await;
        let meta = catalog
            .update_meta(
                MetaAction::Remove,
                MetaPatch {
                    topic: Some(String::new()),
                    ..MetaPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(meta.topic, None);
    }

    #[tokio::test]
    async fn test_add_package_and_query() {
        let (catalog, notifier) = initialized().await;
        let report = catalog
            .add_package(&package("1.0"), &strings(&["xenial"]), &strings(&["main"]), false, 0)
            .await
            .unwrap();
        assert!(report.is_ok());
        assert_eq!(report.succeeded(), 1);

        let view = catalog.query(&Filter::default(), 0).await.unwrap();
        assert_eq!(view.len(), 1);
        let (_, _, _, _, item) = view.walk().next().unwrap();
        assert_eq!(item.name, "foo");
        assert_eq!(item.version, "1.0");
        assert_eq!(item.architecture, "amd64");

        let added: Vec<_> = notifier
            .events()
            .into_iter()
            .filter(|event| event.kind == "package")
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].action, "add");
        assert_eq!(added[0].distribution.as_deref(), Some("xenial"));
    }

    #[tokio::test]
    async fn test_add_duplicate_is_per_item_conflict() {
        let (catalog, _) = initialized().await;
        let dists = strings(&["xenial"]);
        let comps = strings(&["main"]);
        catalog
            .add_package(&package("1.0"), &dists, &comps, false, 0)
            .await
            .unwrap();

        let report = catalog
            .add_package(&package("1.0"), &dists, &comps, false, 0)
            .await
            .unwrap();
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcomes()[0].result,
            Err(Error::ItemExists(_))
        ));

        // overwrite allows replacement
        let report = catalog
            .add_package(&package("1.0"), &dists, &comps, true, 0)
            .await
            .unwrap();
        assert!(report.is_ok());
    }

    #[tokio::test]
    async fn test_add_package_unknown_dist_aborts() {
        let (catalog, _) = initialized().await;
        let result = catalog
            .add_package(&package("1.0"), &strings(&["wheezy"]), &strings(&["main"]), false, 0)
            .await;
        assert!(matches!(result, Err(Error::UnknownDistributions(_))));
        // nothing was written
        let view = catalog.query(&Filter::default(), 0).await.unwrap();
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_batch_spans_placements() {
        let (catalog, _) = initialized().await;
        let report = catalog
            .add_package(
                &package("1.0"),
                &strings(&["xenial", "jessie"]),
                &strings(&["main", "nightly"]),
                false,
                0,
            )
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 4);
        let view = catalog.query(&Filter::default(), 0).await.unwrap();
        assert_eq!(view.len(), 4);
    }

    #[tokio::test]
    async fn test_auto_purge_on_ingest() {
        let (catalog, _) = initialized().await;
        let dists = strings(&["xenial"]);
        let comps = strings(&["main"]);
        for version in ["1.0", "2.0"] {
            catalog
                .add_package(&package(version), &dists, &comps, false, 0)
                .await
                .unwrap();
        }
        // adding 3.0 with auto_purge=1 removes everything but the newest
        let report = catalog
            .add_package(&package("3.0"), &dists, &comps, false, 1)
            .await
            .unwrap();
        assert!(report.is_ok());

        let view = catalog.query(&Filter::default(), 0).await.unwrap();
        assert_eq!(view.len(), 1);
        let (_, _, _, _, item) = view.walk().next().unwrap();
        assert_eq!(item.version, "3.0");
    }

    #[tokio::test]
    async fn test_remove_excluding_newest() {
        let (catalog, _) = initialized().await;
        let dists = strings(&["xenial"]);
        let comps = strings(&["main"]);
        for version in ["1.0", "2.0", "3.0"] {
            catalog
                .add_package(&package(version), &dists, &comps, false, 0)
                .await
                .unwrap();
        }

        // "exclude the 1 most recent from deletion"
        let targets = catalog
            .query(&Filter::names(["foo"]), -1)
            .await
            .unwrap();
        assert_eq!(targets.len(), 2);
        let report = catalog.remove(&targets).await.unwrap();
        assert_eq!(report.succeeded(), 2);

        let view = catalog.query(&Filter::default(), 0).await.unwrap();
        assert_eq!(view.len(), 1);
        let (_, _, _, _, item) = view.walk().next().unwrap();
        assert_eq!(item.version, "3.0");
    }

    #[tokio::test]
    async fn test_add_source() {
        let (catalog, _) = initialized().await;
        let src = SourceDesc {
            name: "foo".to_string(),
            version: "1.0-1".to_string(),
            files: vec!["foo_1.0.orig.tar.gz".to_string(), "foo_1.0-1.dsc".to_string()],
            control: "Source: foo\nVersion: 1.0-1\n".to_string(),
        };
        let report = catalog
            .add_source(&src, &strings(&["xenial"]), &strings(&["main"]), false, 0)
            .await
            .unwrap();
        assert!(report.is_ok());

        let view = catalog
            .query(
                &Filter {
                    archs: strings(&["source"]),
                    ..Filter::default()
                },
                0,
            )
            .await
            .unwrap();
        assert_eq!(view.len(), 1);
        let (_, _, _, arch, item) = view.walk().next().unwrap();
        assert_eq!(arch, "source");
        assert_eq!(item.artifact_files().len(), 2);
    }

    #[tokio::test]
    async fn test_backup_roundtrip() {
        let (populated, _) = initialized().await;
        populated
            .add_package(
                &package("1.0"),
                &strings(&["xenial"]),
                &strings(&["main"]),
                false,
                0,
            )
            .await
            .unwrap();
        let backup = populated.export().await.unwrap();
        let json = serde_json::to_string(&backup).unwrap();
        let parsed: Backup = serde_json::from_str(&json).unwrap();

        // restore into an empty catalog reproduces an identical view
        let (fresh, _) = catalog();
        fresh.store().create_domain().await.unwrap();
        fresh.restore(&parsed).await.unwrap();
        let view = fresh.query(&Filter::default(), 0).await.unwrap();
        assert_eq!(view, backup.packages);
        assert_eq!(fresh.meta().await.unwrap(), populated.meta().await.unwrap());
    }

    #[tokio::test]
    async fn test_notifications_gated_by_topic() {
        let (catalog, notifier) = catalog();
        catalog
            .initialize(MetaPatch {
                dists: strings(&["xenial"]),
                comps: strings(&["main"]),
                archs: strings(&["amd64"]),
                ..MetaPatch::default()
            })
            .await
            .unwrap();
        // no topic configured: nothing is published
        assert!(notifier.events().is_empty());

        catalog
            .add_package(&package("1.0"), &strings(&["xenial"]), &strings(&["main"]), false, 0)
            .await
            .unwrap();
        assert!(notifier.events().is_empty());
    }
}
