//! Backend capabilities: the attribute store holding the catalog, the
//! object store holding artifact payloads and published index files, and
//! the fire-and-forget notification sink. The engine takes these as
//! trait objects so tests can substitute the in-memory implementations
//! shipped here.

use crate::error::{Error, Result};
use crate::query::Query;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A multi-valued attribute map: one stored item.
pub type AttrMap = BTreeMap<String, Vec<String>>;

/// A notification event. Mirrors what the operations emit: `action` is
/// `add`/`delete`/`copy`, `kind` is what was acted on (`package`, `source`,
/// `dists`, …), plus placement details where they apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// What happened.
    pub action: String,
    /// What kind of thing it happened to.
    #[serde(rename = "type")]
    pub kind: String,
    /// Name of the affected thing.
    pub name: String,
    /// Identity of the caller performing the operation.
    pub caller: String,
    /// Package version, for package events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Destination distribution, for package events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    /// Destination component, for package events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Source distribution, for copy events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_distribution: Option<String>,
    /// Source component, for copy events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_component: Option<String>,
}

impl Event {
    /// Create an event with the required fields.
    pub fn new<S: Into<String>>(action: S, kind: S, name: S, caller: S) -> Self {
        Self {
            action: action.into(),
            kind: kind.into(),
            name: name.into(),
            caller: caller.into(),
            version: None,
            distribution: None,
            component: None,
            src_distribution: None,
            src_component: None,
        }
    }

    /// Attach a package version.
    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Attach the destination placement.
    pub fn placement<S: Into<String>>(mut self, dist: S, comp: S) -> Self {
        self.distribution = Some(dist.into());
        self.component = Some(comp.into());
        self
    }

    /// Attach the source placement of a copy.
    pub fn source_placement<S: Into<String>>(mut self, dist: S, comp: S) -> Self {
        self.src_distribution = Some(dist.into());
        self.src_component = Some(comp.into());
        self
    }
}

/// The remote multi-valued attribute database holding the catalog.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Fetch one item, or `None` when it does not exist.
    async fn get(&self, key: &str) -> Result<Option<AttrMap>>;

    /// Write attributes of one item. With `replace`, existing values of
    /// each named attribute are replaced; otherwise values accumulate.
    async fn put(&self, key: &str, attrs: &AttrMap, replace: bool) -> Result<()>;

    /// Delete the given attribute values of one item. An item that ends up
    /// with no attributes is gone.
    async fn delete(&self, key: &str, attrs: &AttrMap) -> Result<()>;

    /// Run a select query. The returned sequence is finite, forward-only
    /// and restartable from the start; pagination stays behind the trait.
    async fn select(&self, query: &Query) -> Result<Vec<AttrMap>>;

    /// Whether the backing domain has been created.
    async fn domain_exists(&self) -> Result<bool>;

    /// Create the backing domain. Creating an existing domain is a no-op.
    async fn create_domain(&self) -> Result<()>;
}

/// The remote path-addressed blob store holding artifacts and the
/// published repository tree.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write one object, overwriting whatever is at the path.
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Server-side copy. Fails with [`Error::ArtifactExists`] when the
    /// destination exists and `overwrite` is false, and with
    /// [`Error::ArtifactMissing`] when the source does not exist.
    async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<()>;

    /// Whether an object exists at the path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// The notification sink. Best-effort: implementations log and swallow
/// their own failures, which must never fail the originating mutation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: &Event);
}

/// In-memory attribute store, used by tests and embeddings.
#[derive(Debug, Default)]
pub struct MemoryAttributeStore {
    domain: Mutex<Option<BTreeMap<String, AttrMap>>>,
}

impl MemoryAttributeStore {
    /// An empty store with no domain yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose domain already exists.
    pub fn with_domain() -> Self {
        Self {
            domain: Mutex::new(Some(BTreeMap::new())),
        }
    }

    fn items(&self) -> std::sync::MutexGuard<'_, Option<BTreeMap<String, AttrMap>>> {
        self.domain.lock().expect("attribute store lock poisoned")
    }
}

#[async_trait]
impl AttributeStore for MemoryAttributeStore {
    async fn get(&self, key: &str) -> Result<Option<AttrMap>> {
        let items = self.items();
        let domain = items.as_ref().ok_or_else(no_domain)?;
        Ok(domain.get(key).cloned())
    }

    async fn put(&self, key: &str, attrs: &AttrMap, replace: bool) -> Result<()> {
        let mut items = self.items();
        let domain = items.as_mut().ok_or_else(no_domain)?;
        let entry = domain.entry(key.to_string()).or_default();
        for (name, values) in attrs {
            if replace {
                entry.insert(name.clone(), values.clone());
            } else {
                entry.entry(name.clone()).or_default().extend(values.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str, attrs: &AttrMap) -> Result<()> {
        let mut items = self.items();
        let domain = items.as_mut().ok_or_else(no_domain)?;
        if let Some(entry) = domain.get_mut(key) {
            for (name, values) in attrs {
                if let Some(existing) = entry.get_mut(name) {
                    existing.retain(|value| !values.contains(value));
                    if existing.is_empty() {
                        entry.remove(name);
                    }
                }
            }
            if entry.is_empty() {
                domain.remove(key);
            }
        }
        Ok(())
    }

    async fn select(&self, query: &Query) -> Result<Vec<AttrMap>> {
        let items = self.items();
        let domain = items.as_ref().ok_or_else(no_domain)?;
        Ok(domain
            .values()
            .filter(|attrs| query.matches(attrs))
            .cloned()
            .collect())
    }

    async fn domain_exists(&self) -> Result<bool> {
        Ok(self.items().is_some())
    }

    async fn create_domain(&self) -> Result<()> {
        let mut items = self.items();
        if items.is_none() {
            *items = Some(BTreeMap::new());
        }
        Ok(())
    }
}

fn no_domain() -> Error {
    Error::backend("domain does not exist")
}

/// In-memory object store, used by tests and embeddings.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the content of one object.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("object store lock poisoned")
            .get(path)
            .map(|(data, _)| data.clone())
    }

    /// Fetch the content type of one object.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .lock()
            .expect("object store lock poisoned")
            .get(path)
            .map(|(_, content_type)| content_type.clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("object store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.objects
            .lock()
            .expect("object store lock poisoned")
            .insert(path.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let mut objects = self.objects.lock().expect("object store lock poisoned");
        if !overwrite && objects.contains_key(dst) {
            return Err(Error::ArtifactExists(dst.to_string()));
        }
        let object = objects
            .get(src)
            .cloned()
            .ok_or_else(|| Error::ArtifactMissing(src.to_string()))?;
        objects.insert(dst.to_string(), object);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .expect("object store lock poisoned")
            .contains_key(path))
    }
}

/// A notifier that records events, used by tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<Event>>,
}

impl MemoryNotifier {
    /// An empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, event: &Event) {
        self.events
            .lock()
            .expect("notifier lock poisoned")
            .push(event.clone());
    }
}

/// A notifier that only logs events.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(json) => log::info!("notification: {}", json),
            Err(err) => log::warn!("could not serialize notification: {}", err),
        }
    }
}
