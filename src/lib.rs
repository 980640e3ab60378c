pub mod catalog;
pub mod config;
pub mod copy;
pub mod error;
pub mod group;
pub mod item;
pub mod publish;
pub mod query;
pub mod sign;
pub mod store;

pub use catalog::{Backup, BatchReport, Catalog, PackageDesc, SourceDesc};
pub use config::{MetaAction, MetaPatch, RepoMeta};
pub use copy::CopySpec;
pub use error::{Error, Result};
pub use group::GroupedView;
pub use item::{CatalogItem, Payload};
pub use publish::{Publisher, PublishReport};
pub use query::{Filter, Query};
pub use sign::{PassphraseSource, ReleaseSigner};
pub use store::{AttrMap, AttributeStore, Event, Notifier, ObjectStore};
