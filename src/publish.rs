//! The publish pipeline: assemble the index files for a set of
//! distributions, sign the top-level Release texts, and fan the artifacts
//! out to the object store with a bounded worker pool.
//!
//! Writes are idempotent overwrites with no ordering dependencies, so
//! partial completion is safe and republishing is the recovery mechanism;
//! nothing is rolled back.

use crate::catalog::{check_dists, Catalog};
use crate::error::Result;
use crate::group::GroupedView;
use crate::item::{CatalogItem, Payload, ALL_ARCH, SOURCE_ARCH};
use crate::query::Filter;
use crate::sign::ReleaseSigner;
use crate::store::ObjectStore;
use apt_repository::{
    BinaryPackage, Compression, PackagesFile, ReleaseFile, SectionRelease, SourcePackage,
    SourcesFile,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::sync::Arc;

/// One artifact to upload: a relative path and its content.
struct Artifact {
    path: String,
    data: Vec<u8>,
    content_type: &'static str,
}

/// The outcome of one publish run: per-path success, in completion order.
#[derive(Debug)]
pub struct PublishReport {
    /// (path, written) for every artifact.
    pub results: Vec<(String, bool)>,
    /// Whether the Release files were signed.
    pub signed: bool,
}

impl PublishReport {
    /// Paths that failed to write.
    pub fn failed_paths(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Whether every artifact was written.
    pub fn is_ok(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }
}

/// Publishes the repository index to the object store.
pub struct Publisher {
    objects: Arc<dyn ObjectStore>,
    signer: Option<ReleaseSigner>,
    date: Option<DateTime<Utc>>,
    parallelism: Option<usize>,
}

impl Publisher {
    /// Create a publisher writing to the given object store.
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            objects,
            signer: None,
            date: None,
            parallelism: None,
        }
    }

    /// Sign top-level Release files with the given signer.
    pub fn with_signer(mut self, signer: ReleaseSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Inject the Release date instead of using the current time.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Bound the upload worker pool. Defaults to one worker per artifact.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Publish the given distributions, or every configured distribution
    /// when the list is empty. Returns per-path results; the publish
    /// succeeded only if every write did.
    pub async fn publish(&self, catalog: &Catalog, dists: &[String]) -> Result<PublishReport> {
        let meta = catalog.meta().await?;
        let dists: Vec<String> = if dists.is_empty() {
            meta.dists.iter().cloned().collect()
        } else {
            check_dists(&meta, dists)?;
            dists.to_vec()
        };
        let comps: Vec<String> = meta.comps.iter().cloned().collect();
        let binary_archs = meta.binary_archs();
        let release_archs: Vec<String> = meta
            .effective_archs()
            .into_iter()
            .filter(|arch| arch != ALL_ARCH)
            .collect();

        let mut binary_filter_archs = binary_archs.clone();
        binary_filter_archs.push(ALL_ARCH.to_string());
        let binaries = catalog
            .query_with_meta(
                &meta,
                &Filter {
                    dists: dists.clone(),
                    comps: comps.clone(),
                    archs: binary_filter_archs,
                    ..Filter::default()
                },
                0,
            )
            .await?;
        let sources = catalog
            .query_with_meta(
                &meta,
                &Filter {
                    dists: dists.clone(),
                    comps: comps.clone(),
                    archs: vec![SOURCE_ARCH.to_string()],
                    ..Filter::default()
                },
                0,
            )
            .await?;

        let signer = self.signer.as_ref().filter(|signer| !signer.is_empty());
        if signer.is_none() {
            warn!("no signing keys configured; publishing an unsigned repository");
        }
        let date = self.date.unwrap_or_else(Utc::now);

        let mut artifacts = Vec::new();
        for dist in &dists {
            let mut release = ReleaseFile::new(meta.origin(), meta.label(), dist.as_str(), date)
                .with_components(comps.clone())
                .with_architectures(release_archs.clone());

            // (comp, arch) -> (text, gzipped); arch "source" holds Sources
            let mut section_texts = Vec::new();
            for comp in &comps {
                let sources_text = render_sources(&sources, dist, comp);
                let sources_gz = Compression::Gzip.compress(sources_text.as_bytes())?;
                release.add_file(
                    format!("{}/source/Sources", comp),
                    sources_text.as_bytes(),
                );
                release.add_file(format!("{}/source/Sources.gz", comp), &sources_gz);
                section_texts.push((comp, SOURCE_ARCH.to_string(), sources_text, sources_gz));

                for arch in &binary_archs {
                    let packages_text = render_packages(&binaries, dist, comp, arch);
                    let packages_gz = Compression::Gzip.compress(packages_text.as_bytes())?;
                    release.add_file(
                        format!("{}/binary-{}/Packages", comp, arch),
                        packages_text.as_bytes(),
                    );
                    release.add_file(format!("{}/binary-{}/Packages.gz", comp, arch), &packages_gz);
                    section_texts.push((comp, arch.clone(), packages_text, packages_gz));
                }
            }

            let release_text = release.to_string();
            artifacts.push(Artifact {
                path: format!("dists/{}/Release", dist),
                data: release_text.clone().into_bytes(),
                content_type: Compression::None.content_type(),
            });
            if let Some(signer) = signer {
                let signature = signer.sign(&release_text)?;
                artifacts.push(Artifact {
                    path: format!("dists/{}/Release.gpg", dist),
                    data: signature.into_bytes(),
                    content_type: Compression::None.content_type(),
                });
            }

            for (comp, arch, text, gz) in section_texts {
                let section_dir = if arch == SOURCE_ARCH {
                    format!("dists/{}/{}/source", dist, comp)
                } else {
                    format!("dists/{}/{}/binary-{}", dist, comp, arch)
                };
                let basename = if arch == SOURCE_ARCH { "Sources" } else { "Packages" };
                artifacts.push(Artifact {
                    path: format!("{}/{}", section_dir, basename),
                    data: text.into_bytes(),
                    content_type: Compression::None.content_type(),
                });
                artifacts.push(Artifact {
                    path: format!("{}/{}.gz", section_dir, basename),
                    data: gz,
                    content_type: Compression::Gzip.content_type(),
                });
                let section = SectionRelease {
                    archive: dist.clone(),
                    component: comp.clone(),
                    origin: meta.origin().to_string(),
                    label: meta.label().to_string(),
                    architecture: arch,
                };
                artifacts.push(Artifact {
                    path: format!("{}/Release", section_dir),
                    data: section.to_string().into_bytes(),
                    content_type: Compression::None.content_type(),
                });
            }
        }

        let limit = self.parallelism.unwrap_or(artifacts.len()).max(1);
        let objects = self.objects.clone();
        let results: Vec<(String, bool)> = stream::iter(artifacts)
            .map(|artifact| {
                let objects = objects.clone();
                async move {
                    info!("writing {}", artifact.path);
                    match objects
                        .put(&artifact.path, &artifact.data, artifact.content_type)
                        .await
                    {
                        Ok(()) => (artifact.path, true),
                        Err(err) => {
                            error!("did not successfully write {}: {}", artifact.path, err);
                            (artifact.path, false)
                        }
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let report = PublishReport {
            results,
            signed: signer.is_some(),
        };
        if report.is_ok() {
            info!("successfully published repository for dists {:?}", dists);
        }
        Ok(report)
    }
}

/// Render the Packages text for one (dist, comp, arch) section. Packages
/// under the `all` architecture are appended into every concrete binary
/// architecture's file; `all` never gets a section of its own.
fn render_packages(binaries: &GroupedView, dist: &str, comp: &str, arch: &str) -> String {
    let mut file = PackagesFile::new(dist);
    for name in binaries.names() {
        for leaf_arch in [arch, ALL_ARCH] {
            if let Some(leaf) = binaries.leaf(name, dist, comp, leaf_arch) {
                for item in leaf {
                    if let Some(package) = binary_package(item) {
                        file.push(&package);
                    }
                }
            }
        }
    }
    file.into_text()
}

/// Render the Sources text for one (dist, comp).
fn render_sources(sources: &GroupedView, dist: &str, comp: &str) -> String {
    let mut file = SourcesFile::new(dist);
    for name in sources.names() {
        if let Some(leaf) = sources.leaf(name, dist, comp, SOURCE_ARCH) {
            for item in leaf {
                if let Some(source) = source_package(item) {
                    file.push(&source);
                }
            }
        }
    }
    file.into_text()
}

fn binary_package(item: &CatalogItem) -> Option<BinaryPackage> {
    match &item.payload {
        Payload::Binary {
            filename,
            md5,
            sha1,
            sha256,
            size,
        } => Some(BinaryPackage {
            name: item.name.clone(),
            filename: filename.clone(),
            md5: md5.clone(),
            sha1: sha1.clone(),
            sha256: sha256.clone(),
            size: *size,
            control: item.control.clone(),
        }),
        Payload::Source { .. } => {
            warn!("source payload in a binary listing: {}", item.name);
            None
        }
    }
}

fn source_package(item: &CatalogItem) -> Option<SourcePackage> {
    match &item.payload {
        Payload::Source { .. } => Some(SourcePackage {
            name: item.name.clone(),
            control: item.control.clone(),
        }),
        Payload::Binary { .. } => {
            warn!("binary payload in a source listing: {}", item.name);
            None
        }
    }
}
