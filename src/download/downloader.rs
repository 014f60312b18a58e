//! Version-set resolution and per-version download orchestration

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cache::layout::{extraction_path, metadata_path, timestamped_metadata_path};
use crate::package::{PackageIdentifier, VersionRequest};
use crate::version::error::DownloadError;
use crate::version::factory::RegistryManagerFactory;
use crate::version::registry::{RegistryContext, RegistryManager};

/// Outcome of [`PackageDownloader::clear_package_local_copy_if_no_caching`]
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Paths that were deleted
    pub removed: Vec<PathBuf>,
    /// Paths that could not be deleted, with the reason
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl CleanupReport {
    /// True when nothing was left behind
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads one package family (same ecosystem, namespace and name) into a
/// destination directory.
///
/// The version set is resolved once, at construction:
/// * exact version: just that version
/// * no version: the newest enumerated version, or nothing
/// * `*`: every enumerated version, oldest first
pub struct PackageDownloader {
    manager: Arc<dyn RegistryManager>,
    identifier: PackageIdentifier,
    destination: PathBuf,
    do_cache: bool,
    versions: Vec<String>,
    downloaded: Vec<PathBuf>,
}

impl PackageDownloader {
    /// Looks up the manager for the identifier's ecosystem and resolves versions
    pub async fn new(
        identifier: PackageIdentifier,
        destination: impl AsRef<Path>,
        use_cache: bool,
        ctx: &RegistryContext,
    ) -> Result<Self, DownloadError> {
        let destination = destination.as_ref();
        let manager = RegistryManagerFactory::create(&identifier.ecosystem, ctx, destination)?;
        Self::with_manager(manager, identifier, destination, use_cache).await
    }

    /// Like [`PackageDownloader::new`] with an explicit registry manager
    pub async fn with_manager(
        manager: Arc<dyn RegistryManager>,
        identifier: PackageIdentifier,
        destination: impl AsRef<Path>,
        use_cache: bool,
    ) -> Result<Self, DownloadError> {
        let destination = destination.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&destination).await?;

        let versions = match identifier.version_request() {
            VersionRequest::Exact(version) => vec![version.to_string()],
            VersionRequest::Latest => {
                let versions = manager.enumerate_versions(&identifier, use_cache).await?;
                match versions.last() {
                    Some(latest) => {
                        debug!("Resolved latest version of {}: {}", identifier, latest);
                        vec![latest.clone()]
                    }
                    None => {
                        warn!("No versions found for {}", identifier);
                        Vec::new()
                    }
                }
            }
            VersionRequest::All => {
                let versions = manager.enumerate_versions(&identifier, use_cache).await?;
                if versions.is_empty() {
                    warn!("No versions found for {}", identifier);
                }
                versions
            }
        };

        Ok(Self {
            manager,
            identifier,
            destination,
            do_cache: use_cache,
            versions,
            downloaded: Vec::new(),
        })
    }

    /// Resolved version set, in download order
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Whether downloads are reused and kept, as requested at construction
    pub fn is_caching(&self) -> bool {
        self.do_cache
    }

    /// Directory every download is written under
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Downloads every resolved version, returning local paths in version order
    pub async fn download_package_local_copy(
        &mut self,
        metadata_only: bool,
        do_extract: bool,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        let cached = self.do_cache;
        let mut paths = Vec::new();
        for version in self.versions.clone() {
            let produced = self
                .download_one(&version, metadata_only, do_extract, cached)
                .await?;
            paths.extend(produced);
        }
        Ok(paths)
    }

    /// Downloads one version, returning the existing target without any
    /// network call when `cached` and it is already present
    pub async fn download_one(
        &mut self,
        version: &str,
        metadata_only: bool,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        let id = self.identifier.with_version(version);

        let target = if metadata_only {
            metadata_path(&self.destination, &id)
        } else {
            extraction_path(&self.destination, &id)
        };
        if cached && target.exists() {
            debug!("Cache hit for {}: {:?}", id, target);
            return Ok(vec![target]);
        }

        let paths = self.download(&id, metadata_only, do_extract, cached).await?;
        self.downloaded.extend(paths.iter().cloned());
        Ok(paths)
    }

    async fn download(
        &self,
        id: &PackageIdentifier,
        metadata_only: bool,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        if !metadata_only {
            return Ok(self.manager.download_version(id, do_extract, cached).await?);
        }

        let Some(metadata) = self.manager.get_metadata(id, cached).await else {
            warn!("No metadata available for {}", id);
            return Ok(Vec::new());
        };

        let path = if cached {
            let path = metadata_path(&self.destination, id);
            tokio::fs::write(&path, metadata).await?;
            path
        } else {
            self.write_new_metadata(id, &metadata).await?
        };
        info!("Wrote metadata for {} to {:?}", id, path);
        Ok(vec![path])
    }

    /// Writes metadata to a file that did not exist before, falling back to
    /// timestamped names when the plain one is taken
    async fn write_new_metadata(
        &self,
        id: &PackageIdentifier,
        metadata: &str,
    ) -> Result<PathBuf, DownloadError> {
        let timestamp = Utc::now();
        let mut candidate = metadata_path(&self.destination, id);
        let mut sequence = 0;
        loop {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await;
            match created {
                Ok(mut file) => {
                    file.write_all(metadata.as_bytes()).await?;
                    file.flush().await?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Metadata file taken: {:?}", candidate);
                    candidate =
                        timestamped_metadata_path(&self.destination, id, timestamp, sequence);
                    sequence += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Deletes everything this downloader produced, unless caching was requested.
    ///
    /// Failures are logged and collected into the report, never raised.
    pub fn clear_package_local_copy_if_no_caching(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.do_cache {
            return report;
        }

        for path in self.downloaded.drain(..) {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {:?}: {}", path, e);
                    report.failed.push((path, e));
                }
            }
        }
        report
    }
}
