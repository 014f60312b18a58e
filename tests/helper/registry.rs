//! Registry test utilities

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Url;

use pkg_fetch::cache::layout::{archive_path, extraction_path, target_name};
use pkg_fetch::extract::extract_archive;
use pkg_fetch::package::{PackageIdentifier, VersionRequest};
use pkg_fetch::version::error::RegistryError;
use pkg_fetch::version::registry::RegistryManager;

/// In-process registry manager that serves one canned archive for every
/// version and counts how often it is asked to download
pub struct FakeRegistryManager {
    versions: Vec<String>,
    archive: Vec<u8>,
    destination: PathBuf,
    downloads: Arc<AtomicUsize>,
}

impl FakeRegistryManager {
    pub fn new(destination: &Path, archive: Vec<u8>) -> Self {
        Self {
            versions: Vec::new(),
            archive,
            destination: destination.to_path_buf(),
            downloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Handle on the download counter that outlives the manager
    pub fn download_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.downloads)
    }
}

#[async_trait]
impl RegistryManager for FakeRegistryManager {
    fn ecosystem(&self) -> &'static str {
        "fake"
    }

    async fn enumerate_versions(
        &self,
        _id: &PackageIdentifier,
        _use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        Ok(self.versions.clone())
    }

    async fn package_exists(&self, _id: &PackageIdentifier, _use_cache: bool) -> bool {
        !self.versions.is_empty()
    }

    async fn get_metadata(&self, id: &PackageIdentifier, _use_cache: bool) -> Option<String> {
        Some(format!(r#"{{"name": "{}"}}"#, id.name))
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        if !matches!(id.version_request(), VersionRequest::Exact(_)) {
            return Ok(Vec::new());
        }

        let target = if do_extract {
            extraction_path(&self.destination, id)
        } else {
            archive_path(&self.destination, id, ".tgz")
        };
        if cached && target.exists() {
            return Ok(vec![target]);
        }

        self.downloads.fetch_add(1, Ordering::SeqCst);
        if do_extract {
            let path = extract_archive(&self.destination, &target_name(id), &self.archive, cached)?;
            Ok(vec![path])
        } else {
            std::fs::write(&target, &self.archive)?;
            Ok(vec![target])
        }
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        Url::parse(&format!("https://fake.test/{}", id.full_name())).ok()
    }
}
