//! PyPI registry client for Python distributions

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::cache::layout::safe_file_name;
use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    Artifact, artifact_suffix, cached_archive, cached_extraction, paths_or_empty,
    require_version, store_artifacts, versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// PyPI JSON API response for a project
#[derive(Debug, Deserialize)]
struct PypiProject {
    #[serde(default)]
    releases: HashMap<String, serde_json::Value>,
}

/// PyPI JSON API response for a single release
#[derive(Debug, Deserialize)]
struct PypiRelease {
    #[serde(default)]
    urls: Vec<PypiFile>,
}

/// One distribution file (sdist or wheel) of a release
#[derive(Debug, Deserialize)]
struct PypiFile {
    url: String,
    filename: String,
}

/// PyPI registry client
pub struct PypiRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl PypiRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.pypi.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, name)
    }

    fn release_url(&self, name: &str, version: &str) -> String {
        format!("{}/pypi/{}/{}/json", self.base_url, name, version)
    }

    /// Lists the files of a release with filesystem-safe names
    async fn release_files(
        &self,
        id: &PackageIdentifier,
        version: &str,
        use_cache: bool,
    ) -> Result<Vec<PypiFile>, RegistryError> {
        let release: PypiRelease = self
            .http
            .get_json_as(&self.release_url(&id.name, version), use_cache)
            .await?;
        if release.urls.is_empty() {
            return Err(RegistryError::NotFound(format!(
                "files of {} {}",
                id.name, version
            )));
        }

        debug!("PyPI release {} {} has {} files", id.name, version, release.urls.len());
        Ok(release
            .urls
            .into_iter()
            .map(|file| PypiFile {
                filename: safe_file_name(&file.filename),
                url: file.url,
            })
            .collect())
    }

    async fn fetch_files(&self, files: Vec<PypiFile>) -> Result<Vec<Artifact>, RegistryError> {
        try_join_all(files.into_iter().map(|file| async move {
            let bytes = self.http.get_bytes(&file.url).await?;
            Ok::<_, RegistryError>(Artifact {
                file_name: file.filename,
                bytes,
            })
        }))
        .await
    }
}

#[async_trait::async_trait]
impl RegistryManager for PypiRegistry {
    fn ecosystem(&self) -> &'static str {
        "pypi"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<PypiProject>(&self.project_url(&id.name), use_cache)
            .await
            .map(|project| project.releases.into_keys().collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.project_url(&id.name), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http
            .get_text_opt(&self.project_url(&id.name), use_cache)
            .await
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if do_extract && let Some(path) = cached_extraction(&self.destination, id, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let files = self.release_files(id, version, cached).await?;
            if !do_extract {
                let stored: Option<Vec<PathBuf>> = files
                    .iter()
                    .map(|file| {
                        let suffix = artifact_suffix(&file.filename);
                        cached_archive(&self.destination, id, &suffix, cached)
                    })
                    .collect();
                if let Some(paths) = stored {
                    return Ok(paths);
                }
            }

            let artifacts = self.fetch_files(files).await?;
            store_artifacts(&self.destination, id, artifacts, do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let url = match id.version() {
            Some(version) => format!("https://pypi.org/project/{}/{}/", id.name, version),
            None => format!("https://pypi.org/project/{}/", id.name),
        };
        Url::parse(&url).ok()
    }
}
