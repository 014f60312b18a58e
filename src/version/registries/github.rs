//! GitHub repository tags as package versions

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_namespace, require_version, store_artifact,
    versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// Tags listed per request; GitHub's maximum page size
const TAGS_PER_PAGE: u32 = 100;

/// Response item from the GitHub tags API
#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Registry manager for GitHub repositories; the namespace is the owner
pub struct GitHubRegistry {
    http: HttpFetcher,
    api_url: String,
    web_url: String,
    destination: PathBuf,
}

impl GitHubRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            api_url: ctx.endpoints.github_api.clone(),
            web_url: ctx.endpoints.github.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, owner, repo)
    }
}

#[async_trait::async_trait]
impl RegistryManager for GitHubRegistry {
    fn ecosystem(&self) -> &'static str {
        "github"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let Some(owner) = require_namespace(id, "list versions of") else {
            return Ok(Vec::new());
        };

        let url = format!(
            "{}/tags?per_page={}",
            self.repo_url(owner, &id.name),
            TAGS_PER_PAGE
        );
        let result = self
            .http
            .get_json_as::<Vec<Tag>>(&url, use_cache)
            .await
            .map(|tags| tags.into_iter().map(|t| t.name).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        match id.namespace() {
            Some(owner) => {
                self.http
                    .exists(&self.repo_url(owner, &id.name), use_cache)
                    .await
            }
            None => false,
        }
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let owner = require_namespace(id, "fetch metadata of")?;
        self.http
            .get_text_opt(&self.repo_url(owner, &id.name), use_cache)
            .await
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(owner) = require_namespace(id, "download") else {
            return Ok(Vec::new());
        };
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if let Some(path) = cached_download(&self.destination, id, ".zip", do_extract, cached) {
            return Ok(vec![path]);
        }

        let url = format!("{}/{}/{}/archive/{}.zip", self.web_url, owner, id.name, version);
        let result = async {
            let bytes = self.http.get_bytes(&url).await?;
            store_artifact(&self.destination, id, bytes, ".zip", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let owner = id.namespace()?;
        let mut url = format!("https://github.com/{}/{}", owner, id.name);
        if let Some(version) = id.version() {
            url.push_str("/tree/");
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
