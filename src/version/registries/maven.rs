//! Maven repository layout implementation (Maven Central by default)

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_namespace, require_version, store_artifact,
    versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

static VERSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<version>\s*([^<\s]+)\s*</version>").expect("static regex is valid")
});

/// Registry manager for Maven repositories; the namespace is the groupId
pub struct MavenRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl MavenRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.maven.clone(),
            destination: destination.to_path_buf(),
        }
    }

    /// `org.apache.commons` + `commons-lang3` -> `{base}/org/apache/commons/commons-lang3`
    fn artifact_base(&self, group_id: &str, artifact_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            group_id.replace('.', "/"),
            artifact_id
        )
    }

    fn metadata_url(&self, group_id: &str, artifact_id: &str) -> String {
        format!(
            "{}/maven-metadata.xml",
            self.artifact_base(group_id, artifact_id)
        )
    }

    fn file_url(&self, group_id: &str, artifact_id: &str, version: &str, ext: &str) -> String {
        format!(
            "{}/{}/{}-{}.{}",
            self.artifact_base(group_id, artifact_id),
            version,
            artifact_id,
            version,
            ext
        )
    }
}

/// Every `<version>` listed in a `maven-metadata.xml` document
fn parse_metadata_versions(xml: &str) -> Vec<String> {
    VERSION_TAG
        .captures_iter(xml)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[async_trait::async_trait]
impl RegistryManager for MavenRegistry {
    fn ecosystem(&self) -> &'static str {
        "maven"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let Some(group_id) = require_namespace(id, "list versions of") else {
            return Ok(Vec::new());
        };

        let result = self
            .http
            .get_text(&self.metadata_url(group_id, &id.name), use_cache)
            .await
            .map(|xml| parse_metadata_versions(&xml));

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        let Some(group_id) = id.namespace() else {
            return false;
        };
        // maven-metadata.xml is XML, so the JSON probe doesn't apply
        self.http
            .get_text(&self.metadata_url(group_id, &id.name), use_cache)
            .await
            .is_ok()
    }

    /// The version's POM, or `maven-metadata.xml` when no version is given
    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let group_id = require_namespace(id, "fetch metadata of")?;
        let url = match id.version() {
            Some(version) => self.file_url(group_id, &id.name, version, "pom"),
            None => self.metadata_url(group_id, &id.name),
        };
        self.http.get_text_opt(&url, use_cache).await
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(group_id) = require_namespace(id, "download") else {
            return Ok(Vec::new());
        };
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if let Some(path) = cached_download(&self.destination, id, ".jar", do_extract, cached) {
            return Ok(vec![path]);
        }

        let url = self.file_url(group_id, &id.name, version, "jar");
        let result = async {
            let bytes = self.http.get_bytes(&url).await?;
            store_artifact(&self.destination, id, bytes, ".jar", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let group_id = id.namespace()?;
        let mut url = format!(
            "https://central.sonatype.com/artifact/{}/{}",
            group_id, id.name
        );
        if let Some(version) = id.version() {
            url.push('/');
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
