//! Registry manager implementations, one per ecosystem

pub mod cargo;
pub mod composer;
pub mod cpan;
pub mod cran;
pub mod gem;
pub mod github;
pub mod golang;
pub mod hackage;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod pypi;
pub mod vsm;

pub use cargo::CargoRegistry;
pub use composer::ComposerRegistry;
pub use cpan::CpanRegistry;
pub use cran::CranRegistry;
pub use gem::GemRegistry;
pub use github::GitHubRegistry;
pub use golang::GoProxyRegistry;
pub use hackage::HackageRegistry;
pub use maven::MavenRegistry;
pub use npm::NpmRegistry;
pub use nuget::NuGetRegistry;
pub use pypi::PypiRegistry;
pub use vsm::VsMarketplaceRegistry;

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::cache::layout::{archive_path, extraction_path, target_name};
use crate::extract::extract_archives;
use crate::package::{PackageIdentifier, VersionRequest};
use crate::version::error::RegistryError;
use crate::version::ordering::sort_versions;

/// Sorts a version listing, turning "package not found" into an empty list
pub(crate) fn versions_or_empty(
    id: &PackageIdentifier,
    result: Result<Vec<String>, RegistryError>,
) -> Result<Vec<String>, RegistryError> {
    match result {
        Ok(versions) => Ok(sort_versions(versions)),
        Err(RegistryError::NotFound(_)) => {
            info!("Package not found: {}", id);
            Ok(Vec::new())
        }
        Err(e) => {
            error!("Failed to enumerate versions for {}: {}", id, e);
            Err(e)
        }
    }
}

/// Turns a missing artifact into an empty download result
pub(crate) fn paths_or_empty(
    id: &PackageIdentifier,
    result: Result<Vec<PathBuf>, RegistryError>,
) -> Result<Vec<PathBuf>, RegistryError> {
    match result {
        Err(RegistryError::NotFound(what)) => {
            warn!("Unable to download {}: {} not found", id, what);
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Returns the namespace, logging when an ecosystem that needs one lacks it
pub(crate) fn require_namespace<'a>(id: &'a PackageIdentifier, operation: &str) -> Option<&'a str> {
    let namespace = id.namespace();
    if namespace.is_none() {
        warn!("Unable to {} {}: a namespace is required", operation, id);
    }
    namespace
}

/// Returns the exact version to download, logging when there isn't one
pub(crate) fn require_version(id: &PackageIdentifier) -> Option<&str> {
    match id.version_request() {
        VersionRequest::Exact(version) => Some(version),
        _ => {
            warn!("Unable to download {}: an exact version is required", id);
            None
        }
    }
}

/// The existing extraction directory when caching is requested and it is present
pub(crate) fn cached_extraction(
    destination: &Path,
    id: &PackageIdentifier,
    cached: bool,
) -> Option<PathBuf> {
    let path = extraction_path(destination, id);
    (cached && path.is_dir()).then_some(path)
}

/// The existing `<target><extension>` file when caching is requested and it is present
pub(crate) fn cached_archive(
    destination: &Path,
    id: &PackageIdentifier,
    extension: &str,
    cached: bool,
) -> Option<PathBuf> {
    let path = archive_path(destination, id, extension);
    (cached && path.is_file()).then_some(path)
}

/// Cache hit for a download in either form, checked before any network call
pub(crate) fn cached_download(
    destination: &Path,
    id: &PackageIdentifier,
    extension: &str,
    do_extract: bool,
    cached: bool,
) -> Option<PathBuf> {
    if do_extract {
        cached_extraction(destination, id, cached)
    } else {
        cached_archive(destination, id, extension, cached)
    }
}

/// Suffix a non-extracted file of a multi-file release is stored under
pub(crate) fn artifact_suffix(file_name: &str) -> String {
    format!("-{}", file_name)
}

/// One downloaded file belonging to a package version
pub(crate) struct Artifact {
    /// Filesystem-safe file name, used to keep multi-file releases apart
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Saves a single downloaded archive, extracted or as `<target><extension>`
pub(crate) async fn store_artifact(
    destination: &Path,
    id: &PackageIdentifier,
    bytes: Vec<u8>,
    extension: &str,
    do_extract: bool,
    cached: bool,
) -> Result<Vec<PathBuf>, RegistryError> {
    if do_extract {
        let artifact = Artifact {
            file_name: String::new(),
            bytes,
        };
        let path = extract_in_background(destination, id, vec![artifact], cached).await?;
        return Ok(vec![path]);
    }

    let path = write_archive(destination, id, &bytes, extension, cached).await?;
    Ok(vec![path])
}

/// Saves every file of a multi-file release.
///
/// Extracted, all files share the version's extraction directory, each in a
/// subdirectory named after the file. Otherwise each file is written as
/// `<target>-<file name>`.
pub(crate) async fn store_artifacts(
    destination: &Path,
    id: &PackageIdentifier,
    artifacts: Vec<Artifact>,
    do_extract: bool,
    cached: bool,
) -> Result<Vec<PathBuf>, RegistryError> {
    if do_extract {
        let path = extract_in_background(destination, id, artifacts, cached).await?;
        return Ok(vec![path]);
    }

    let mut paths = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let extension = artifact_suffix(&artifact.file_name);
        paths.push(write_archive(destination, id, &artifact.bytes, &extension, cached).await?);
    }
    Ok(paths)
}

async fn write_archive(
    destination: &Path,
    id: &PackageIdentifier,
    bytes: &[u8],
    extension: &str,
    cached: bool,
) -> Result<PathBuf, RegistryError> {
    let path = archive_path(destination, id, extension);
    if cached && path.is_file() {
        return Ok(path);
    }
    tokio::fs::create_dir_all(destination).await?;
    tokio::fs::write(&path, bytes).await?;
    info!("Saved {} to {:?}", id, path);
    Ok(path)
}

async fn extract_in_background(
    destination: &Path,
    id: &PackageIdentifier,
    artifacts: Vec<Artifact>,
    cached: bool,
) -> Result<PathBuf, RegistryError> {
    let destination = destination.to_path_buf();
    let target = target_name(id);
    let path = tokio::task::spawn_blocking(move || {
        let archives: Vec<(&str, &[u8])> = artifacts
            .iter()
            .map(|a| (a.file_name.as_str(), a.bytes.as_slice()))
            .collect();
        extract_archives(&destination, &target, &archives, cached)
    })
    .await
    .map_err(|e| RegistryError::Io(std::io::Error::other(e)))??;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixtures;
    use tempfile::TempDir;

    #[test]
    fn versions_or_empty_sorts_and_deduplicates() {
        let id = PackageIdentifier::new("npm", "left-pad");
        let versions = vec!["1.10.0".to_string(), "1.2.0".to_string(), "1.2.0".to_string()];

        assert_eq!(
            versions_or_empty(&id, Ok(versions)).unwrap(),
            vec!["1.2.0", "1.10.0"]
        );
    }

    #[test]
    fn versions_or_empty_maps_not_found_to_empty_list() {
        let id = PackageIdentifier::new("npm", "missing");

        let result = versions_or_empty(&id, Err(RegistryError::NotFound("missing".to_string())));

        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn versions_or_empty_propagates_other_errors() {
        let id = PackageIdentifier::new("npm", "left-pad");

        let result = versions_or_empty(
            &id,
            Err(RegistryError::InvalidResponse("boom".to_string())),
        );

        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[test]
    fn require_version_rejects_wildcard_and_missing_versions() {
        let id = PackageIdentifier::new("npm", "left-pad");

        assert_eq!(require_version(&id), None);
        assert_eq!(require_version(&id.with_version("*")), None);
        assert_eq!(require_version(&id.with_version("1.3.0")), Some("1.3.0"));
    }

    #[tokio::test]
    async fn store_artifact_without_extraction_writes_archive_file() {
        let temp_dir = TempDir::new().unwrap();
        let id = PackageIdentifier::new("cargo", "serde").with_version("1.0.0");

        let paths = store_artifact(temp_dir.path(), &id, b"crate".to_vec(), ".crate", false, false)
            .await
            .unwrap();

        assert_eq!(paths, vec![temp_dir.path().join("cargo-serde@1.0.0.crate")]);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"crate");
    }

    #[tokio::test]
    async fn store_artifact_with_extraction_returns_extraction_directory() {
        let temp_dir = TempDir::new().unwrap();
        let id = PackageIdentifier::new("npm", "left-pad").with_version("1.3.0");
        let bytes = fixtures::tar_gz(&[("package/package.json", "{}")]);

        let paths = store_artifact(temp_dir.path(), &id, bytes, ".tgz", true, false)
            .await
            .unwrap();

        assert_eq!(paths, vec![extraction_path(temp_dir.path(), &id)]);
        assert!(paths[0].join("package/package.json").is_file());
    }

    #[test]
    fn cached_extraction_requires_cache_flag_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let id = PackageIdentifier::new("gem", "rake").with_version("13.0.0");

        assert_eq!(cached_extraction(temp_dir.path(), &id, true), None);

        std::fs::create_dir_all(extraction_path(temp_dir.path(), &id)).unwrap();

        assert_eq!(cached_extraction(temp_dir.path(), &id, false), None);
        assert_eq!(
            cached_extraction(temp_dir.path(), &id, true),
            Some(extraction_path(temp_dir.path(), &id))
        );
    }

    #[test]
    fn cached_download_checks_archive_file_when_not_extracting() {
        let temp_dir = TempDir::new().unwrap();
        let id = PackageIdentifier::new("cargo", "serde").with_version("1.0.0");
        let archive = archive_path(temp_dir.path(), &id, ".crate");

        assert_eq!(cached_download(temp_dir.path(), &id, ".crate", false, true), None);

        std::fs::write(&archive, b"crate").unwrap();

        assert_eq!(cached_download(temp_dir.path(), &id, ".crate", false, false), None);
        assert_eq!(cached_download(temp_dir.path(), &id, ".crate", true, true), None);
        assert_eq!(
            cached_download(temp_dir.path(), &id, ".crate", false, true),
            Some(archive)
        );
    }
}
