//! PackageDownloader integration tests

mod helper;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use mockito::Server;
use tempfile::TempDir;

use helper::{FakeRegistryManager, tar_gz, test_context};
use pkg_fetch::config::EndpointConfig;
use pkg_fetch::download::PackageDownloader;
use pkg_fetch::package::PackageIdentifier;

fn left_pad_archive() -> Vec<u8> {
    tar_gz(&[("package/package.json", r#"{"name": "left-pad"}"#)])
}

#[tokio::test]
async fn repeated_cached_downloads_fetch_once() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive());
    let downloads = manager.download_counter();
    let manager = Arc::new(manager);
    let id: PackageIdentifier = "pkg:npm/left-pad@1.3.0".parse().unwrap();

    for _ in 0..2 {
        let mut downloader =
            PackageDownloader::with_manager(manager.clone(), id.clone(), temp_dir.path(), true)
                .await
                .unwrap();
        let paths = downloader
            .download_package_local_copy(false, true)
            .await
            .unwrap();
        assert_eq!(paths, vec![temp_dir.path().join("npm-left-pad@1.3.0")]);
    }

    assert_eq!(downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn uncached_downloads_fetch_every_time() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive());
    let downloads = manager.download_counter();
    let manager = Arc::new(manager);
    let id: PackageIdentifier = "pkg:npm/left-pad@1.3.0".parse().unwrap();

    for _ in 0..2 {
        let mut downloader =
            PackageDownloader::with_manager(manager.clone(), id.clone(), temp_dir.path(), false)
                .await
                .unwrap();
        downloader
            .download_package_local_copy(false, true)
            .await
            .unwrap();
    }

    assert_eq!(downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unspecified_version_resolves_to_newest() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive())
        .with_versions(&["1.0.0", "1.2.0", "2.0.0"]);

    let downloader = PackageDownloader::with_manager(
        Arc::new(manager),
        PackageIdentifier::new("npm", "left-pad"),
        temp_dir.path(),
        false,
    )
    .await
    .unwrap();

    assert_eq!(downloader.versions(), ["2.0.0"]);
}

#[tokio::test]
async fn wildcard_downloads_all_versions_in_ascending_order() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive())
        .with_versions(&["1.0.0", "1.2.0", "2.0.0"]);

    let mut downloader = PackageDownloader::with_manager(
        Arc::new(manager),
        "pkg:npm/left-pad@*".parse().unwrap(),
        temp_dir.path(),
        false,
    )
    .await
    .unwrap();
    let paths = downloader
        .download_package_local_copy(false, true)
        .await
        .unwrap();

    assert_eq!(downloader.versions(), ["1.0.0", "1.2.0", "2.0.0"]);
    assert_eq!(
        paths,
        vec![
            temp_dir.path().join("npm-left-pad@1.0.0"),
            temp_dir.path().join("npm-left-pad@1.2.0"),
            temp_dir.path().join("npm-left-pad@2.0.0"),
        ]
    );
}

#[tokio::test]
async fn missing_required_namespace_yields_no_paths() {
    let temp_dir = TempDir::new().unwrap();
    // Nothing listens here; a soft fail must not touch the network
    let ctx = test_context(EndpointConfig {
        maven: "http://127.0.0.1:9".to_string(),
        ..EndpointConfig::default()
    });
    let id = PackageIdentifier::new("maven", "commons-lang3")
        .with_namespace("")
        .with_version("3.14.0");

    let mut downloader = PackageDownloader::new(id, temp_dir.path(), false, &ctx)
        .await
        .unwrap();
    let paths = downloader
        .download_package_local_copy(false, true)
        .await
        .unwrap();

    assert!(paths.is_empty());
}

#[tokio::test]
async fn npm_package_is_downloaded_and_extracted() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let destination = temp_dir.path().join("tmp");

    let mock = server
        .mock("GET", "/left-pad/-/left-pad-1.3.0.tgz")
        .with_status(200)
        .with_body(left_pad_archive())
        .create_async()
        .await;

    let ctx = test_context(EndpointConfig {
        npm: server.url(),
        ..EndpointConfig::default()
    });
    let id = PackageIdentifier::new("npm", "left-pad").with_version("1.3.0");

    let mut downloader = PackageDownloader::new(id, &destination, false, &ctx)
        .await
        .unwrap();
    let paths = downloader
        .download_package_local_copy(false, true)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].join("package").join("package.json").is_file());
}

#[tokio::test]
async fn npm_metadata_only_download_writes_metadata_file() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();
    let document = r#"{"name": "left-pad", "versions": {"1.3.0": {}}}"#;

    let mock = server
        .mock("GET", "/left-pad")
        .with_status(200)
        .with_body(document)
        .create_async()
        .await;

    let ctx = test_context(EndpointConfig {
        npm: server.url(),
        ..EndpointConfig::default()
    });
    let id = PackageIdentifier::new("npm", "left-pad").with_version("1.3.0");

    let mut downloader = PackageDownloader::new(id, temp_dir.path(), false, &ctx)
        .await
        .unwrap();
    let paths = downloader
        .download_package_local_copy(true, false)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(
        paths,
        vec![temp_dir.path().join("metadata-npm-left-pad@1.3.0.json")]
    );
    assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), document);
}

#[tokio::test]
async fn cleanup_removes_target_when_not_caching() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive());

    let mut downloader = PackageDownloader::with_manager(
        Arc::new(manager),
        "pkg:npm/left-pad@1.3.0".parse().unwrap(),
        temp_dir.path(),
        false,
    )
    .await
    .unwrap();
    let paths = downloader
        .download_package_local_copy(false, true)
        .await
        .unwrap();
    assert!(paths[0].is_dir());

    let report = downloader.clear_package_local_copy_if_no_caching();

    assert!(report.is_complete());
    assert!(!paths[0].exists());
}

#[tokio::test]
async fn cleanup_keeps_target_when_caching() {
    let temp_dir = TempDir::new().unwrap();
    let manager = FakeRegistryManager::new(temp_dir.path(), left_pad_archive());

    let mut downloader = PackageDownloader::with_manager(
        Arc::new(manager),
        "pkg:npm/left-pad@1.3.0".parse().unwrap(),
        temp_dir.path(),
        true,
    )
    .await
    .unwrap();
    let paths = downloader
        .download_package_local_copy(false, true)
        .await
        .unwrap();

    let report = downloader.clear_package_local_copy_if_no_caching();

    assert!(report.removed.is_empty());
    assert!(paths[0].is_dir());
}

#[tokio::test]
async fn repeated_cached_downloads_without_extraction_fetch_once() {
    let mut server = Server::new_async().await;
    let temp_dir = TempDir::new().unwrap();

    let mock = server
        .mock("GET", "/left-pad/-/left-pad-1.3.0.tgz")
        .with_status(200)
        .with_body(left_pad_archive())
        .expect(1)
        .create_async()
        .await;

    let ctx = test_context(EndpointConfig {
        npm: server.url(),
        ..EndpointConfig::default()
    });
    let id = PackageIdentifier::new("npm", "left-pad").with_version("1.3.0");

    for _ in 0..2 {
        let mut downloader = PackageDownloader::new(id.clone(), temp_dir.path(), true, &ctx)
            .await
            .unwrap();
        let paths = downloader
            .download_package_local_copy(false, false)
            .await
            .unwrap();
        assert_eq!(paths, vec![temp_dir.path().join("npm-left-pad@1.3.0.tgz")]);
    }

    mock.assert_async().await;
}
