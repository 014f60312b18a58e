//! Deterministic on-disk names for downloaded packages
//!
//! Every (ecosystem, namespace, name, version) maps to exactly one target
//! name, so the existence of `destination/<target name>` is the cache-hit
//! signal for every registry and for the downloader.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::package::PackageIdentifier;

/// Prefix of files written by metadata-only downloads
pub const METADATA_PREFIX: &str = "metadata-";

// Characters rejected by at least one common filesystem
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("static regex is valid")
});

/// Replace every character that is illegal in a file name with `_`.
///
/// The result is always a single plain path component: names made only of
/// dots (including the empty name) are replaced as a whole.
pub fn safe_file_name(name: &str) -> String {
    let safe = UNSAFE_CHARS.replace_all(name, "_");
    if safe.chars().all(|c| c == '.') {
        return "_".repeat(safe.len().max(1));
    }
    safe.into_owned()
}

/// `ecosystem-namespace-name@version`, filesystem-safe.
///
/// The namespace segment is omitted when empty and the version suffix when
/// the identifier carries no version.
pub fn target_name(id: &PackageIdentifier) -> String {
    let mut name = id.ecosystem.clone();
    if let Some(ns) = id.namespace() {
        name.push('-');
        name.push_str(ns);
    }
    name.push('-');
    name.push_str(&id.name);
    if let Some(version) = id.version() {
        name.push('@');
        name.push_str(version);
    }
    safe_file_name(&name)
}

/// Directory an identifier is extracted into under `destination`
pub fn extraction_path(destination: &Path, id: &PackageIdentifier) -> PathBuf {
    destination.join(target_name(id))
}

/// Raw archive path used when a download is not extracted
pub fn archive_path(destination: &Path, id: &PackageIdentifier, extension: &str) -> PathBuf {
    destination.join(format!("{}{}", target_name(id), extension))
}

/// File a metadata-only download is written to
pub fn metadata_path(destination: &Path, id: &PackageIdentifier) -> PathBuf {
    destination.join(format!("{}{}.json", METADATA_PREFIX, target_name(id)))
}

/// Same as [`metadata_path`] with a timestamp suffix, for non-cached pulls
/// that must not overwrite an earlier file.
///
/// A non-zero `sequence` tells apart pulls stamped in the same millisecond.
pub fn timestamped_metadata_path(
    destination: &Path,
    id: &PackageIdentifier,
    timestamp: chrono::DateTime<chrono::Utc>,
    sequence: u32,
) -> PathBuf {
    let stamp = timestamp.format("%Y%m%d%H%M%S%3f");
    let name = if sequence == 0 {
        format!("{}{}-{}.json", METADATA_PREFIX, target_name(id), stamp)
    } else {
        format!("{}{}-{}-{}.json", METADATA_PREFIX, target_name(id), stamp, sequence)
    };
    destination.join(name)
}
