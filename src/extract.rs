//! Archive extraction into the deterministic cache layout
//!
//! Archives are unpacked into a temporary sibling of the target directory
//! and renamed into place once complete, so an interrupted or concurrent
//! extraction never leaves a half-populated directory that a later cached
//! run would mistake for a hit.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::version::error::ExtractError;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Archive formats recognised by content sniffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(GZIP_MAGIC) {
            Some(Self::TarGz)
        } else if bytes.starts_with(ZIP_MAGIC) {
            Some(Self::Zip)
        } else if bytes.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC)
        {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Extracts `bytes` into `destination/target_name` and returns that directory.
///
/// With `cached`, an existing target directory is returned untouched.
/// Without it, an existing target is replaced.
pub fn extract_archive(
    destination: &Path,
    target_name: &str,
    bytes: &[u8],
    cached: bool,
) -> Result<PathBuf, ExtractError> {
    if ArchiveFormat::detect(bytes).is_none() {
        return Err(ExtractError::UnsupportedFormat(target_name.to_string()));
    }
    extract_archives(destination, target_name, &[("", bytes)], cached)
}

/// Extracts several archives of one package version into a single target.
///
/// Each `(subdirectory, bytes)` pair is unpacked below the target; an empty
/// subdirectory means the target itself, any other must be a single plain
/// path component. Files in an unrecognised format are copied verbatim to
/// `<target>/<subdirectory>`.
pub fn extract_archives(
    destination: &Path,
    target_name: &str,
    archives: &[(&str, &[u8])],
    cached: bool,
) -> Result<PathBuf, ExtractError> {
    let target = destination.join(target_name);
    if cached && target.is_dir() {
        debug!("Extraction target already present: {:?}", target);
        return Ok(target);
    }

    if let Some((subdirectory, _)) = archives
        .iter()
        .find(|(subdirectory, _)| !subdirectory.is_empty() && !is_plain_name(subdirectory))
    {
        return Err(ExtractError::UnsafePath(subdirectory.to_string()));
    }

    fs::create_dir_all(destination)?;
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", target_name))
        .tempdir_in(destination)?;

    for (subdirectory, bytes) in archives {
        let unpack_dir = staging.path().join(subdirectory);
        match ArchiveFormat::detect(bytes) {
            Some(ArchiveFormat::TarGz) => {
                unpack_tar(GzDecoder::new(Cursor::new(*bytes)), &unpack_dir)?
            }
            Some(ArchiveFormat::Tar) => unpack_tar(Cursor::new(*bytes), &unpack_dir)?,
            Some(ArchiveFormat::Zip) => unpack_zip(bytes, &unpack_dir)?,
            None if !subdirectory.is_empty() => {
                warn!("Unrecognised archive format, copying as is: {}", subdirectory);
                fs::write(&unpack_dir, bytes)?;
            }
            None => return Err(ExtractError::UnsupportedFormat(target_name.to_string())),
        }
    }

    if target.exists() {
        if cached {
            // Another extraction finished first; its result is equivalent.
            debug!("Target appeared during extraction, keeping it: {:?}", target);
            return Ok(target);
        }
        fs::remove_dir_all(&target)?;
    }

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, &target) {
        let _ = fs::remove_dir_all(&staged)
            .inspect_err(|cleanup| warn!("Failed to remove {:?}: {}", staged, cleanup));
        return Err(e.into());
    }

    info!("Extracted {} into {:?}", target_name, target);
    Ok(target)
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn unpack_tar<R: Read>(reader: R, target: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(target)?;
    let mut archive = Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        // unpack_in refuses entries that would escape `target`
        if !entry.unpack_in(target)? {
            warn!("Skipped archive entry outside target: {:?}", entry.path()?);
        }
    }
    Ok(())
}

fn unpack_zip(bytes: &[u8], target: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(target)?;
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(enclosed_name) = file.enclosed_name() else {
            warn!("Skipped zip entry outside target: {}", file.name());
            continue;
        };
        let dest_path = target.join(enclosed_name);

        if file.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&dest_path)?;
        std::io::copy(&mut file, &mut outfile)?;
    }
    Ok(())
}
