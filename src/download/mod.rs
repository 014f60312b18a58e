//! Download orchestration over registry managers

pub mod downloader;

pub use downloader::{CleanupReport, PackageDownloader};
