//! Registry layer: version ordering and per-ecosystem registry managers
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ PackageDownloader │────▶│ RegistryManager │────▶│   HttpFetcher   │
//! │   (version set)   │     │ (per ecosystem) │     │ (+ HTTP cache)  │
//! └───────────────────┘     └─────────────────┘     └─────────────────┘
//!          │                         │
//!          ▼                         ▼
//! ┌───────────────────┐     ┌─────────────────┐
//! │     Ordering      │     │     Extract     │
//! │  (natural sort)   │     │ (temp + rename) │
//! └───────────────────┘     └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`ordering`]: Natural version ordering that doesn't assume semver
//! - [`registry`]: `RegistryManager` trait and shared context
//! - [`registries`]: One manager per ecosystem (npm, PyPI, Maven, ...)
//! - [`factory`]: Ecosystem tag to manager dispatch
//! - [`error`]: Error types for registries, downloads, cache and extraction

pub mod error;
pub mod factory;
pub mod ordering;
pub mod registries;
pub mod registry;
