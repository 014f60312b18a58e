//! Package identifiers

pub mod identifier;

pub use identifier::{ALL_VERSIONS, IdentifierParseError, PackageIdentifier, VersionRequest};
