//! Abstract package identifier consumed by the downloader and registries

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Version wildcard meaning "every published version"
pub const ALL_VERSIONS: &str = "*";

/// Identifies a package (and optionally one version) in an ecosystem.
///
/// Textual form is purl-like: `pkg:<ecosystem>/[<namespace>/]<name>[@<version>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentifier {
    pub ecosystem: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
}

/// How the version field of an identifier should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRequest<'a> {
    /// No version given: resolve to the newest one
    Latest,
    /// `*`: every known version
    All,
    /// A concrete version
    Exact(&'a str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierParseError {
    #[error("Identifier must start with 'pkg:': {0}")]
    MissingScheme(String),

    #[error("Identifier has no ecosystem: {0}")]
    MissingEcosystem(String),

    #[error("Identifier has no package name: {0}")]
    MissingName(String),
}

impl PackageIdentifier {
    pub fn new(ecosystem: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            namespace: None,
            name: name.into(),
            version: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns a copy of this identifier pinned to `version`
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self.clone()
        }
    }

    /// Returns the namespace if it is present and non-empty
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Returns the version if it is present and non-empty
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }

    pub fn version_request(&self) -> VersionRequest<'_> {
        match self.version() {
            None => VersionRequest::Latest,
            Some(ALL_VERSIONS) => VersionRequest::All,
            Some(version) => VersionRequest::Exact(version),
        }
    }

    /// `namespace/name` when a namespace is present, otherwise `name`
    pub fn full_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl FromStr for PackageIdentifier {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("pkg:")
            .ok_or_else(|| IdentifierParseError::MissingScheme(s.to_string()))?;

        let (ecosystem, path) = rest
            .split_once('/')
            .ok_or_else(|| IdentifierParseError::MissingEcosystem(s.to_string()))?;
        if ecosystem.is_empty() {
            return Err(IdentifierParseError::MissingEcosystem(s.to_string()));
        }

        let (namespace, last_segment) = match path.rsplit_once('/') {
            Some((ns, last)) => (Some(decode(ns)), last),
            None => (None, path),
        };

        // A leading '@' belongs to the name (npm scope without a namespace
        // segment), so only split on an '@' after the first character.
        let (name, version) = match last_segment.char_indices().skip(1).find(|(_, c)| *c == '@') {
            Some((i, _)) => (&last_segment[..i], Some(decode(&last_segment[i + 1..]))),
            None => (last_segment, None),
        };

        if name.is_empty() {
            return Err(IdentifierParseError::MissingName(s.to_string()));
        }

        Ok(Self {
            ecosystem: ecosystem.to_ascii_lowercase(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
            name: decode(name),
            version: version.filter(|v| !v.is_empty()),
        })
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.ecosystem)?;
        if let Some(ns) = self.namespace() {
            write!(f, "{}/", ns.replace('@', "%40"))?;
        }
        write!(f, "{}", self.name)?;
        if let Some(version) = self.version() {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

fn decode(segment: &str) -> String {
    segment.replace("%40", "@").replace("%2F", "/").replace("%2f", "/")
}
