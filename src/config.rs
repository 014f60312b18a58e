use serde::Deserialize;
use std::path::PathBuf;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default lifetime of a cached HTTP response in milliseconds (24 hours)
pub const DEFAULT_CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Default timeout for a single HTTP request in milliseconds (60 seconds)
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 60_000;

/// Default User-Agent sent to registries
pub const DEFAULT_USER_AGENT: &str = concat!("pkg-fetch/", env!("CARGO_PKG_VERSION"));

/// Prefix of environment variables overriding registry endpoints
pub const ENV_PREFIX: &str = "PKG_FETCH_";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    pub endpoints: EndpointConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// HTTP response cache configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Lifetime of a cached response in milliseconds
    pub ttl_ms: i64,
    /// Keep responses in `http_cache_path()` instead of memory
    pub persistent: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            persistent: true,
        }
    }
}

/// Base URLs of every registry endpoint.
///
/// Each field can be overridden with `PKG_FETCH_<FIELD>_URL`, e.g.
/// `PKG_FETCH_NPM_URL` or `PKG_FETCH_CARGO_DOWNLOAD_URL`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointConfig {
    pub npm: String,
    pub pypi: String,
    pub cargo: String,
    pub cargo_download: String,
    pub gem: String,
    pub nuget: String,
    pub maven: String,
    pub composer: String,
    pub github_api: String,
    pub github: String,
    pub golang: String,
    pub cpan: String,
    pub cran: String,
    pub crandb: String,
    pub hackage: String,
    pub vsm: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            npm: "https://registry.npmjs.org".to_string(),
            pypi: "https://pypi.org".to_string(),
            cargo: "https://crates.io".to_string(),
            cargo_download: "https://static.crates.io".to_string(),
            gem: "https://rubygems.org".to_string(),
            nuget: "https://api.nuget.org".to_string(),
            maven: "https://repo1.maven.org/maven2".to_string(),
            composer: "https://repo.packagist.org".to_string(),
            github_api: "https://api.github.com".to_string(),
            github: "https://github.com".to_string(),
            golang: "https://proxy.golang.org".to_string(),
            cpan: "https://fastapi.metacpan.org".to_string(),
            cran: "https://cran.r-project.org".to_string(),
            crandb: "https://crandb.r-pkg.org".to_string(),
            hackage: "https://hackage.haskell.org".to_string(),
            vsm: "https://marketplace.visualstudio.com".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Applies `PKG_FETCH_<FIELD>_URL` overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides resolved through `lookup`; trailing slashes are trimmed
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for (field, value) in self.fields_mut() {
            let key = format!("{}{}_URL", ENV_PREFIX, field);
            if let Some(url) = lookup(&key).filter(|url| !url.is_empty()) {
                *value = url.trim_end_matches('/').to_string();
            }
        }
        self
    }

    fn fields_mut(&mut self) -> [(&'static str, &mut String); 16] {
        [
            ("NPM", &mut self.npm),
            ("PYPI", &mut self.pypi),
            ("CARGO", &mut self.cargo),
            ("CARGO_DOWNLOAD", &mut self.cargo_download),
            ("GEM", &mut self.gem),
            ("NUGET", &mut self.nuget),
            ("MAVEN", &mut self.maven),
            ("COMPOSER", &mut self.composer),
            ("GITHUB_API", &mut self.github_api),
            ("GITHUB", &mut self.github),
            ("GOLANG", &mut self.golang),
            ("CPAN", &mut self.cpan),
            ("CRAN", &mut self.cran),
            ("CRANDB", &mut self.crandb),
            ("HACKAGE", &mut self.hackage),
            ("VSM", &mut self.vsm),
        ]
    }
}

/// Returns the path to the data directory for pkg-fetch.
/// Uses $XDG_DATA_HOME/pkg-fetch if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/pkg-fetch,
/// or ./pkg-fetch if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the HTTP response cache database.
pub fn http_cache_path() -> PathBuf {
    data_dir().join("http-cache.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("pkg-fetch.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("pkg-fetch")
}
