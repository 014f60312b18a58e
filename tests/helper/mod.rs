//! Shared utilities for integration tests

#![allow(dead_code)]

mod archive;
mod registry;

pub use archive::tar_gz;
pub use registry::FakeRegistryManager;

use pkg_fetch::config::{CacheConfig, EndpointConfig, FetchConfig};
use pkg_fetch::http::HttpFetcher;
use pkg_fetch::version::registry::RegistryContext;

/// Registry context with an in-memory response cache and the given endpoints
pub fn test_context(endpoints: EndpointConfig) -> RegistryContext {
    let config = FetchConfig {
        endpoints,
        cache: CacheConfig {
            persistent: false,
            ..CacheConfig::default()
        },
        ..FetchConfig::default()
    };
    let http = HttpFetcher::from_config(&config).unwrap();
    RegistryContext::new(http, config.endpoints)
}
