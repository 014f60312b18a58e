//! Maps ecosystem tags to registry manager constructors

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::version::error::DownloadError;
use crate::version::registries::{
    CargoRegistry, ComposerRegistry, CpanRegistry, CranRegistry, GemRegistry, GitHubRegistry,
    GoProxyRegistry, HackageRegistry, MavenRegistry, NpmRegistry, NuGetRegistry, PypiRegistry,
    VsMarketplaceRegistry,
};
use crate::version::registry::{RegistryContext, RegistryManager};

type Constructor = fn(&RegistryContext, &Path) -> Arc<dyn RegistryManager>;

static CONSTRUCTORS: LazyLock<HashMap<&'static str, Constructor>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, Constructor> = HashMap::new();
    map.insert("cargo", |ctx, dest| Arc::new(CargoRegistry::new(ctx, dest)));
    map.insert("composer", |ctx, dest| {
        Arc::new(ComposerRegistry::new(ctx, dest))
    });
    map.insert("cpan", |ctx, dest| Arc::new(CpanRegistry::new(ctx, dest)));
    map.insert("cran", |ctx, dest| Arc::new(CranRegistry::new(ctx, dest)));
    map.insert("gem", |ctx, dest| Arc::new(GemRegistry::new(ctx, dest)));
    map.insert("github", |ctx, dest| Arc::new(GitHubRegistry::new(ctx, dest)));
    map.insert("golang", |ctx, dest| Arc::new(GoProxyRegistry::new(ctx, dest)));
    map.insert("hackage", |ctx, dest| Arc::new(HackageRegistry::new(ctx, dest)));
    map.insert("maven", |ctx, dest| Arc::new(MavenRegistry::new(ctx, dest)));
    map.insert("npm", |ctx, dest| Arc::new(NpmRegistry::new(ctx, dest)));
    map.insert("nuget", |ctx, dest| Arc::new(NuGetRegistry::new(ctx, dest)));
    map.insert("pypi", |ctx, dest| Arc::new(PypiRegistry::new(ctx, dest)));
    map.insert("vsm", |ctx, dest| {
        Arc::new(VsMarketplaceRegistry::new(ctx, dest))
    });
    map
});

/// Creates the registry manager for an ecosystem tag
pub struct RegistryManagerFactory;

impl RegistryManagerFactory {
    /// Instantiates the manager registered for `ecosystem`, writing into `destination`
    pub fn create(
        ecosystem: &str,
        ctx: &RegistryContext,
        destination: &Path,
    ) -> Result<Arc<dyn RegistryManager>, DownloadError> {
        CONSTRUCTORS
            .get(ecosystem)
            .map(|constructor| constructor(ctx, destination))
            .ok_or_else(|| DownloadError::UnsupportedEcosystem(ecosystem.to_string()))
    }

    /// Every registered ecosystem tag, sorted
    pub fn supported_ecosystems() -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = CONSTRUCTORS.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}
