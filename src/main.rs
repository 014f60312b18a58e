use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use pkg_fetch::config::{FetchConfig, log_path};
use pkg_fetch::download::PackageDownloader;
use pkg_fetch::http::HttpFetcher;
use pkg_fetch::package::PackageIdentifier;
use pkg_fetch::version::error::DownloadError;
use pkg_fetch::version::factory::RegistryManagerFactory;
use pkg_fetch::version::registry::RegistryContext;

#[derive(Parser)]
#[command(name = "pkg-fetch")]
#[command(version, about = "Download and cache packages from open-source registries")]
struct Cli {
    /// Package identifiers, e.g. pkg:npm/left-pad@1.3.0 or pkg:pypi/requests@*
    #[arg(required = true)]
    packages: Vec<String>,

    /// Directory downloads are written to
    #[arg(short, long, default_value = ".")]
    destination: PathBuf,

    /// Fetch registry metadata instead of the package itself
    #[arg(long)]
    metadata_only: bool,

    /// Keep downloaded archives as-is instead of extracting them
    #[arg(long)]
    no_extract: bool,

    /// Reuse earlier downloads and cached registry responses
    #[arg(long)]
    use_cache: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print known versions instead of downloading
    #[arg(long)]
    list_versions: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

/// Logs go to `log_path()` so stdout carries only results
fn init_logging() -> anyhow::Result<WorkerGuard> {
    let path = log_path();
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {:?}", dir))?;
    let file_name = path.file_name().unwrap_or("pkg-fetch.log".as_ref());

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let filter = EnvFilter::try_from_env("PKG_FETCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FetchConfig> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {:?}", path))?
        }
        None => FetchConfig::default(),
    };

    Ok(FetchConfig {
        endpoints: config.endpoints.with_env_overrides(),
        ..config
    })
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let http = HttpFetcher::from_config(&config)?;
    let ctx = RegistryContext::new(http, config.endpoints);

    let mut failures = 0;
    for package in &cli.packages {
        let result = match package.parse::<PackageIdentifier>() {
            Ok(id) if cli.list_versions => list_versions(&cli, &ctx, id).await,
            Ok(id) => fetch(&cli, &ctx, id).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            error!("{}: {:#}", package, e);
            eprintln!("{}: {:#}", package, e);
            if let Some(DownloadError::UnsupportedEcosystem(_)) = e.downcast_ref() {
                eprintln!(
                    "supported ecosystems: {}",
                    RegistryManagerFactory::supported_ecosystems().join(", ")
                );
            }
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} packages failed", failures, cli.packages.len());
    }
    Ok(())
}

async fn list_versions(
    cli: &Cli,
    ctx: &RegistryContext,
    id: PackageIdentifier,
) -> anyhow::Result<()> {
    let manager = RegistryManagerFactory::create(&id.ecosystem, ctx, &cli.destination)?;
    for version in manager.enumerate_versions(&id, cli.use_cache).await? {
        println!("{}", version);
    }
    Ok(())
}

async fn fetch(cli: &Cli, ctx: &RegistryContext, id: PackageIdentifier) -> anyhow::Result<()> {
    info!("Fetching {}", id);
    let mut downloader = PackageDownloader::new(id, &cli.destination, cli.use_cache, ctx).await?;
    let paths = downloader
        .download_package_local_copy(cli.metadata_only, !cli.no_extract)
        .await?;

    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}
