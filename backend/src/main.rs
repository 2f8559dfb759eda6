use anyhow::Context;
use cms_snapshot::application::repositories::SiteRepository;
use cms_snapshot::application::services::CleanupService;
use cms_snapshot::config::AppConfig;
use cms_snapshot::infrastructure::persistence::SqliteRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Applies the snapshot retention policy to every enabled site
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = SqliteRepository::new_with_path(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    tracing::info!("Opened snapshot store at {}", config.database_path.display());

    let sites = store.find_all_sites().context("Failed to list sites")?;
    let service = CleanupService::new(store);

    for site in sites.iter().filter(|site| site.is_enabled()) {
        let summary = service
            .cleanup_by_site(site, config.keep_snapshots, None)
            .await
            .with_context(|| format!("Cleanup of site '{}' failed", site.name()))?;

        tracing::info!(
            "Site '{}': kept {} snapshots per page, deleted {}",
            site.name(),
            config.keep_snapshots,
            summary.snapshots_deleted
        );
    }

    Ok(())
}
