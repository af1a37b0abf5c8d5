use anyhow::Context;
use indexer_core::{config::Config, db::init_db, ReferenceData, ReferenceSource, Repository};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let source: Arc<dyn ReferenceSource> = repo.clone();
    let reference = Arc::new(ReferenceData::new(source, config.runtime_env));
    reference
        .refresh_all()
        .await
        .context("initial reference data load failed")?;

    let handles = reference.spawn_refresh_loops(&config.refresh);
    tracing::info!(
        runtime_env = %config.runtime_env,
        loops = handles.len(),
        "Indexer core running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    for handle in &handles {
        handle.abort();
    }
    futures::future::join_all(handles).await;
    Ok(())
}
