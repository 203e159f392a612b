//! vnap-ap service entry point
//!
//! **[APA-OV-010]** Boot order: tracing → configuration → database →
//! gazetteer snapshot from the resident seed → cache warm-up → HTTP server.
//! A missing snapshot is not fatal at boot (the seed endpoint can load one),
//! but /ready stays 503 until a snapshot is resident.

use anyhow::Result;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vnap_ap::{build_router, AppState};
use vnap_common::config::ParserConfig;
use vnap_common::db;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting vnap-ap (Address Parser) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = ParserConfig::load(config_path.as_deref())?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = db::init_database_pool(&db_path).await?;

    let state = AppState::new(db_pool.clone(), config.clone());

    // Load the resident gazetteer snapshot, if one was seeded before
    match db::admin_units::current_version(&db_pool).await? {
        Some(version) => {
            let units = db::admin_units::load_all(&db_pool).await?;
            info!(units = units.len(), gazetteer_version = %version, "Loading gazetteer snapshot");
            state.index.bulk_load(units, &version).await;
            state.seed.rebuild_synonyms().await?;

            let warmed = state.cache.warm_up(&version, 1_000).await;
            info!(warmed, "Cache warm-up complete");
        }
        None => {
            warn!("No gazetteer seeded yet; POST /v1/admin/seed to load one");
        }
    }

    let addr = config.bind_addr();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
