//! KYC Portal REST API Server
//!
//! ## Usage
//!
//! ```bash
//! # In-memory stores
//! cargo run --bin kyc_server
//!
//! # PostgreSQL
//! DATABASE_URL=postgresql://localhost/kyc_portal cargo run --bin kyc_server --features database
//!
//! curl -X POST http://localhost:5000/api/fields \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "PAN", "section_category": "Personal"}'
//! curl -X POST http://localhost:5000/api/profiles \
//!   -H "Content-Type: application/json" \
//!   -d '{"details": {"Personal": {"PAN": "ABCDE1234F"}}}'
//! curl http://localhost:5000/api/profiles/by-pan/abcde1234f
//! ```

use anyhow::{Context, Result};
use kyc_portal::api::{create_router, AppState};
use kyc_portal::config::PortalConfig;
use kyc_portal::store::{FieldCatalogStore, MemoryFieldCatalog, MemoryProfileStore, ProfileStore};
use kyc_portal::workflow::{ProfileService, SessionStore, WorkflowCoordinator};
use kyc_portal::FieldCatalog;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type Stores = (Arc<dyn ProfileStore>, Arc<dyn FieldCatalogStore>);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kyc_portal=info,kyc_server=info,tower_http=debug")),
        )
        .init();

    let config = PortalConfig::from_env().context("Invalid portal configuration")?;
    let (profiles, fields) = open_stores(&config).await?;

    let sessions = SessionStore::new(config.session_ttl);
    spawn_session_sweeper(sessions.clone());

    let coordinator = WorkflowCoordinator::new(
        ProfileService::new(profiles),
        FieldCatalog::new(fields),
        sessions,
    );
    let app = create_router(AppState::new(coordinator));

    let addr = config.socket_addr()?;
    info!("Starting KYC portal on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "database")]
async fn open_stores(config: &PortalConfig) -> Result<Stores> {
    use kyc_portal::database::{DatabaseConfig, DatabaseManager};

    let Some(url) = config.database_url.as_deref() else {
        return Ok(memory_stores());
    };
    let db = DatabaseManager::new(DatabaseConfig::with_url(url)).await?;
    db.test_connection()
        .await
        .context("Database is not reachable")?;
    db.run_migrations().await?;

    let profiles = db.profile_store();
    let skipped = profiles.backfill_pan_normalized().await?;
    if !skipped.is_empty() {
        warn!(profile_ids = ?skipped, "Profiles share a normalized PAN and need review");
    }
    Ok((Arc::new(profiles), Arc::new(db.field_catalog())))
}

#[cfg(not(feature = "database"))]
async fn open_stores(config: &PortalConfig) -> Result<Stores> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but the database feature is disabled; using in-memory stores");
    }
    Ok(memory_stores())
}

fn memory_stores() -> Stores {
    info!("Using in-memory stores");
    (
        Arc::new(MemoryProfileStore::new()),
        Arc::new(MemoryFieldCatalog::new()),
    )
}

fn spawn_session_sweeper(sessions: SessionStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                let active = sessions.len().await;
                debug!(purged, active, "Purged expired workflow sessions");
            }
        }
    });
}
