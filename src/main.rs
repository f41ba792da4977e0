mod auth;
mod config;
mod dashboard;
mod db;
mod error;
mod listings;
mod nav;
mod ocr;
mod routes;
mod state;
mod storage;
mod submissions;
mod templates;

use std::sync::Arc;

use crate::listings::{BusyListings, ListingHub, RandomGrader};
use crate::storage::LocalBlobStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recircuit=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    crate::storage::ensure_dirs(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let ocr = ocr::build_engine(&config)?;
    tracing::info!("Text extraction via {}", ocr.name());

    let state = Arc::new(state::AppState {
        pool,
        blobs: Arc::new(LocalBlobStore::new(
            config.upload_folder.clone(),
            &config.public_base_url,
        )),
        ocr,
        grader: Arc::new(RandomGrader),
        listing_hub: ListingHub::default(),
        busy: BusyListings::default(),
        config: config.clone(),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("ReCircuit listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
