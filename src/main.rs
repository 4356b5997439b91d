use anyhow::{bail, Context};
use arbor_import::config::ImportConfig;
use arbor_import::database::postgres::PgStore;
use arbor_import::logging::init_tracing;
use arbor_import::overpass::HttpOverpassClient;
use arbor_import::services::run_import;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // determine environment variables
    dotenv::dotenv().ok();
    init_tracing();

    let config = ImportConfig::from_env()?;

    // the pool is owned here and handed to the stores; the job never reaches for a global
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    // leave the server its own timeout before giving up client-side
    let source = HttpOverpassClient::new(config.fetch.timeout + Duration::from_secs(30))?;

    info!("starting road import");

    let result = tokio::select! {
        result = run_import(&config, Box::new(source), store.clone(), store.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            // dropping the import future rolls back the open batch and frees its connection
            warn!("interrupted, releasing database connections");
            pool.close().await;
            bail!("Import interrupted by operator");
        }
    };

    pool.close().await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %format!("{:#}", e), "import failed");
            return Err(e);
        }
    };

    if let Some(roads) = &outcome.roads {
        println!(
            "Roads: {} ways fetched, {} dropped, {} stored.",
            roads.fetched_ways, roads.dropped_ways, roads.stored_roads
        );
    }
    println!("{}", outcome.backfill);

    Ok(())
}
