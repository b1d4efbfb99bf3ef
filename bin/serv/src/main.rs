use std::sync::Arc;

use axum::{middleware, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use owlet_api::{config::ApiConfig, metrics, state::ApiState};
use owlet_db::memory::MemoryStore;
use owlet_db::postgres::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    owlet_api::tracing::init_tracing(&config.env);
    let metrics_handle = metrics::init_metrics()?;

    // Pick the persistence collaborator: Postgres when configured,
    // otherwise the in-memory store (same code path either way).
    let state = match &config.database_url {
        Some(database_url) => {
            let pool = owlet_db::create_pool(database_url).await?;
            owlet_db::ensure_db_and_migrate(database_url, &pool).await?;
            let store = Arc::new(PgStore::new(pool));
            ApiState::new(&config, store.clone(), store)
        }
        None => {
            tracing::warn!(
                "DATABASE_URL is not set; running on the in-memory store (data is not persisted)"
            );
            let store = Arc::new(MemoryStore::new());
            ApiState::new(&config, store.clone(), store)
        }
    };

    // Create the application router
    let app = owlet_api::router::router()
        .with_state(state)
        .route(
            "/metrics",
            get(metrics::metrics_handler).with_state(metrics_handle),
        )
        .layer(middleware::from_fn(metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive());

    // Start the server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
