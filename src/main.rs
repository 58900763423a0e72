mod config;
mod db;
mod error;
mod layout;
mod llm;
mod registry;
mod routes;
mod sandbox;
mod services;
mod state;
mod validator;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use services::persistence::{self, KvStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let store: Arc<dyn KvStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url).await.expect("database init failed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; state is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize LLM client (non-fatal: generation disabled if config is invalid).
    let llm: Option<Arc<dyn llm::LlmChat>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured; app generation disabled");
            None
        }
    };

    let loaded = persistence::load(store.as_ref())
        .await
        .expect("failed to load persisted state");
    let state = state::AppState::new(config, registry::Registry::from_snapshot(loaded.snapshot), store, llm);
    let layout = persistence::restore(&state, loaded.layout);
    tracing::info!(columns = layout.columns, widgets = layout.entries.len(), "layout restored");

    // Spawn background persistence task.
    let _persistence = persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "widgetboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
