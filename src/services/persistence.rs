//! Persistence service — debounced flush of the registry and layout.
//!
//! DESIGN
//! ======
//! The registry and the layout engine live in memory. A background task
//! wakes every `REGISTRY_FLUSH_INTERVAL_MS`, compares the registry revision
//! and column count against what it last wrote, and only then serializes
//! the snapshot and layout into the key/value store. A failed write leaves
//! the marker untouched so the next tick retries.
//!
//! At startup `load` reads both keys back; `restore` rebuilds the registry
//! (dropping orphaned widgets) and lets the layout engine decide whether
//! the persisted layout still matches.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::layout::LayoutState;
use crate::registry::RegistrySnapshot;
use crate::state::AppState;

/// Key holding the serialized [`RegistrySnapshot`].
pub const REGISTRY_KEY: &str = "widgetboard:registry";
/// Key holding the last computed [`LayoutState`].
pub const LAYOUT_KEY: &str = "widgetboard:layout";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_STORE_DATABASE",
            Self::Encode(_) => "E_STORE_ENCODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// STORES
// =============================================================================

/// Durable JSON slots keyed by name.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// `kv_store` table in Postgres.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_as::<_, (Value,)>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ($1, $2, now())
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

// =============================================================================
// LOAD + RESTORE
// =============================================================================

/// What was found in the store at startup.
#[derive(Debug, Default)]
pub struct Loaded {
    pub snapshot: RegistrySnapshot,
    pub layout: Option<LayoutState>,
}

/// Read the persisted registry and layout. Undecodable values are logged
/// and treated as absent.
///
/// # Errors
///
/// Returns `Database` if the store cannot be read.
pub async fn load(store: &dyn KvStore) -> Result<Loaded, StoreError> {
    let snapshot = match store.get(REGISTRY_KEY).await? {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "persistence: stored registry unreadable; starting empty");
            RegistrySnapshot::default()
        }),
        None => RegistrySnapshot::default(),
    };
    let layout = match store.get(LAYOUT_KEY).await? {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| warn!(error = %e, "persistence: stored layout unreadable; regenerating"))
            .ok(),
        None => None,
    };
    info!(
        apps = snapshot.micro_apps.len(),
        widgets = snapshot.widgets.len(),
        has_layout = layout.is_some(),
        "persistence: state loaded"
    );
    Ok(Loaded { snapshot, layout })
}

/// Reconcile the persisted layout against the state's registry.
pub fn restore(state: &AppState, layout: Option<LayoutState>) -> LayoutState {
    state.layout.restore(&state.registry.snapshot(), layout)
}

// =============================================================================
// FLUSH
// =============================================================================

/// What the last successful flush wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushMarker {
    pub revision: u64,
    pub columns: u32,
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = state.config.flush_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut marker = Some(current_marker(&state));
        loop {
            interval.tick().await;
            if let Err(e) = flush_if_dirty(&state, &mut marker).await {
                error!(error = %e, "persistence flush failed");
            }
        }
    })
}

fn current_marker(state: &AppState) -> FlushMarker {
    FlushMarker { revision: state.registry.snapshot().revision, columns: state.layout.current().columns }
}

/// Write the registry snapshot and layout if either changed since `marker`.
/// Returns whether anything was written.
///
/// # Errors
///
/// Returns the store error; `marker` is left unchanged so the next call retries.
pub async fn flush_if_dirty(state: &AppState, marker: &mut Option<FlushMarker>) -> Result<bool, StoreError> {
    let snapshot = state.registry.snapshot();
    let layout = state.layout.refresh(&snapshot);
    let next = FlushMarker { revision: snapshot.revision, columns: layout.columns };
    if *marker == Some(next) {
        return Ok(false);
    }

    state
        .store
        .put(REGISTRY_KEY, serde_json::to_value(&*snapshot)?)
        .await?;
    state
        .store
        .put(LAYOUT_KEY, serde_json::to_value(&layout)?)
        .await?;

    debug!(revision = next.revision, columns = next.columns, "persistence: flushed");
    *marker = Some(next);
    Ok(true)
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
