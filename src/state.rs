//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the registry, the layout engine, the sandbox host with its
//! published documents, the key/value store the persistence task flushes
//! into, and the optional LLM client used for app generation.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::layout::LayoutEngine;
use crate::llm::LlmChat;
use crate::registry::Registry;
use crate::sandbox::SandboxHost;
use crate::sandbox::backend::{DocumentStore, FrameBackend, IsolationBackend};
use crate::services::persistence::KvStore;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<Registry>,
    pub layout: Arc<LayoutEngine>,
    pub sandbox: Arc<SandboxHost>,
    /// Documents served under `/sandbox/{token}`.
    pub documents: Arc<DocumentStore>,
    pub store: Arc<dyn KvStore>,
    /// Optional LLM client. `None` if LLM env vars are not configured.
    pub llm: Option<Arc<dyn LlmChat>>,
}

impl AppState {
    /// State backed by the production frame backend.
    #[must_use]
    pub fn new(
        config: AppConfig,
        registry: Registry,
        store: Arc<dyn KvStore>,
        llm: Option<Arc<dyn LlmChat>>,
    ) -> Self {
        let documents = Arc::new(DocumentStore::new(&config.sandbox_public_base));
        let backend = Arc::new(FrameBackend::new(documents.clone(), config.sandbox_isolation));
        Self::with_backend(config, registry, store, llm, documents, backend)
    }

    /// State with an explicit isolation backend.
    #[must_use]
    pub fn with_backend(
        config: AppConfig,
        registry: Registry,
        store: Arc<dyn KvStore>,
        llm: Option<Arc<dyn LlmChat>>,
        documents: Arc<DocumentStore>,
        backend: Arc<dyn IsolationBackend>,
    ) -> Self {
        let layout = LayoutEngine::new(config.layout.clone());
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            layout: Arc::new(layout),
            sandbox: Arc::new(SandboxHost::new(backend)),
            documents,
            store,
            llm,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
