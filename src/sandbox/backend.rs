//! Isolation backends — where realms actually come from.
//!
//! DESIGN
//! ======
//! [`IsolationBackend`] is the seam between the sandbox host and the
//! mechanism that provides isolation. The production [`FrameBackend`]
//! publishes each execution document under a revocable, unguessable object
//! URL served from `/sandbox/{token}`; the browser loads it into a sandboxed
//! iframe, so component code never runs in this process. Tests substitute a
//! scripted backend that simulates execution.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::SandboxMountError;
use super::document::ExecutionDocument;

// =============================================================================
// TRAITS
// =============================================================================

/// Result of the initial render inside a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// Rendering happens out of process; failures surface in the realm's own
    /// error panel.
    Deferred,
    /// The component threw during its initial render.
    Threw(String),
}

/// One isolated execution context. Exclusively owned by a single mount.
pub trait Realm: Send {
    /// Object URL the realm's document is served under, if any.
    fn url(&self) -> Option<&str>;

    fn render(&mut self) -> RenderOutcome;

    /// Release every resource the realm holds. Must be idempotent.
    fn close(&mut self);
}

pub trait IsolationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check the isolation mechanism is usable.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when it is not.
    fn probe(&self) -> Result<(), String>;

    /// Establish a fresh realm for `document`.
    ///
    /// # Errors
    ///
    /// Returns `SandboxMountError` when the realm cannot be created.
    fn open(&self, document: ExecutionDocument) -> Result<Box<dyn Realm>, SandboxMountError>;
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Counters for object URLs handed out by a [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectUrlStats {
    pub allocated: u64,
    pub revoked: u64,
    pub live: u64,
}

/// Published realm documents keyed by random token.
pub struct DocumentStore {
    base: String,
    documents: Mutex<HashMap<String, Arc<str>>>,
    allocated: AtomicU64,
    revoked: AtomicU64,
}

impl DocumentStore {
    #[must_use]
    pub fn new(public_base: &str) -> Self {
        Self {
            base: public_base.trim_end_matches('/').to_owned(),
            documents: Mutex::new(HashMap::new()),
            allocated: AtomicU64::new(0),
            revoked: AtomicU64::new(0),
        }
    }

    /// Store `html` and return its token.
    pub fn publish(&self, html: String) -> String {
        let token = generate_token();
        self.lock().insert(token.clone(), Arc::from(html));
        self.allocated.fetch_add(1, Ordering::SeqCst);
        token
    }

    #[must_use]
    pub fn url_for(&self, token: &str) -> String {
        format!("{}/{token}", self.base)
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<Arc<str>> {
        self.lock().get(token).cloned()
    }

    /// Drop a document. Returns false if the token was not live.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.lock().remove(token).is_some();
        if removed {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    #[must_use]
    pub fn stats(&self) -> ObjectUrlStats {
        let live = self.lock().len() as u64;
        ObjectUrlStats {
            allocated: self.allocated.load(Ordering::SeqCst),
            revoked: self.revoked.load(Ordering::SeqCst),
            live,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<str>>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

// =============================================================================
// FRAME BACKEND
// =============================================================================

/// Production backend: realms are sandboxed iframes in the client.
pub struct FrameBackend {
    store: Arc<DocumentStore>,
    enabled: bool,
}

impl FrameBackend {
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, enabled: bool) -> Self {
        Self { store, enabled }
    }
}

impl IsolationBackend for FrameBackend {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn probe(&self) -> Result<(), String> {
        if self.enabled {
            Ok(())
        } else {
            Err("sandbox isolation is disabled by configuration".into())
        }
    }

    fn open(&self, document: ExecutionDocument) -> Result<Box<dyn Realm>, SandboxMountError> {
        let token = self.store.publish(document.html);
        let url = self.store.url_for(&token);
        debug!(widget_id = %document.widget_id, %url, "sandbox: document published");
        Ok(Box::new(FrameRealm { store: Arc::clone(&self.store), token: Some(token), url }))
    }
}

struct FrameRealm {
    store: Arc<DocumentStore>,
    token: Option<String>,
    url: String,
}

impl Realm for FrameRealm {
    fn url(&self) -> Option<&str> {
        self.token.as_ref().map(|_| self.url.as_str())
    }

    fn render(&mut self) -> RenderOutcome {
        RenderOutcome::Deferred
    }

    fn close(&mut self) {
        if let Some(token) = self.token.take() {
            self.store.revoke(&token);
        }
    }
}

impl Drop for FrameRealm {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;
