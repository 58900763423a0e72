//! Sandbox host — mounts untrusted components into isolated realms.
//!
//! DESIGN
//! ======
//! Each widget owns at most one realm. `mount` always tears down the
//! widget's previous realm before opening the new one, so a remount leaves
//! exactly one live realm and every earlier object URL revoked.
//!
//! Every mount gets a fresh generation number. `unmount` takes the handle
//! returned by `mount` and is a no-op unless the handle's generation is
//! still current, so a teardown issued for an older mount never removes a
//! newer one.
//!
//! The host fails closed: when the backend's probe fails, nothing is opened
//! and the widget shows a placeholder instead.
//!
//! ERROR MODEL
//! ===========
//! - mount failures (`SandboxMountError`) leave a placeholder; the widget
//!   stays in the registry
//! - render failures inside a realm become an error panel with the message
//! - neither ever escapes as a panic or affects another widget's slot

pub mod backend;
pub mod document;
pub mod policy;

#[cfg(test)]
#[path = "scripted_test.rs"]
pub mod scripted;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::types::{AppDefinition, Widget, merge_config};
use crate::validator::{self, EntryHints, ValidationError};
use backend::{IsolationBackend, Realm, RenderOutcome};
use document::ExecutionDocument;
use policy::IsolationPolicy;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SandboxMountError {
    #[error("isolation unavailable: {0}")]
    IsolationUnavailable(String),
    #[error("invalid component source: {0}")]
    Validation(#[from] ValidationError),
    #[error("widget {widget} does not belong to app {app}")]
    AppMismatch { widget: Uuid, app: Uuid },
    #[error("realm could not be created: {0}")]
    Realm(String),
}

impl crate::error::ErrorCode for SandboxMountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::IsolationUnavailable(_) => "E_ISOLATION_UNAVAILABLE",
            Self::Validation(e) => crate::error::ErrorCode::error_code(e),
            Self::AppMismatch { .. } => "E_APP_MISMATCH",
            Self::Realm(_) => "E_REALM",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Realm(_))
    }
}

/// A component failed inside its realm. Shown in place, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Error: {message}")]
pub struct SandboxRuntimeError {
    pub message: String,
}

impl crate::error::ErrorCode for SandboxRuntimeError {
    fn error_code(&self) -> &'static str {
        "E_SANDBOX_RUNTIME"
    }
}

// =============================================================================
// VIEWS + HANDLES
// =============================================================================

/// What a widget's cell currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SandboxView {
    Mounted {
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ErrorPanel {
        url: Option<String>,
        #[serde(flatten)]
        error: SandboxRuntimeError,
    },
    Placeholder {
        reason: String,
    },
    Unmounted,
}

/// Proof of one particular mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxHandle {
    pub widget_id: Uuid,
    pub generation: u64,
}

enum Slot {
    Live { generation: u64, realm: Box<dyn Realm>, view: SandboxView },
    Failed { generation: u64, reason: String },
}

impl Slot {
    fn generation(&self) -> u64 {
        match self {
            Self::Live { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }

    fn release(self) {
        if let Self::Live { mut realm, .. } = self {
            realm.close();
        }
    }
}

// =============================================================================
// HOST
// =============================================================================

pub struct SandboxHost {
    backend: Arc<dyn IsolationBackend>,
    policy: IsolationPolicy,
    generations: AtomicU64,
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl SandboxHost {
    #[must_use]
    pub fn new(backend: Arc<dyn IsolationBackend>) -> Self {
        Self {
            backend,
            policy: IsolationPolicy,
            generations: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &IsolationPolicy {
        &self.policy
    }

    /// Mount `app` for `widget`, replacing any realm the widget already has.
    ///
    /// # Errors
    ///
    /// Returns `SandboxMountError` when isolation is unavailable, the source
    /// no longer validates, or the backend cannot open a realm. The widget's
    /// slot then shows a placeholder.
    pub fn mount(&self, app: &AppDefinition, widget: &Widget) -> Result<SandboxHandle, SandboxMountError> {
        if widget.app_id != app.id {
            return Err(SandboxMountError::AppMismatch { widget: widget.id, app: app.id });
        }
        let mut slots = self.lock();
        // Numbered under the slot lock so generations follow install order.
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = slots.remove(&widget.id) {
            debug!(widget_id = %widget.id, previous = previous.generation(), "sandbox: tearing down previous realm");
            previous.release();
        }

        match self.open_realm(app, widget) {
            Ok((realm, view)) => {
                info!(
                    widget_id = %widget.id,
                    app_id = %app.id,
                    generation,
                    backend = self.backend.name(),
                    "sandbox: mounted"
                );
                slots.insert(widget.id, Slot::Live { generation, realm, view });
                Ok(SandboxHandle { widget_id: widget.id, generation })
            }
            Err(e) => {
                warn!(widget_id = %widget.id, app_id = %app.id, error = %e, "sandbox: mount failed; showing placeholder");
                slots.insert(widget.id, Slot::Failed { generation, reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn open_realm(&self, app: &AppDefinition, widget: &Widget) -> Result<(Box<dyn Realm>, SandboxView), SandboxMountError> {
        self.backend
            .probe()
            .map_err(SandboxMountError::IsolationUnavailable)?;

        let hints = EntryHints { manifest: app.entry_point.as_deref(), name: Some(&app.name) };
        let entry = validator::validate_with(&app.source_text, hints)?;
        if let Some(warning) = entry.warning() {
            warn!(widget_id = %widget.id, %warning, "sandbox: entry point resolved by fallback");
        }

        let config = merge_config(&app.default_config, widget.config_override.as_ref());
        let document = ExecutionDocument::build(app, widget, entry, config);
        let mut realm = self.backend.open(document)?;

        let url = realm.url().map(str::to_owned);
        let view = match realm.render() {
            RenderOutcome::Rendered | RenderOutcome::Deferred => SandboxView::Mounted { url },
            RenderOutcome::Threw(message) => {
                warn!(widget_id = %widget.id, %message, "sandbox: component threw during render");
                SandboxView::ErrorPanel { url, error: SandboxRuntimeError { message } }
            }
        };
        Ok((realm, view))
    }

    /// Release the realm created by `handle`. Returns false, and leaves the
    /// slot alone, if a newer mount has replaced it.
    pub fn unmount(&self, handle: SandboxHandle) -> bool {
        let mut slots = self.lock();
        match slots.get(&handle.widget_id) {
            Some(slot) if slot.generation() == handle.generation => {
                if let Some(slot) = slots.remove(&handle.widget_id) {
                    slot.release();
                }
                info!(widget_id = %handle.widget_id, generation = handle.generation, "sandbox: unmounted");
                true
            }
            Some(slot) => {
                debug!(
                    widget_id = %handle.widget_id,
                    stale = handle.generation,
                    current = slot.generation(),
                    "sandbox: ignoring stale unmount"
                );
                false
            }
            None => false,
        }
    }

    /// Release whatever the widget currently has mounted.
    pub fn unmount_widget(&self, widget_id: Uuid) -> bool {
        let Some(slot) = self.lock().remove(&widget_id) else {
            return false;
        };
        slot.release();
        info!(%widget_id, "sandbox: unmounted");
        true
    }

    /// Release every slot whose widget is not in `keep`.
    pub fn retain(&self, keep: &HashSet<Uuid>) -> usize {
        let mut slots = self.lock();
        let gone: Vec<Uuid> = slots.keys().filter(|id| !keep.contains(id)).copied().collect();
        for id in &gone {
            if let Some(slot) = slots.remove(id) {
                slot.release();
            }
        }
        if !gone.is_empty() {
            info!(released = gone.len(), "sandbox: released realms of removed widgets");
        }
        gone.len()
    }

    #[must_use]
    pub fn view(&self, widget_id: Uuid) -> SandboxView {
        match self.lock().get(&widget_id) {
            Some(Slot::Live { view, .. }) => view.clone(),
            Some(Slot::Failed { reason, .. }) => SandboxView::Placeholder { reason: reason.clone() },
            None => SandboxView::Unmounted,
        }
    }

    #[must_use]
    pub fn handle(&self, widget_id: Uuid) -> Option<SandboxHandle> {
        self.lock()
            .get(&widget_id)
            .map(|slot| SandboxHandle { widget_id, generation: slot.generation() })
    }

    #[must_use]
    pub fn live_realms(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Live { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
