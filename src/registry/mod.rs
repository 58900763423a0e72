//! Widget registry — the single shared catalog of apps and widgets.
//!
//! DESIGN
//! ======
//! State lives in an immutable [`RegistrySnapshot`] behind an `Arc`. Every
//! mutation clones the current snapshot, applies the change, bumps the
//! revision, and swaps the `Arc` in under the write lock. Readers hold an
//! `Arc` to whichever snapshot was current when they asked, so a reader
//! never observes a half-applied change (e.g. an app gone while its widgets
//! remain).
//!
//! The epoch counter guards asynchronous app generation: a ticket records
//! the epoch at request time, and clearing apps or abandoning generations
//! advances it so late responses are discarded instead of committed.

pub mod types;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::validator::{self, EntryHints, EntryPoint, ValidationError};
use types::{AppDefinition, AppDraft, Position, SizeClass, Widget, WidgetDraft, WidgetPatch};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid component source: {0}")]
    Validation(#[from] ValidationError),
    #[error("app not found: {0}")]
    AppNotFound(Uuid),
    #[error("widget not found: {0}")]
    WidgetNotFound(Uuid),
    #[error("widget references unknown app: {0}")]
    UnknownApp(Uuid),
    #[error("app already registered: {0}")]
    DuplicateApp(Uuid),
    #[error("stale generation result: ticket epoch {ticket} < current {current}")]
    StaleGeneration { ticket: u64, current: u64 },
}

impl crate::error::ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => crate::error::ErrorCode::error_code(e),
            Self::AppNotFound(_) => "E_APP_NOT_FOUND",
            Self::WidgetNotFound(_) => "E_WIDGET_NOT_FOUND",
            Self::UnknownApp(_) => "E_UNKNOWN_APP",
            Self::DuplicateApp(_) => "E_DUPLICATE_APP",
            Self::StaleGeneration { .. } => "E_STALE_GENERATION",
        }
    }
}

/// Immutable view of the registry. Serialized form is the persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub micro_apps: Vec<AppDefinition>,
    /// Insertion order is significant: it breaks layout ties.
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(skip)]
    pub revision: u64,
    #[serde(skip)]
    pub epoch: u64,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn app(&self, id: Uuid) -> Option<&AppDefinition> {
        self.micro_apps.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn widget(&self, id: Uuid) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    fn widget_mut(&mut self, id: Uuid) -> Result<&mut Widget, RegistryError> {
        self.widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(RegistryError::WidgetNotFound(id))
    }

    /// Drop widgets whose app is missing. Used when loading persisted state.
    fn prune_orphans(&mut self) -> usize {
        let before = self.widgets.len();
        let apps: Vec<Uuid> = self.micro_apps.iter().map(|a| a.id).collect();
        self.widgets.retain(|w| apps.contains(&w.app_id));
        before - self.widgets.len()
    }
}

/// Epoch captured before an asynchronous generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// REGISTRY
// =============================================================================

pub struct Registry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(RegistrySnapshot::default())
    }

    /// Restore from persisted state, dropping widgets that reference missing apps.
    #[must_use]
    pub fn from_snapshot(mut snapshot: RegistrySnapshot) -> Self {
        let pruned = snapshot.prune_orphans();
        if pruned > 0 {
            warn!(pruned, "registry load: dropped widgets referencing missing apps");
        }
        Self { current: RwLock::new(Arc::new(snapshot)) }
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `change` to a copy of the current snapshot and publish it only
    /// if `change` succeeds.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut RegistrySnapshot) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = RegistrySnapshot::clone(&guard);
        let out = change(&mut next)?;
        next.revision += 1;
        *guard = Arc::new(next);
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Apps
    // -------------------------------------------------------------------------

    /// Validate and admit a new app.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the source is rejected; the registry is unchanged.
    pub fn add_app(&self, draft: AppDraft) -> Result<(AppDefinition, EntryPoint), RegistryError> {
        let app = AppDefinition {
            id: Uuid::new_v4(),
            name: draft.name.trim().to_owned(),
            description: draft.description.trim().to_owned(),
            icon: draft.icon,
            source_text: draft.source_text,
            default_config: draft.default_config,
            entry_point: draft.entry_point,
            created_at: now_ms(),
        };
        let entry = self.insert_app(app.clone())?;
        Ok((app, entry))
    }

    /// Validate and admit a fully-formed app (catalog install, generation).
    ///
    /// # Errors
    ///
    /// Returns `Validation` for rejected source and `DuplicateApp` if the id exists.
    pub fn insert_app(&self, app: AppDefinition) -> Result<EntryPoint, RegistryError> {
        let entry = admission_check(&app)?;
        self.commit(|s| {
            if s.app(app.id).is_some() {
                return Err(RegistryError::DuplicateApp(app.id));
            }
            info!(app_id = %app.id, name = %app.name, entry = %entry.symbol, "registry: app added");
            s.micro_apps.push(app);
            Ok(())
        })?;
        Ok(entry)
    }

    /// Remove an app and every widget that references it, in one step.
    /// Returns the ids of the removed widgets.
    ///
    /// # Errors
    ///
    /// Returns `AppNotFound` if no such app exists.
    pub fn remove_app(&self, id: Uuid) -> Result<Vec<Uuid>, RegistryError> {
        self.commit(|s| {
            let before = s.micro_apps.len();
            s.micro_apps.retain(|a| a.id != id);
            if s.micro_apps.len() == before {
                return Err(RegistryError::AppNotFound(id));
            }
            let removed = drain_widgets(s, |w| w.app_id == id);
            info!(app_id = %id, cascaded = removed.len(), "registry: app removed");
            Ok(removed)
        })
    }

    /// Remove every app (and therefore every widget). Advances the epoch.
    pub fn clear_apps(&self) -> Vec<Uuid> {
        self.commit(|s| {
            s.micro_apps.clear();
            let removed = drain_widgets(s, |_| true);
            s.epoch += 1;
            info!(cascaded = removed.len(), epoch = s.epoch, "registry: apps cleared");
            Ok(removed)
        })
        .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Widgets
    // -------------------------------------------------------------------------

    /// Place a new widget for an existing app.
    ///
    /// # Errors
    ///
    /// Returns `UnknownApp` if `draft.app_id` does not resolve.
    pub fn add_widget(&self, draft: WidgetDraft) -> Result<Widget, RegistryError> {
        self.commit(|s| {
            let app = s.app(draft.app_id).ok_or(RegistryError::UnknownApp(draft.app_id))?;
            let widget = Widget {
                id: Uuid::new_v4(),
                app_id: app.id,
                name: draft.name.unwrap_or_else(|| app.name.clone()),
                size_class: draft.size_class.unwrap_or_default(),
                position: draft.position.unwrap_or_default(),
                config_override: draft.config_override.filter(|c| !c.is_empty()),
            };
            s.widgets.push(widget.clone());
            Ok(widget)
        })
    }

    /// # Errors
    ///
    /// Returns `WidgetNotFound` if no such widget exists.
    pub fn remove_widget(&self, id: Uuid) -> Result<Widget, RegistryError> {
        self.commit(|s| {
            let idx = s
                .widgets
                .iter()
                .position(|w| w.id == id)
                .ok_or(RegistryError::WidgetNotFound(id))?;
            Ok(s.widgets.remove(idx))
        })
    }

    /// Remove every widget; apps stay installed.
    pub fn clear_widgets(&self) -> Vec<Uuid> {
        self.commit(|s| Ok(drain_widgets(s, |_| true)))
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `WidgetNotFound` if no such widget exists.
    pub fn update_widget(&self, id: Uuid, patch: WidgetPatch) -> Result<Widget, RegistryError> {
        self.commit(|s| {
            let widget = s.widget_mut(id)?;
            patch.apply(widget);
            Ok(widget.clone())
        })
    }

    /// # Errors
    ///
    /// Returns `WidgetNotFound` if no such widget exists.
    pub fn resize_widget(&self, id: Uuid, size: SizeClass) -> Result<Widget, RegistryError> {
        self.update_widget(id, WidgetPatch { size_class: Some(size), ..WidgetPatch::default() })
    }

    /// Advance to the next size class (small → medium → large → small).
    ///
    /// # Errors
    ///
    /// Returns `WidgetNotFound` if no such widget exists.
    pub fn cycle_size(&self, id: Uuid) -> Result<Widget, RegistryError> {
        self.commit(|s| {
            let widget = s.widget_mut(id)?;
            widget.size_class = widget.size_class.next();
            Ok(widget.clone())
        })
    }

    /// # Errors
    ///
    /// Returns `WidgetNotFound` if no such widget exists.
    pub fn move_widget(&self, id: Uuid, position: Position) -> Result<Widget, RegistryError> {
        self.update_widget(id, WidgetPatch { position: Some(position), ..WidgetPatch::default() })
    }

    /// Write a batch of positions in one step. Unknown ids are skipped and returned.
    pub fn apply_positions(&self, positions: &[(Uuid, Position)]) -> Vec<Uuid> {
        self.commit(|s| {
            let mut unknown = Vec::new();
            for (id, position) in positions {
                match s.widget_mut(*id) {
                    Ok(widget) => widget.position = *position,
                    Err(_) => unknown.push(*id),
                }
            }
            Ok(unknown)
        })
        .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Generation tickets
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn generation_ticket(&self) -> GenerationTicket {
        GenerationTicket { epoch: self.snapshot().epoch }
    }

    /// Invalidate every outstanding generation ticket.
    pub fn abandon_generations(&self) -> u64 {
        self.commit(|s| {
            s.epoch += 1;
            Ok(s.epoch)
        })
        .unwrap_or_default()
    }

    /// Admit a generated app only if no clear/abandon happened since `ticket`.
    ///
    /// # Errors
    ///
    /// Returns `StaleGeneration` for an outdated ticket, or the `insert_app` errors.
    pub fn commit_generated(&self, ticket: GenerationTicket, app: AppDefinition) -> Result<EntryPoint, RegistryError> {
        let entry = admission_check(&app)?;
        self.commit(|s| {
            if ticket.epoch < s.epoch {
                return Err(RegistryError::StaleGeneration { ticket: ticket.epoch, current: s.epoch });
            }
            if s.app(app.id).is_some() {
                return Err(RegistryError::DuplicateApp(app.id));
            }
            info!(app_id = %app.id, name = %app.name, "registry: generated app committed");
            s.micro_apps.push(app);
            Ok(())
        })?;
        Ok(entry)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Registry {
    /// Publish `snapshot` without any integrity checks, for exercising the
    /// defensive paths that read a corrupted registry.
    pub fn publish_unchecked(&self, mut snapshot: RegistrySnapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.revision = guard.revision + 1;
        *guard = Arc::new(snapshot);
    }
}

/// Run the validator with the app's manifest and name hints.
fn admission_check(app: &AppDefinition) -> Result<EntryPoint, RegistryError> {
    let hints = EntryHints { manifest: app.entry_point.as_deref(), name: Some(&app.name) };
    let entry = validator::validate_with(&app.source_text, hints)?;
    if let Some(warning) = entry.warning() {
        warn!(app_id = %app.id, name = %app.name, %warning, "registry: entry point not unambiguous");
    }
    Ok(entry)
}

fn drain_widgets(s: &mut RegistrySnapshot, pred: impl Fn(&Widget) -> bool) -> Vec<Uuid> {
    let mut removed = Vec::new();
    s.widgets.retain(|w| {
        if pred(w) {
            removed.push(w.id);
            false
        } else {
            true
        }
    });
    removed
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
