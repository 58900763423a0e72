//! Layout engine — responsive grid placement for dashboard widgets.
//!
//! DESIGN
//! ======
//! The engine owns the current column count and the last computed layout.
//! Widget positions in the registry are the only durable input; the layout
//! is regenerated from them whenever the widget set or column count
//! changes.
//!
//! A user rearrangement writes the new positions into the registry in one
//! batch *and* recomputes while holding the engine lock, so a concurrent
//! programmatic recompute (column change, widget added) either runs before
//! and is superseded, or runs after and already sees the user's positions.
//! Nothing the user placed is silently dropped.

pub mod grid;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::types::Position;
use crate::registry::{Registry, RegistrySnapshot};
use grid::{Breakpoints, FootprintTable, LayoutEntry};

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid breakpoints: {0}")]
    InvalidBreakpoints(String),
    #[error("invalid footprint: {0}")]
    InvalidFootprint(String),
    #[error("column count must be at least 1")]
    ZeroColumns,
}

impl crate::error::ErrorCode for LayoutError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBreakpoints(_) => "E_INVALID_BREAKPOINTS",
            Self::InvalidFootprint(_) => "E_INVALID_FOOTPRINT",
            Self::ZeroColumns => "E_ZERO_COLUMNS",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutConfig {
    pub breakpoints: Breakpoints,
    pub footprints: FootprintTable,
}

/// Last computed layout; also the persisted layout format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutState {
    pub columns: u32,
    pub entries: Vec<LayoutEntry>,
    /// Registry revision the entries were computed from.
    #[serde(skip)]
    pub revision: Option<u64>,
}

pub struct LayoutEngine {
    config: LayoutConfig,
    state: Mutex<LayoutState>,
}

impl LayoutEngine {
    /// Engine starting at the widest column count.
    #[must_use]
    pub fn new(config: LayoutConfig) -> Self {
        let columns = config.breakpoints.max_columns();
        Self { config, state: Mutex::new(LayoutState { columns, entries: Vec::new(), revision: None }) }
    }

    #[must_use]
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    #[must_use]
    pub fn columns_for_width(&self, width: u32) -> u32 {
        self.config.breakpoints.columns_for_width(width)
    }

    /// Pure layout for an arbitrary widget set and column count.
    #[must_use]
    pub fn compute(&self, snapshot: &RegistrySnapshot, columns: u32) -> Vec<LayoutEntry> {
        grid::compute_layout(&snapshot.widgets, columns, &self.config.footprints)
    }

    #[must_use]
    pub fn current(&self) -> LayoutState {
        self.lock().clone()
    }

    /// Recompute if the registry changed since the last computation.
    pub fn refresh(&self, snapshot: &RegistrySnapshot) -> LayoutState {
        let mut state = self.lock();
        if state.revision != Some(snapshot.revision) {
            state.entries = self.compute(snapshot, state.columns);
            state.revision = Some(snapshot.revision);
            debug!(revision = snapshot.revision, columns = state.columns, "layout: recomputed");
        }
        state.clone()
    }

    /// Switch to a new column count and recompute.
    ///
    /// # Errors
    ///
    /// Returns `ZeroColumns` when `columns == 0`.
    pub fn on_column_count_change(&self, snapshot: &RegistrySnapshot, columns: u32) -> Result<LayoutState, LayoutError> {
        if columns == 0 {
            return Err(LayoutError::ZeroColumns);
        }
        let mut state = self.lock();
        if state.columns != columns || state.revision != Some(snapshot.revision) {
            info!(from = state.columns, to = columns, "layout: column count changed");
            state.columns = columns;
            state.entries = self.compute(snapshot, columns);
            state.revision = Some(snapshot.revision);
        }
        Ok(state.clone())
    }

    /// Accept a user-dragged layout as authoritative: persist its positions
    /// into the registry and recompute. Entries for unknown widgets are
    /// ignored; widgets absent from `new_layout` keep their positions.
    pub fn on_user_rearrange(&self, registry: &Registry, new_layout: &[LayoutEntry]) -> LayoutState {
        let mut state = self.lock();
        let positions: Vec<(Uuid, Position)> = new_layout
            .iter()
            .map(|e| (e.widget_id, Position::new(e.x, e.y)))
            .collect();
        let unknown = registry.apply_positions(&positions);
        if !unknown.is_empty() {
            warn!(count = unknown.len(), "layout: rearrangement referenced unknown widgets");
        }
        let snapshot = registry.snapshot();
        state.entries = self.compute(&snapshot, state.columns);
        state.revision = Some(snapshot.revision);
        info!(widgets = state.entries.len(), "layout: user rearrangement applied");
        state.clone()
    }

    /// Adopt a persisted layout if it still matches the registry; otherwise
    /// regenerate from the registry, which is authoritative for sizes.
    pub fn restore(&self, snapshot: &RegistrySnapshot, persisted: Option<LayoutState>) -> LayoutState {
        let mut state = self.lock();
        match persisted {
            Some(layout) if self.agrees_with(&layout, snapshot) => {
                state.columns = layout.columns;
                state.entries = layout.entries;
            }
            Some(layout) => {
                warn!(
                    persisted = layout.entries.len(),
                    widgets = snapshot.widgets.len(),
                    "layout: persisted layout disagrees with registry; regenerating"
                );
                state.columns = layout.columns.clamp(1, self.config.breakpoints.max_columns());
                state.entries = self.compute(snapshot, state.columns);
            }
            None => state.entries = self.compute(snapshot, state.columns),
        }
        state.revision = Some(snapshot.revision);
        state.clone()
    }

    /// A persisted layout is usable only if it covers exactly the registry's
    /// widgets, sizes every entry from the registry's size class, stays
    /// inside the grid and has no overlaps.
    fn agrees_with(&self, layout: &LayoutState, snapshot: &RegistrySnapshot) -> bool {
        let columns = layout.columns;
        if columns == 0 || columns > self.config.breakpoints.max_columns() {
            return false;
        }
        let laid_out: HashSet<Uuid> = layout.entries.iter().map(|e| e.widget_id).collect();
        let widgets: HashSet<Uuid> = snapshot.widgets.iter().map(|w| w.id).collect();
        if laid_out.len() != layout.entries.len() || laid_out != widgets {
            return false;
        }

        let mut taken: HashSet<(u32, u32)> = HashSet::new();
        layout.entries.iter().all(|entry| {
            let Some(widget) = snapshot.widget(entry.widget_id) else {
                return false;
            };
            let fp = self.config.footprints.clamped(widget.size_class, columns);
            if (entry.w, entry.h) != (fp.w, fp.h) || entry.x.saturating_add(entry.w) > columns {
                return false;
            }
            (entry.x..entry.x + entry.w)
                .flat_map(|x| (entry.y..entry.y.saturating_add(entry.h)).map(move |y| (x, y)))
                .all(|cell| taken.insert(cell))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LayoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
