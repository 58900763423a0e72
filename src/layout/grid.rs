//! Grid math: breakpoints, footprints, and deterministic compaction.
//!
//! DESIGN
//! ======
//! `compute_layout` is a pure function of `(widgets, columns, footprints)`.
//! Widgets are ordered by their advisory `(row, column)` with insertion
//! order breaking ties (stable sort), then placed one at a time:
//!
//! - a widget keeps its column (clamped so it fits) and, if its advisory
//!   cell is free, floats up to the highest free row in that column
//! - a widget whose advisory cell is already taken lost the contest and is
//!   dropped into the first free slot scanning rows top-to-bottom and
//!   columns left-to-right
//!
//! Columns chosen by the user therefore survive every recompute, rows are
//! compacted vertically, and no two entries ever overlap.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LayoutError;
use crate::registry::types::{SizeClass, Widget};

pub const DEFAULT_BREAKPOINTS: [u32; 3] = [640, 768, 1024];

// =============================================================================
// BREAKPOINTS
// =============================================================================

/// Ascending viewport-width thresholds. `n` thresholds yield `1..=n+1` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoints {
    thresholds: Vec<u32>,
}

impl Breakpoints {
    /// # Errors
    ///
    /// Returns `InvalidBreakpoints` unless thresholds are strictly ascending.
    pub fn new(thresholds: Vec<u32>) -> Result<Self, LayoutError> {
        if thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(LayoutError::InvalidBreakpoints(format!("{thresholds:?} is not strictly ascending")));
        }
        Ok(Self { thresholds })
    }

    /// Column count for a viewport width. Total over all widths.
    #[must_use]
    pub fn columns_for_width(&self, width: u32) -> u32 {
        let idx = self
            .thresholds
            .iter()
            .position(|t| width < *t)
            .unwrap_or(self.thresholds.len());
        u32::try_from(idx + 1).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn max_columns(&self) -> u32 {
        u32::try_from(self.thresholds.len() + 1).unwrap_or(u32::MAX)
    }
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self { thresholds: DEFAULT_BREAKPOINTS.to_vec() }
    }
}

// =============================================================================
// FOOTPRINTS
// =============================================================================

/// Size in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootprintTable {
    pub small: Footprint,
    pub medium: Footprint,
    pub large: Footprint,
}

impl FootprintTable {
    #[must_use]
    pub fn get(&self, size: SizeClass) -> Footprint {
        match size {
            SizeClass::Small => self.small,
            SizeClass::Medium => self.medium,
            SizeClass::Large => self.large,
        }
    }

    /// Footprint with width clamped to `[1, columns]`.
    #[must_use]
    pub fn clamped(&self, size: SizeClass, columns: u32) -> Footprint {
        let fp = self.get(size);
        Footprint { w: fp.w.clamp(1, columns.max(1)), h: fp.h.max(1) }
    }
}

impl Default for FootprintTable {
    fn default() -> Self {
        Self {
            small: Footprint { w: 1, h: 1 },
            medium: Footprint { w: 2, h: 1 },
            large: Footprint { w: 3, h: 1 },
        }
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Screen placement of one widget. Derived, never authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub widget_id: Uuid,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Row-major occupancy map that grows downward on demand.
struct Occupancy {
    columns: usize,
    rows: Vec<Vec<bool>>,
}

impl Occupancy {
    fn new(columns: u32) -> Self {
        Self { columns: columns as usize, rows: Vec::new() }
    }

    fn is_free(&self, x: usize, y: usize, w: usize, h: usize) -> bool {
        (y..y + h).all(|row| {
            self.rows
                .get(row)
                .is_none_or(|cells| cells[x..x + w].iter().all(|taken| !taken))
        })
    }

    fn fill(&mut self, x: usize, y: usize, w: usize, h: usize) {
        while self.rows.len() < y + h {
            self.rows.push(vec![false; self.columns]);
        }
        for row in &mut self.rows[y..y + h] {
            for cell in &mut row[x..x + w] {
                *cell = true;
            }
        }
    }

    /// First slot in row-major order that fits `w × h`. Always terminates:
    /// the row after the last occupied one is empty and `w <= columns`.
    fn first_fit(&self, w: usize, h: usize) -> (usize, usize) {
        let mut y = 0;
        loop {
            for x in 0..=(self.columns - w) {
                if self.is_free(x, y, w, h) {
                    return (x, y);
                }
            }
            y += 1;
        }
    }

    /// Highest free row at column `x` reachable by sliding up from `y`.
    /// `None` when `(x, y)` itself is taken.
    fn float_up(&self, x: usize, y: usize, w: usize, h: usize) -> Option<usize> {
        // Rows past the occupied height are empty.
        let y = y.min(self.rows.len());
        if !self.is_free(x, y, w, h) {
            return None;
        }
        let mut top = y;
        while top > 0 && self.is_free(x, top - 1, w, h) {
            top -= 1;
        }
        Some(top)
    }
}

/// Compute a non-overlapping layout. Entries come back in `widgets` order.
#[must_use]
pub fn compute_layout(widgets: &[Widget], columns: u32, footprints: &FootprintTable) -> Vec<LayoutEntry> {
    let columns = columns.max(1);
    let mut order: Vec<usize> = (0..widgets.len()).collect();
    order.sort_by_key(|&i| (widgets[i].position.y, widgets[i].position.x));

    let mut grid = Occupancy::new(columns);
    let mut placed: Vec<Option<LayoutEntry>> = vec![None; widgets.len()];

    for i in order {
        let widget = &widgets[i];
        let fp = footprints.clamped(widget.size_class, columns);
        let (w, h) = (fp.w as usize, fp.h as usize);
        let want_x = (widget.position.x as usize).min(grid.columns - w);
        let (x, y) = match grid.float_up(want_x, widget.position.y as usize, w, h) {
            Some(y) => (want_x, y),
            None => grid.first_fit(w, h),
        };
        grid.fill(x, y, w, h);
        placed[i] = Some(LayoutEntry {
            widget_id: widget.id,
            x: u32::try_from(x).unwrap_or(u32::MAX),
            y: u32::try_from(y).unwrap_or(u32::MAX),
            w: fp.w,
            h: fp.h,
        });
    }

    placed.into_iter().flatten().collect()
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod tests;
