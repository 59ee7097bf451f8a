//! Input-method composition ("marked text") tracking
//!
//! The host's input method keeps an uncommitted composition that the engine
//! only knows as ordinary inserted text. This module decides how many cells to
//! delete, which cells to unmark and where the composition is anchored so the
//! two views stay consistent. Widths are always screen cells, never chars.

use crate::screen::{CellPos, ScreenGrid};
use unicode_width::UnicodeWidthStr;

/// Screen cells occupied by `text`
pub fn cell_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// An open composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionState {
    /// Never empty while the state exists
    pub marked_text: String,
    pub anchor: CellPos,
}

/// What the engine has to receive for a mark transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkPlan {
    /// Backspaces removing the previous marked text
    pub backspaces: usize,
    /// Text to insert afterwards; `None` when the composition was cancelled
    pub insert: Option<String>,
}

/// What has to happen before finalized input is forwarded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputPlan {
    /// Cells to unmark on the host, in emission order
    pub unmark: Vec<CellPos>,
    pub backspaces: usize,
}

/// Composition state machine: Idle (`state == None`) or Composing
#[derive(Debug, Default)]
pub struct Composition {
    state: Option<CompositionState>,
    pending_delta: i64,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_composing(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&CompositionState> {
        self.state.as_ref()
    }

    pub fn marked_text(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.marked_text.as_str())
    }

    pub fn pending_delta(&self) -> i64 {
        self.pending_delta
    }

    /// Begin or update the composition with `text`
    ///
    /// Opening captures the anchor from `cursor`, shifted by the pending
    /// delete delta, which is consumed. Updating deletes the previous marked
    /// text first. Empty text cancels an open composition.
    pub fn mark(&mut self, text: &str, cursor: CellPos) -> MarkPlan {
        let backspaces = match &self.state {
            Some(state) => cell_width(&state.marked_text),
            None => 0,
        };

        if text.is_empty() {
            if self.state.take().is_some() {
                tracing::debug!(backspaces, "composition cancelled");
            }
            return MarkPlan {
                backspaces,
                insert: None,
            };
        }

        match &mut self.state {
            Some(state) => {
                state.marked_text = text.to_string();
            }
            None => {
                let col = (i64::from(cursor.col) + self.pending_delta).max(0) as u32;
                let anchor = CellPos::new(cursor.row, col);
                tracing::debug!(?anchor, delta = self.pending_delta, "composition opened");
                self.pending_delta = 0;
                self.state = Some(CompositionState {
                    marked_text: text.to_string(),
                    anchor,
                });
            }
        }

        MarkPlan {
            backspaces,
            insert: Some(text.to_string()),
        }
    }

    /// Close the composition because finalized `text` arrived
    ///
    /// When the final text equals the marked text the engine will not redraw
    /// those cells, so each previously marked cell is unmarked explicitly,
    /// walking backward from `cursor`.
    pub fn resolve_input(&mut self, text: &str, cursor: CellPos) -> InputPlan {
        let Some(state) = self.state.take() else {
            return InputPlan::default();
        };

        let cells = cell_width(&state.marked_text);
        let unmark = if state.marked_text == text {
            (1..=cells)
                .filter_map(|i| {
                    let col = i64::from(cursor.col) - i as i64;
                    (col >= 0).then(|| CellPos::new(cursor.row, col as u32))
                })
                .collect()
        } else {
            Vec::new()
        };

        InputPlan {
            unmark,
            backspaces: cells,
        }
    }

    /// Record a host delete request of `count` characters
    ///
    /// Only an idle delete feeds the delete-before-mark shim; a delete inside
    /// an open composition is left to the next mark update.
    pub fn record_delete(&mut self, count: usize, grid: &ScreenGrid, cursor: CellPos) {
        if self.is_composing() {
            return;
        }
        self.pending_delta += compat::precomposed_delete_delta(grid, cursor, count);
        tracing::debug!(
            count,
            pending_delta = self.pending_delta,
            "delete before mark"
        );
    }

    /// Whether a put of `text` at `pos` belongs to the composition
    ///
    /// Only the anchor cell is marked, plus the empty cell right after it so
    /// zero-width compositions keep a marked cell.
    pub fn covers(&self, pos: CellPos, text: &str) -> bool {
        let Some(state) = &self.state else {
            return false;
        };
        let anchor = state.anchor;
        pos.row == anchor.row
            && (pos.col == anchor.col || (text.is_empty() && pos.col == anchor.col + 1))
    }
}

/// Compatibility shim for one host input-method quirk
///
/// Some input methods finalize a precomposed character by first deleting
/// what they inserted and only then reporting the replacement composition.
/// The anchor of that composition has to be shifted left by what the delete
/// removed from the screen. This is a heuristic for that sequence only: walk
/// backward from the cursor, one step per deleted character, and count an
/// empty or space cell as two. A blank in column 0 still counts as two; the
/// anchor is clamped to column 0 when the delta is applied.
pub mod compat {
    use crate::screen::{CellPos, ScreenGrid};

    pub fn precomposed_delete_delta(grid: &ScreenGrid, cursor: CellPos, count: usize) -> i64 {
        let mut delta = 0i64;
        let mut col = i64::from(cursor.col);
        for _ in 0..count {
            if col <= 0 {
                break;
            }
            col -= 1;
            if grid.is_blank(cursor.row, col as u32) {
                delta -= 2;
                col -= 1;
            } else {
                delta -= 1;
            }
        }
        delta
    }
}
