// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history for curve edits.
//!
//! Every committed edit stores a bincode snapshot of the editor state before
//! and after it. Undo and redo restore whole snapshots; selection is not part
//! of the snapshot and is revalidated by the session afterwards.

use crate::curve::{CurveSet, CurveWrapper};
use crate::draw_order::DrawOrder;
use crate::events::AnimationEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default undo history depth
const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Unique operation ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationID(u64);

impl OperationID {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Editor state captured for undo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSnapshot {
    /// Curves in insertion order
    pub curves: Vec<CurveWrapper>,
    /// Draw order
    pub draw_order: DrawOrder,
    /// Clip events
    pub events: Vec<AnimationEvent>,
}

impl EditorSnapshot {
    /// Capture curves, draw order and events
    pub fn capture(curves: &CurveSet, draw_order: &DrawOrder, events: &[AnimationEvent]) -> Self {
        Self {
            curves: curves.values().cloned().collect(),
            draw_order: draw_order.clone(),
            events: events.to_vec(),
        }
    }

    /// Rebuild the curve set
    pub fn curve_set(&self) -> CurveSet {
        self.curves.iter().map(|c| (c.id, c.clone())).collect()
    }
}

/// Serialized state (copy-on-write data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized state
    pub data: Vec<u8>,
    /// Timestamp when snapshot was taken
    pub timestamp: u64,
    /// Size in bytes
    pub size: usize,
}

impl StateSnapshot {
    /// Create a new state snapshot
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            timestamp: now_secs(),
            size,
        }
    }

    /// Create from serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        let data = bincode::serialize(value)?;
        Ok(Self::new(data))
    }

    /// Deserialize to value
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Whether two snapshots hold the same bytes
    pub fn same_data(&self, other: &StateSnapshot) -> bool {
        self.data == other.data
    }
}

/// An edit that can be undone/redone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation ID
    pub id: OperationID,
    /// Human-readable description
    pub description: String,
    /// State before the edit (for undo)
    pub before: StateSnapshot,
    /// State after the edit (for redo)
    pub after: StateSnapshot,
    /// Timestamp
    pub timestamp: u64,
}

impl Operation {
    /// Get memory size of this operation
    pub fn memory_size(&self) -> usize {
        self.before.size + self.after.size
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Total operations in undo stack
    pub undo_count: usize,
    /// Total operations in redo stack
    pub redo_count: usize,
    /// Total memory used by history (bytes)
    pub memory_used: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    /// Undo stack
    undo_stack: VecDeque<Operation>,
    /// Redo stack
    redo_stack: VecDeque<Operation>,
    /// Next operation ID
    next_id: u64,
    /// Maximum history depth
    max_depth: usize,
    /// Total memory used
    memory_used: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth: max_depth.max(1),
            memory_used: 0,
        }
    }

    /// Record an edit. Edits whose snapshots are identical are dropped.
    pub fn commit(&mut self, description: impl Into<String>, before: StateSnapshot, after: StateSnapshot) -> Option<OperationID> {
        if before.same_data(&after) {
            return None;
        }

        let id = OperationID(self.next_id);
        self.next_id += 1;
        let operation = Operation {
            id,
            description: description.into(),
            before,
            after,
            timestamp: now_secs(),
        };

        // Clear redo stack
        self.redo_stack.clear();

        self.memory_used += operation.memory_size();
        tracing::debug!(id = id.value(), description = %operation.description, "Recorded edit");
        self.undo_stack.push_back(operation);

        // Enforce history limit
        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }

        Some(id)
    }

    /// Undo the last operation
    pub fn undo(&mut self) -> Result<Operation> {
        let operation = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;

        self.memory_used = self.memory_used.saturating_sub(operation.memory_size());
        self.redo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Redo the last undone operation
    pub fn redo(&mut self) -> Result<Operation> {
        let operation = self
            .redo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToRedo)?;

        self.memory_used += operation.memory_size();
        self.undo_stack.push_back(operation.clone());

        Ok(operation)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|op| op.description.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|op| op.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
