//! Synchronous UI state for the cart drawer.
//!
//! [`UiState::reduce`] is the only place state changes. It is a total, pure
//! function of `(state, event)`: no I/O, no scheduling, nothing that can fail.
//! [`CartUiStore`] wraps it in a shared context object that components read
//! snapshots from and send [`UiEvent`]s to.

use std::collections::BTreeMap;
use std::sync::Arc;

use cartflow_core::{LineId, OperationId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::intent::MutationKind;

/// Line id → quantity the user asked for. Entries ≤ 0 are removals.
pub type OptimisticDelta = BTreeMap<LineId, i64>;

/// Unconfirmed per-line quantities. Never holds a quantity ≤ 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimisticLines {
    lines: BTreeMap<LineId, i64>,
}

impl OptimisticLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, line_id: &LineId) -> Option<i64> {
        self.lines.get(line_id).copied()
    }

    pub fn contains(&self, line_id: &LineId) -> bool {
        self.lines.contains_key(line_id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LineId, i64)> {
        self.lines.iter().map(|(id, quantity)| (id, *quantity))
    }
}

/// Overlays `delta` on `current`; the delta wins for keys present in both.
pub fn merge(current: &BTreeMap<LineId, i64>, delta: &OptimisticDelta) -> BTreeMap<LineId, i64> {
    let mut merged = current.clone();
    merged.extend(delta.iter().map(|(id, quantity)| (id.clone(), *quantity)));
    merged
}

/// Drops every entry whose quantity is ≤ 0.
pub fn prune(mut lines: BTreeMap<LineId, i64>) -> BTreeMap<LineId, i64> {
    lines.retain(|_, quantity| *quantity > 0);
    lines
}

pub fn merge_optimistic_lines(current: &OptimisticLines, delta: &OptimisticDelta) -> OptimisticLines {
    OptimisticLines {
        lines: prune(merge(&current.lines, delta)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    Pending,
    Succeeded,
    Failed { message: String },
}

/// Most recently attempted mutation, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub id: OperationId,
    pub kind: MutationKind,
    pub outcome: OperationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub open: bool,
    pub pending: u32,
    pub optimistic_lines: OptimisticLines,
    pub last_operation: Option<LastOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Open,
    Close,
    Toggle,
    PendingInc,
    PendingDec,
    SetLastOperation(Option<LastOperation>),
    OptimisticLinesUpdate(OptimisticDelta),
    OptimisticClear,
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Toggle => "TOGGLE",
            Self::PendingInc => "PENDING_INC",
            Self::PendingDec => "PENDING_DEC",
            Self::SetLastOperation(_) => "SET_LAST_OPERATION",
            Self::OptimisticLinesUpdate(_) => "OPTIMISTIC_LINES_UPDATE",
            Self::OptimisticClear => "OPTIMISTIC_CLEAR",
        }
    }
}

impl UiState {
    pub fn is_pending(&self) -> bool {
        self.pending > 0
    }

    pub fn reduce(&self, event: &UiEvent) -> UiState {
        let mut next = self.clone();
        match event {
            UiEvent::Open => next.open = true,
            UiEvent::Close => next.open = false,
            UiEvent::Toggle => next.open = !self.open,
            UiEvent::PendingInc => next.pending = self.pending.saturating_add(1),
            // Clamped: a double-fired or out-of-order DEC must not underflow.
            UiEvent::PendingDec => next.pending = self.pending.saturating_sub(1),
            UiEvent::SetLastOperation(value) => next.last_operation = value.clone(),
            UiEvent::OptimisticLinesUpdate(delta) => {
                next.optimistic_lines = merge_optimistic_lines(&self.optimistic_lines, delta);
            }
            UiEvent::OptimisticClear => next.optimistic_lines = OptimisticLines::new(),
        }
        next
    }
}

/// Shared handle to one [`UiState`]. Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct CartUiStore {
    state: Arc<watch::Sender<UiState>>,
}

impl Default for CartUiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartUiStore {
    pub fn new() -> Self {
        Self::with_state(UiState::default())
    }

    pub fn with_state(state: UiState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { state: Arc::new(tx) }
    }

    /// Applies `event`. Subscribers are only woken if the state changed.
    pub fn send(&self, event: UiEvent) {
        let changed = self.state.send_if_modified(|state| {
            let next = state.reduce(&event);
            if next == *state {
                return false;
            }
            *state = next;
            true
        });
        tracing::trace!(event = event.name(), changed, "cart ui event");
    }

    pub fn snapshot(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn pending(&self) -> u32 {
        self.state.borrow().pending
    }

    pub fn optimistic_lines(&self) -> OptimisticLines {
        self.state.borrow().optimistic_lines.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }
}
