use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Preparing,
    Indexing,
    Hashing,
    Grouping,
    Reviewing,
    Cleaning,
    Completed,
    Failed,
}

/// Fixed order of every phase except `Failed`.
pub const PHASE_ORDER: [SessionPhase; 7] = [
    SessionPhase::Preparing,
    SessionPhase::Indexing,
    SessionPhase::Hashing,
    SessionPhase::Grouping,
    SessionPhase::Reviewing,
    SessionPhase::Cleaning,
    SessionPhase::Completed,
];

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Failed)
    }

    /// Position in [`PHASE_ORDER`]; `None` for `Failed`.
    pub fn order_index(self) -> Option<usize> {
        PHASE_ORDER.iter().position(|&p| p == self)
    }

    /// Whether `to` is a legal forward step from `self`. `Cleaning` may be
    /// skipped on the way from `Reviewing` to `Completed`.
    pub fn can_advance_to(self, to: SessionPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == SessionPhase::Failed {
            return true;
        }
        if self == SessionPhase::Reviewing && to == SessionPhase::Completed {
            return true;
        }
        match (self.order_index(), to.order_index()) {
            (Some(from), Some(next)) => next == from + 1,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Preparing => "preparing",
            SessionPhase::Indexing => "indexing",
            SessionPhase::Hashing => "hashing",
            SessionPhase::Grouping => "grouping",
            SessionPhase::Reviewing => "reviewing",
            SessionPhase::Cleaning => "cleaning",
            SessionPhase::Completed => "completed",
            SessionPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

#[derive(Debug, Clone)]
pub struct ScanPhaseStateMachine {
    current: SessionPhase,
    /// Last non-failed phase; drives progress once the session has failed.
    last_ordered: SessionPhase,
}

impl Default for ScanPhaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanPhaseStateMachine {
    pub fn new() -> Self {
        Self {
            current: SessionPhase::Preparing,
            last_ordered: SessionPhase::Preparing,
        }
    }

    pub fn current(&self) -> SessionPhase {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn advance(&mut self, to: SessionPhase) -> Result<PhaseTransition, Error> {
        let from = self.current;
        if !from.can_advance_to(to) {
            warn!("Rejected phase transition {} -> {}", from, to);
            return Err(Error::IllegalPhaseTransition { from, to });
        }

        self.current = to;
        if to != SessionPhase::Failed {
            self.last_ordered = to;
        }
        info!("Scan phase {} -> {}", from, to);
        Ok(PhaseTransition { from, to })
    }

    /// `index(phase) / (PHASE_ORDER.len() - 1)`. A failed session reports the
    /// progress of the phase it failed from.
    pub fn progress_fraction(&self) -> f64 {
        let index = self.last_ordered.order_index().unwrap_or(0);
        index as f64 / (PHASE_ORDER.len() - 1) as f64
    }

    /// Return to `Preparing`; only allowed from a terminal phase.
    pub fn reset(&mut self) -> Result<PhaseTransition, Error> {
        let from = self.current;
        if !from.is_terminal() {
            warn!("Rejected reset while {}", from);
            return Err(Error::IllegalPhaseTransition {
                from,
                to: SessionPhase::Preparing,
            });
        }
        *self = Self::new();
        Ok(PhaseTransition {
            from,
            to: SessionPhase::Preparing,
        })
    }
}
