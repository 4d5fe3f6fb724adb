use crate::session::SessionPhase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid threshold: {0} (must be finite and greater than zero)")]
    InvalidThreshold(f64),

    #[error("Invalid distance: {0} (must not be negative)")]
    InvalidDistance(f64),

    #[error("Invalid weight {weight} for signal '{signal_id}' (must be finite and greater than zero)")]
    InvalidWeight { signal_id: String, weight: f64 },

    #[error("Unknown signal id: {0}")]
    UnknownSignalId(String),

    #[error("Duplicate signal id: {0}")]
    DuplicateSignalId(String),

    #[error("Illegal phase transition: {from} -> {to}")]
    IllegalPhaseTransition {
        from: SessionPhase,
        to: SessionPhase,
    },

    #[error("Session is {0}; no further mutation is accepted")]
    MutationAfterTerminal(SessionPhase),

    #[error("Scan run {0} ended before the candidate was stored")]
    RunEnded(u64),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
