pub mod metrics;
pub mod phase;

pub use metrics::{SessionMetrics, SessionMetricsAccumulator};
pub use phase::{PhaseTransition, ScanPhaseStateMachine, SessionPhase, PHASE_ORDER};
