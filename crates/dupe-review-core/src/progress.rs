use crate::engine::FailureReason;
use crate::evidence::CandidateAssessment;
use crate::session::{PhaseTransition, SessionMetrics};

/// Trait for observing a scan session.
///
/// The CLI implements it with indicatif; presentation layers can forward to
/// their own event loop. All methods have default no-op implementations and
/// are called after the session lock has been released.
pub trait ProgressReporter: Send + Sync {
    fn on_phase_change(&self, _transition: PhaseTransition, _progress: f64) {}
    fn on_metrics(&self, _metrics: SessionMetrics) {}
    fn on_candidate_assessed(&self, _assessment: &CandidateAssessment) {}
    fn on_reassessed(&self, _candidates: usize, _settings_revision: u64) {}
    fn on_session_failed(&self, _reason: &FailureReason) {}
    fn on_session_reset(&self, _run: u64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
