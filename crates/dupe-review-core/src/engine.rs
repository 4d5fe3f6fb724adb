use crate::error::Error;
use crate::evidence::{
    CandidateAssessment, CandidateEvaluator, EvidenceItem, SignalCatalog, SignalMeasurement,
};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::session::{
    PhaseTransition, ScanPhaseStateMachine, SessionMetrics, SessionMetricsAccumulator,
    SessionPhase,
};
use crate::settings::{SettingsHandle, SettingsSnapshot};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Cancelled => f.write_str("cancelled by user"),
            FailureReason::Error(msg) => f.write_str(msg),
        }
    }
}

struct SessionState {
    run: u64,
    machine: ScanPhaseStateMachine,
    metrics: SessionMetricsAccumulator,
    failure: Option<FailureReason>,
    candidates: BTreeMap<String, CandidateAssessment>,
    /// Every stored candidate is scored under exactly this snapshot.
    settings: Arc<SettingsSnapshot>,
    started_at: DateTime<Utc>,
    phase_entered_at: DateTime<Utc>,
}

impl SessionState {
    fn new(run: u64, settings: Arc<SettingsSnapshot>) -> Self {
        let now = Utc::now();
        Self {
            run,
            machine: ScanPhaseStateMachine::new(),
            metrics: SessionMetricsAccumulator::new(),
            failure: None,
            candidates: BTreeMap::new(),
            settings,
            started_at: now,
            phase_entered_at: now,
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        let phase = self.machine.current();
        if phase.is_terminal() {
            warn!("Evidence rejected: session is {}", phase);
            return Err(Error::MutationAfterTerminal(phase));
        }
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            run: self.run,
            phase: self.machine.current(),
            progress: self.machine.progress_fraction(),
            metrics: self.metrics.snapshot(),
            failure: self.failure.clone(),
            candidates: self.candidates.values().cloned().collect(),
            settings_revision: self.settings.revision,
            started_at: self.started_at,
            phase_entered_at: self.phase_entered_at,
        }
    }
}

/// Consistent point-in-time view of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub run: u64,
    pub phase: SessionPhase,
    pub progress: f64,
    pub metrics: SessionMetrics,
    pub failure: Option<FailureReason>,
    /// Ordered by candidate id.
    pub candidates: Vec<CandidateAssessment>,
    pub settings_revision: u64,
    pub started_at: DateTime<Utc>,
    pub phase_entered_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn flagged(&self) -> impl Iterator<Item = &CandidateAssessment> {
        self.candidates.iter().filter(|c| c.meets_threshold)
    }
}

/// State of one active scan, shared between the scan driver and readers.
///
/// Every mutation takes the write lock for its whole duration; readers clone
/// a [`SessionSnapshot`] under the read lock and never see a partial update.
/// Cloning the session shares the same state.
#[derive(Clone)]
pub struct ScanSession {
    catalog: Arc<SignalCatalog>,
    settings: SettingsHandle,
    state: Arc<RwLock<SessionState>>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ScanSession {
    pub fn new(catalog: Arc<SignalCatalog>, settings: SettingsHandle) -> Self {
        let current = settings.current();
        Self {
            catalog,
            settings,
            state: Arc::new(RwLock::new(SessionState::new(1, current))),
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn catalog(&self) -> &Arc<SignalCatalog> {
        &self.catalog
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().machine.current()
    }

    pub fn progress_fraction(&self) -> f64 {
        self.read().machine.progress_fraction()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.read().metrics.snapshot()
    }

    pub fn candidate(&self, id: &str) -> Option<CandidateAssessment> {
        self.read().candidates.get(id).cloned()
    }

    /// Move to the next phase. Advancing to `Failed` directly records an
    /// unspecified error; prefer [`ScanSession::fail`] or [`ScanSession::cancel`].
    pub fn advance(&self, to: SessionPhase) -> Result<PhaseTransition, Error> {
        if to == SessionPhase::Failed {
            return self.terminate(FailureReason::Error("scan failed".to_string()));
        }

        let (transition, progress) = {
            let mut state = self.write();
            let transition = state.machine.advance(to)?;
            state.phase_entered_at = Utc::now();
            if to.is_terminal() {
                state.metrics.seal(to);
                info!(
                    "Scan run {} completed: {} items, {} duplicate groups, {} candidates",
                    state.run,
                    state.metrics.snapshot().items_processed,
                    state.metrics.snapshot().duplicates_flagged,
                    state.candidates.len(),
                );
            }
            (transition, state.machine.progress_fraction())
        };

        self.reporter.on_phase_change(transition, progress);
        Ok(transition)
    }

    pub fn fail(&self, reason: impl Into<String>) -> Result<PhaseTransition, Error> {
        self.terminate(FailureReason::Error(reason.into()))
    }

    /// User-initiated cancellation. Stops all further mutation and drops the
    /// partial assessments gathered so far.
    pub fn cancel(&self) -> Result<PhaseTransition, Error> {
        self.terminate(FailureReason::Cancelled)
    }

    fn terminate(&self, reason: FailureReason) -> Result<PhaseTransition, Error> {
        let (transition, progress) = {
            let mut state = self.write();
            let transition = state.machine.advance(SessionPhase::Failed)?;
            state.phase_entered_at = Utc::now();
            state.metrics.seal(SessionPhase::Failed);
            let dropped = state.candidates.len();
            state.candidates.clear();
            state.failure = Some(reason.clone());
            info!(
                "Scan run {} failed during {}: {} ({} partial assessments dropped)",
                state.run, transition.from, reason, dropped,
            );
            (transition, state.machine.progress_fraction())
        };

        self.reporter.on_phase_change(transition, progress);
        self.reporter.on_session_failed(&reason);
        Ok(transition)
    }

    /// Start a new run. Only allowed once the current run is terminal.
    pub fn reset(&self) -> Result<u64, Error> {
        let run = {
            let mut state = self.write();
            state.machine.reset()?;
            let run = state.run + 1;
            *state = SessionState::new(run, self.settings.current());
            info!("Starting scan run {}", run);
            run
        };

        self.reporter.on_session_reset(run);
        Ok(run)
    }

    pub fn record_item_processed(&self) -> Result<SessionMetrics, Error> {
        self.record_items_processed(1)
    }

    pub fn record_items_processed(&self, count: u64) -> Result<SessionMetrics, Error> {
        let metrics = self.write().metrics.record_items_processed(count)?;
        self.reporter.on_metrics(metrics);
        Ok(metrics)
    }

    pub fn record_duplicate_group_found(&self) -> Result<SessionMetrics, Error> {
        let metrics = self.write().metrics.record_duplicate_group_found()?;
        self.reporter.on_metrics(metrics);
        Ok(metrics)
    }

    /// Score one candidate and keep its evidence for later re-aggregation.
    /// Resubmitting an id replaces it.
    ///
    /// Evidence is built without holding the lock; aggregation runs under the
    /// write lock against the session's settings snapshot, so every stored
    /// assessment carries the session's revision. A result measured during a
    /// run that has since ended is discarded with [`Error::RunEnded`].
    pub fn submit_candidate(
        &self,
        candidate_id: &str,
        measurements: &[SignalMeasurement],
    ) -> Result<CandidateAssessment, Error> {
        let run = self.open_run()?;
        let evidence = CandidateEvaluator::new(&self.catalog).collect_evidence(measurements)?;
        let assessment = self.store_assessment(run, candidate_id, evidence)?;

        debug!(
            "Candidate '{}': confidence {:.3} ({}), {} signals, settings revision {}",
            candidate_id,
            assessment.confidence,
            assessment.band,
            assessment.evidence.len(),
            assessment.settings_revision,
        );
        self.reporter.on_candidate_assessed(&assessment);
        Ok(assessment)
    }

    fn open_run(&self) -> Result<u64, Error> {
        let state = self.read();
        state.ensure_open()?;
        Ok(state.run)
    }

    fn store_assessment(
        &self,
        run: u64,
        candidate_id: &str,
        evidence: Vec<EvidenceItem>,
    ) -> Result<CandidateAssessment, Error> {
        let mut state = self.write();
        state.ensure_open()?;
        if state.run != run {
            warn!(
                "Candidate '{}' measured during run {}, discarded in run {}",
                candidate_id, run, state.run
            );
            return Err(Error::RunEnded(run));
        }
        let assessment =
            CandidateEvaluator::new(&self.catalog).assess(candidate_id, evidence, &state.settings);
        state
            .candidates
            .insert(candidate_id.to_string(), assessment.clone());
        Ok(assessment)
    }

    /// Re-aggregate stored evidence after settings were applied. Nothing is
    /// re-measured. Returns the number of candidates that were rescored.
    pub fn sync_settings(&self) -> usize {
        let (count, settings) = {
            let mut state = self.write();
            // Read under the session lock; the revision only moves forward.
            let settings = self.settings.current();
            if settings.revision <= state.settings.revision {
                return 0;
            }
            state.settings = Arc::clone(&settings);

            let evaluator = CandidateEvaluator::new(&self.catalog);
            state
                .candidates
                .par_iter_mut()
                .for_each(|(_, assessment)| {
                    *assessment = evaluator.reassess(assessment, &settings);
                });
            (state.candidates.len(), settings)
        };

        debug!(
            "Re-aggregated {} candidates at settings revision {}",
            count, settings.revision
        );
        self.reporter.on_reassessed(count, settings.revision);
        count
    }
}
