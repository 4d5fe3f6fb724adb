use std::sync::{Arc, Mutex};

use dupe_review_core::session::{PhaseTransition, ScanPhaseStateMachine, PHASE_ORDER};
use dupe_review_core::{
    CandidateAssessment, Error, FailureReason, ProgressReporter, ScanSession, SessionMetrics,
    SessionPhase, SignalCatalog, SignalMeasurement, SimilaritySettings,
};
use SessionPhase::*;

fn new_session() -> (SimilaritySettings, ScanSession) {
    let catalog = Arc::new(SignalCatalog::builtin());
    let settings = SimilaritySettings::new(Arc::clone(&catalog));
    let session = ScanSession::new(catalog, settings.handle());
    (settings, session)
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn on_phase_change(&self, transition: PhaseTransition, progress: f64) {
        self.events.lock().unwrap().push(format!(
            "phase {}->{} {:.2}",
            transition.from, transition.to, progress
        ));
    }

    fn on_metrics(&self, metrics: SessionMetrics) {
        self.events.lock().unwrap().push(format!(
            "metrics {}/{}",
            metrics.items_processed, metrics.duplicates_flagged
        ));
    }

    fn on_candidate_assessed(&self, assessment: &CandidateAssessment) {
        self.events
            .lock()
            .unwrap()
            .push(format!("candidate {}", assessment.candidate_id));
    }

    fn on_reassessed(&self, candidates: usize, settings_revision: u64) {
        self.events
            .lock()
            .unwrap()
            .push(format!("reassessed {} @{}", candidates, settings_revision));
    }

    fn on_session_failed(&self, reason: &FailureReason) {
        self.events.lock().unwrap().push(format!("failed {}", reason));
    }
}

#[test]
fn test_phase_order_is_enforced() {
    let mut machine = ScanPhaseStateMachine::new();
    assert!(matches!(
        machine.advance(Hashing),
        Err(Error::IllegalPhaseTransition { from: Preparing, to: Hashing })
    ));
    machine.advance(Indexing).unwrap();
    machine.advance(Hashing).unwrap();
}

#[test]
fn test_failed_reachable_from_every_non_terminal_phase() {
    for (i, &phase) in PHASE_ORDER.iter().enumerate() {
        if phase.is_terminal() {
            continue;
        }
        let mut machine = ScanPhaseStateMachine::new();
        for &step in &PHASE_ORDER[1..=i] {
            machine.advance(step).unwrap();
        }
        assert_eq!(machine.current(), phase);
        machine.advance(Failed).unwrap();
    }
}

#[test]
fn test_progress_fraction_follows_order_table() {
    let mut machine = ScanPhaseStateMachine::new();
    for (i, &phase) in PHASE_ORDER.iter().enumerate().skip(1) {
        machine.advance(phase).unwrap();
        let expected = i as f64 / 6.0;
        assert!((machine.progress_fraction() - expected).abs() < 1e-12);
    }
}

#[test]
fn test_metrics_rejected_after_completed() {
    let (_settings, session) = new_session();
    for phase in [Indexing, Hashing, Grouping, Reviewing, Completed] {
        session.advance(phase).unwrap();
    }

    assert!(matches!(
        session.record_item_processed(),
        Err(Error::MutationAfterTerminal(Completed))
    ));
    assert!(matches!(
        session.record_duplicate_group_found(),
        Err(Error::MutationAfterTerminal(Completed))
    ));
    assert!(session.advance(Failed).is_err());
    assert!(session.cancel().is_err());
}

#[test]
fn test_session_reports_progress() {
    let (_settings, session) = new_session();
    let reporter = Arc::new(RecordingReporter::default());
    let session = session.with_reporter(reporter.clone());

    session.advance(Indexing).unwrap();
    session.record_items_processed(10).unwrap();
    session.advance(Hashing).unwrap();
    session.record_duplicate_group_found().unwrap();
    session
        .submit_candidate("g1", &[SignalMeasurement::new("checksum", 0.0, 0.5)])
        .unwrap();
    session.cancel().unwrap();

    assert_eq!(
        reporter.events(),
        vec![
            "phase preparing->indexing 0.17",
            "metrics 10/0",
            "phase indexing->hashing 0.33",
            "metrics 10/1",
            "candidate g1",
            "phase hashing->failed 0.33",
            "failed cancelled by user",
        ]
    );
}

#[test]
fn test_settings_change_reaggregates_without_remeasuring() {
    let (mut settings, session) = new_session();
    let reporter = Arc::new(RecordingReporter::default());
    let session = session.with_reporter(reporter.clone());
    let rx = settings.subscribe();

    session.advance(Indexing).unwrap();
    session.advance(Hashing).unwrap();
    let first = session
        .submit_candidate(
            "pair-a",
            &[
                SignalMeasurement::new("checksum", 1.0, 0.5),
                SignalMeasurement::new("phash", 1.0, 10.0),
            ],
        )
        .unwrap();
    // checksum fails (score 0) and dominates by weight.
    assert!((first.confidence - 0.72 / 1.8).abs() < 1e-9);
    assert!(!first.meets_threshold);

    settings.toggle_signal("checksum").unwrap();
    assert!(settings.apply_changes());
    let event = rx.try_recv().unwrap();
    assert_eq!(event.revision, 1);

    assert_eq!(session.sync_settings(), 1);
    let second = session.candidate("pair-a").unwrap();
    assert!((second.confidence - 0.9).abs() < 1e-9);
    assert!(second.meets_threshold);
    assert_eq!(second.settings_revision, 1);
    assert_eq!(second.evidence, first.evidence);
    assert_eq!(session.snapshot().settings_revision, 1);

    // Already in sync.
    assert_eq!(session.sync_settings(), 0);
    assert!(reporter.events().contains(&"reassessed 1 @1".to_string()));
}

#[test]
fn test_reaggregation_allowed_after_completion() {
    let (mut settings, session) = new_session();
    session.advance(Indexing).unwrap();
    session
        .submit_candidate("x", &[SignalMeasurement::new("metadata", 0.9, 0.8)])
        .unwrap();
    assert_eq!(session.candidate("x").unwrap().confidence, 0.0);

    for phase in [Hashing, Grouping, Reviewing, Completed] {
        session.advance(phase).unwrap();
    }

    settings.toggle_signal("metadata").unwrap();
    settings.apply_changes();
    assert_eq!(session.sync_settings(), 1);
    assert_eq!(session.candidate("x").unwrap().confidence, 1.0);

    // New evidence is still refused.
    assert!(matches!(
        session.submit_candidate("y", &[SignalMeasurement::new("phash", 0.0, 10.0)]),
        Err(Error::MutationAfterTerminal(Completed))
    ));
}

#[test]
fn test_invalid_measurement_does_not_store_candidate() {
    let (_settings, session) = new_session();
    let result = session.submit_candidate("bad", &[SignalMeasurement::new("phash", -1.0, 10.0)]);
    assert!(matches!(result, Err(Error::InvalidDistance(_))));
    assert!(session.candidate("bad").is_none());
}
