use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use dupe_review_core::session::PHASE_ORDER;
use dupe_review_core::{
    ScanSession, SessionPhase, SignalCatalog, SignalMeasurement, SimilaritySettings,
};

/// Measurements for candidate `i`: every third one is a byte-identical copy.
fn measurements_for(i: usize) -> Vec<SignalMeasurement> {
    let exact = i % 3 == 0;
    vec![
        SignalMeasurement::new("checksum", if exact { 0.0 } else { 1.0 }, 0.5),
        SignalMeasurement::new("phash", (i % 12) as f64, 10.0),
        SignalMeasurement::new("size", if exact { 0.0 } else { 0.02 }, 0.05),
    ]
}

#[test]
fn test_driver_and_reader_threads() {
    let catalog = Arc::new(SignalCatalog::builtin());
    let settings = SimilaritySettings::new(Arc::clone(&catalog));
    let session = ScanSession::new(catalog, settings.handle());

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let session = session.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last_items = 0;
            let mut last_progress = 0.0;
            while !done.load(Ordering::SeqCst) {
                let snapshot = session.snapshot();
                // Counters and progress never move backwards within a run.
                assert!(snapshot.metrics.items_processed >= last_items);
                assert!(snapshot.progress >= last_progress);
                assert!(snapshot.metrics.duplicates_flagged <= snapshot.metrics.items_processed);
                for candidate in &snapshot.candidates {
                    assert!((0.0..=1.0).contains(&candidate.confidence));
                }
                last_items = snapshot.metrics.items_processed;
                last_progress = snapshot.progress;
            }
        })
    };

    let driver = {
        let session = session.clone();
        thread::spawn(move || {
            session.advance(SessionPhase::Indexing).unwrap();
            for _ in 0..300 {
                session.record_item_processed().unwrap();
            }
            session.advance(SessionPhase::Hashing).unwrap();
            session.advance(SessionPhase::Grouping).unwrap();
            for i in 0..60 {
                let assessment = session
                    .submit_candidate(&format!("group-{:03}", i), &measurements_for(i))
                    .unwrap();
                if assessment.meets_threshold {
                    session.record_duplicate_group_found().unwrap();
                }
            }
            session.advance(SessionPhase::Reviewing).unwrap();
            session.advance(SessionPhase::Completed).unwrap();
        })
    };

    driver.join().unwrap();
    done.store(true, Ordering::SeqCst);
    reader.join().unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Completed);
    assert_eq!(snapshot.progress, 1.0);
    assert_eq!(snapshot.metrics.items_processed, 300);
    assert_eq!(snapshot.candidates.len(), 60);
    assert_eq!(
        snapshot.metrics.duplicates_flagged as usize,
        snapshot.flagged().count()
    );
    // Snapshot candidates are ordered by id.
    assert!(snapshot
        .candidates
        .windows(2)
        .all(|w| w[0].candidate_id < w[1].candidate_id));
}

#[test]
fn test_cancel_from_presentation_thread_stops_driver() {
    let catalog = Arc::new(SignalCatalog::builtin());
    let settings = SimilaritySettings::new(Arc::clone(&catalog));
    let session = ScanSession::new(catalog, settings.handle());
    session.advance(SessionPhase::Indexing).unwrap();

    let driver = {
        let session = session.clone();
        thread::spawn(move || {
            let mut accepted = 0u64;
            loop {
                match session.record_item_processed() {
                    Ok(_) => accepted += 1,
                    Err(_) => return accepted,
                }
                if accepted % 50 == 0 {
                    let _ = session.submit_candidate(
                        &format!("c{}", accepted),
                        &measurements_for(accepted as usize),
                    );
                }
            }
        })
    };

    while session.metrics().items_processed < 100 {
        thread::yield_now();
    }
    session.cancel().unwrap();
    let accepted = driver.join().unwrap();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Failed);
    assert_eq!(snapshot.metrics.items_processed, accepted);
    assert!(snapshot.candidates.is_empty());
    assert!((snapshot.progress - 1.0 / (PHASE_ORDER.len() - 1) as f64).abs() < 1e-12);
}

#[test]
fn test_snapshot_serializes_for_presentation() {
    let catalog = Arc::new(SignalCatalog::builtin());
    let settings = SimilaritySettings::new(Arc::clone(&catalog));
    let session = ScanSession::new(catalog, settings.handle());
    session.advance(SessionPhase::Indexing).unwrap();
    session
        .submit_candidate("a|b", &[SignalMeasurement::new("phash", 4.0, 10.0)])
        .unwrap();
    session.fail("volume unmounted").unwrap();

    let json = serde_json::to_value(session.snapshot()).unwrap();
    assert_eq!(json["phase"], "failed");
    assert_eq!(json["failure"]["kind"], "error");
    assert_eq!(json["failure"]["message"], "volume unmounted");
    assert_eq!(json["candidates"].as_array().unwrap().len(), 0);

    let settings_json = serde_json::to_value(&*settings.handle().current()).unwrap();
    assert_eq!(settings_json["revision"], 0);
    assert_eq!(settings_json["overall_threshold"], 0.8);
}

#[test]
fn test_settings_applied_during_submissions_leave_no_stale_candidates() {
    let measurements = [
        SignalMeasurement::new("checksum", 1.0, 0.5),
        SignalMeasurement::new("phash", 0.0, 10.0),
    ];

    for round in 0..50 {
        let catalog = Arc::new(SignalCatalog::builtin());
        let mut settings = SimilaritySettings::new(Arc::clone(&catalog));
        let handle = settings.handle();
        let session = ScanSession::new(catalog, settings.handle());
        session.advance(SessionPhase::Indexing).unwrap();

        let driver = {
            let session = session.clone();
            let measurements = measurements.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    session
                        .submit_candidate(&format!("c{:02}", i), &measurements)
                        .unwrap();
                }
            })
        };

        for _ in 0..20 {
            settings.toggle_signal("checksum").unwrap();
            assert!(settings.apply_changes());
            session.sync_settings();
        }
        driver.join().unwrap();
        session.sync_settings();

        let current = handle.current();
        let expected = if current.state.is_enabled("checksum") {
            0.8 / 1.8
        } else {
            1.0
        };
        let snapshot = session.snapshot();
        assert_eq!(snapshot.settings_revision, current.revision, "round {}", round);
        assert_eq!(snapshot.candidates.len(), 50);
        for candidate in &snapshot.candidates {
            assert_eq!(
                candidate.settings_revision, current.revision,
                "round {}: {} is stale",
                round, candidate.candidate_id
            );
            assert!(
                (candidate.confidence - expected).abs() < 1e-9,
                "round {}: {} confidence {}",
                round,
                candidate.candidate_id,
                candidate.confidence
            );
        }
    }
}
