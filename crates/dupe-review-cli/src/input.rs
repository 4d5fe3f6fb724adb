use std::fs;
use std::path::Path;

use anyhow::Context;
use dupe_review_core::{SessionPhase, SignalMeasurement};
use serde::Deserialize;

/// One recorded candidate pair and its measured signal distances.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    pub measurements: Vec<SignalMeasurement>,
}

/// One step of a recorded scan, replayed in order against a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanLogEvent {
    Advance { phase: SessionPhase },
    Items { count: u64 },
    DuplicateGroup,
    Candidate(CandidateRecord),
    Fail { reason: String },
    Cancel,
}

pub fn read_candidates(path: &Path) -> anyhow::Result<Vec<CandidateRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading candidates from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing candidates in {}", path.display()))
}

pub fn read_scan_log(path: &Path) -> anyhow::Result<Vec<ScanLogEvent>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading scan log from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing scan log in {}", path.display()))
}
