use std::sync::Mutex;
use std::time::Duration;

use dupe_review_core::session::{PhaseTransition, PHASE_ORDER};
use dupe_review_core::{
    CandidateAssessment, FailureReason, ProgressReporter, SessionMetrics, SessionPhase,
};
use indicatif::{ProgressBar, ProgressStyle};

/// CLI progress reporter using an indicatif bar over the ordered phases.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        let pb = guard.get_or_insert_with(new_phase_bar);
        f(pb);
    }

    fn finish_bar(&self, message: String, abandon: bool) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.take() {
            if abandon {
                pb.abandon_with_message(message);
            } else {
                pb.finish_with_message(message);
            }
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn new_phase_bar() -> ProgressBar {
    let pb = ProgressBar::new((PHASE_ORDER.len() - 1) as u64);
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} phases  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━╸─")
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl ProgressReporter for CliReporter {
    fn on_phase_change(&self, transition: PhaseTransition, progress: f64) {
        match transition.to {
            SessionPhase::Completed => {
                self.finish_bar(
                    format!("\x1b[32m✓\x1b[0m {}", transition.to),
                    false,
                );
            }
            // Failure is reported with its reason in on_session_failed.
            SessionPhase::Failed => {}
            phase => self.with_bar(|pb| {
                let steps = pb.length().unwrap_or(0) as f64;
                pb.set_position((progress * steps).round() as u64);
                pb.set_message(phase.to_string());
            }),
        }
    }

    fn on_metrics(&self, metrics: SessionMetrics) {
        let guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.as_ref() {
            pb.set_message(format!(
                "{} items, {} duplicate groups",
                metrics.items_processed, metrics.duplicates_flagged
            ));
        }
    }

    fn on_candidate_assessed(&self, assessment: &CandidateAssessment) {
        let guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.as_ref() {
            pb.println(format!(
                "    {} {:.3} ({})",
                assessment.candidate_id, assessment.confidence, assessment.band
            ));
        }
    }

    fn on_session_failed(&self, reason: &FailureReason) {
        self.finish_bar(format!("\x1b[31m✗\x1b[0m failed: {}", reason), true);
    }

    fn on_session_reset(&self, run: u64) {
        self.finish_bar(String::new(), true);
        eprintln!("  session reset, starting run {}", run);
    }
}
