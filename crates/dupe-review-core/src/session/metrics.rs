use super::phase::SessionPhase;
use crate::error::Error;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionMetrics {
    pub items_processed: u64,
    pub duplicates_flagged: u64,
}

/// Increment-only counters for one scan run. Sealed once the owning session
/// reaches a terminal phase.
#[derive(Debug, Clone, Default)]
pub struct SessionMetricsAccumulator {
    metrics: SessionMetrics,
    sealed_at: Option<SessionPhase>,
}

impl SessionMetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionMetrics {
        self.metrics
    }

    pub fn record_item_processed(&mut self) -> Result<SessionMetrics, Error> {
        self.record_items_processed(1)
    }

    pub fn record_items_processed(&mut self, count: u64) -> Result<SessionMetrics, Error> {
        self.check_open()?;
        self.metrics.items_processed = self.metrics.items_processed.saturating_add(count);
        Ok(self.metrics)
    }

    pub fn record_duplicate_group_found(&mut self) -> Result<SessionMetrics, Error> {
        self.check_open()?;
        self.metrics.duplicates_flagged = self.metrics.duplicates_flagged.saturating_add(1);
        Ok(self.metrics)
    }

    /// Refuse further mutation; `phase` is reported back in the error.
    pub fn seal(&mut self, phase: SessionPhase) {
        self.sealed_at = Some(phase);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed_at.is_some()
    }

    /// Zero the counters for a new run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn check_open(&self) -> Result<(), Error> {
        match self.sealed_at {
            Some(phase) => {
                warn!("Metric update rejected: session is {}", phase);
                Err(Error::MutationAfterTerminal(phase))
            }
            None => Ok(()),
        }
    }
}
