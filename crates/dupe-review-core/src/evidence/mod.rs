//! Per-signal scoring and multi-signal confidence.
//!
//! Raw measurements become [`EvidenceItem`]s through the threshold policy;
//! enabled evidence is folded into one confidence value by [`aggregate`].

pub mod aggregate;
pub mod candidate;
pub mod catalog;
pub mod threshold;

pub use aggregate::{aggregate, ConfidenceBand, EvidenceItem, WeightedEvidence};
pub use candidate::{CandidateAssessment, CandidateEvaluator, SignalMeasurement};
pub use catalog::{ComparisonKind, SignalCatalog, SignalDefinition, Weight};
pub use threshold::{evaluate, PolicyOutcome, Verdict, WARN_BAND_MULTIPLIER};
