pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod progress;
pub mod session;
pub mod settings;

pub use config::AppConfig;
pub use engine::{FailureReason, ScanSession, SessionSnapshot};
pub use error::Error;
pub use evidence::{CandidateAssessment, ConfidenceBand, EvidenceItem, SignalCatalog, SignalMeasurement, Verdict};
pub use progress::{ProgressReporter, SilentReporter};
pub use session::{SessionMetrics, SessionPhase};
pub use settings::{SettingsHandle, SettingsSnapshot, SimilaritySettings};
