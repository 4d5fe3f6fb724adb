use super::aggregate::{aggregate, ConfidenceBand, EvidenceItem, WeightedEvidence};
use super::catalog::SignalCatalog;
use crate::error::Error;
use crate::settings::SettingsSnapshot;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// Raw measurement for one signal, as supplied by the scan driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMeasurement {
    #[serde(rename = "signal")]
    pub signal_id: String,
    pub distance: f64,
    /// Falls back to the signal's default threshold when absent.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl SignalMeasurement {
    pub fn new(signal_id: &str, distance: f64, threshold: f64) -> Self {
        Self {
            signal_id: signal_id.to_string(),
            distance,
            threshold: Some(threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateAssessment {
    pub candidate_id: String,
    pub evidence: Vec<EvidenceItem>,
    pub confidence: f64,
    pub band: ConfidenceBand,
    /// `confidence >= overall_threshold` under the settings used.
    pub meets_threshold: bool,
    pub settings_revision: u64,
}

/// Builds evidence from raw measurements and scores it under a settings snapshot.
pub struct CandidateEvaluator<'a> {
    catalog: &'a SignalCatalog,
}

impl<'a> CandidateEvaluator<'a> {
    pub fn new(catalog: &'a SignalCatalog) -> Self {
        Self { catalog }
    }

    /// Evaluate every measurement, enabled or not, so that enabling a signal
    /// later only needs re-aggregation.
    pub fn collect_evidence(&self, measurements: &[SignalMeasurement]) -> Result<Vec<EvidenceItem>, Error> {
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(measurements.len());
        let mut evidence = Vec::with_capacity(measurements.len());

        for m in measurements {
            if !seen.insert(m.signal_id.as_str()) {
                return Err(Error::DuplicateSignalId(m.signal_id.clone()));
            }
            let def = self.catalog.require(&m.signal_id)?;
            let threshold = m.threshold.unwrap_or(def.default_threshold);
            evidence.push(EvidenceItem::evaluate(def, m.distance, threshold)?);
        }

        Ok(evidence)
    }

    pub fn assess(
        &self,
        candidate_id: &str,
        evidence: Vec<EvidenceItem>,
        settings: &SettingsSnapshot,
    ) -> CandidateAssessment {
        let confidence = {
            let weighted: Vec<WeightedEvidence> = evidence
                .iter()
                .filter_map(|item| {
                    self.catalog.get(item.id()).map(|def| WeightedEvidence {
                        item,
                        weight: settings.state.weight_for(def),
                    })
                })
                .collect();
            aggregate(&weighted, &settings.state.enabled_signals)
        };

        CandidateAssessment {
            candidate_id: candidate_id.to_string(),
            evidence,
            confidence,
            band: ConfidenceBand::from_confidence(confidence),
            meets_threshold: confidence >= settings.state.overall_threshold,
            settings_revision: settings.revision,
        }
    }

    pub fn evaluate(
        &self,
        candidate_id: &str,
        measurements: &[SignalMeasurement],
        settings: &SettingsSnapshot,
    ) -> Result<CandidateAssessment, Error> {
        let evidence = self.collect_evidence(measurements)?;
        Ok(self.assess(candidate_id, evidence, settings))
    }

    /// Re-aggregate existing evidence under new settings.
    pub fn reassess(&self, previous: &CandidateAssessment, settings: &SettingsSnapshot) -> CandidateAssessment {
        self.assess(&previous.candidate_id, previous.evidence.clone(), settings)
    }
}
