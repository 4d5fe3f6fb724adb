use super::catalog::{SignalDefinition, Weight};
use super::threshold::{self, Verdict};
use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of one signal for one compared candidate. Never mutated after
/// creation; a different threshold means a new item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    id: String,
    label: String,
    distance: f64,
    threshold: f64,
    score: f64,
    verdict: Verdict,
}

impl EvidenceItem {
    pub fn evaluate(def: &SignalDefinition, distance: f64, threshold: f64) -> Result<Self, Error> {
        let outcome = threshold::evaluate(distance, threshold, def.comparison)?;
        Ok(Self {
            id: def.id.clone(),
            label: def.display_name.clone(),
            distance,
            threshold,
            score: outcome.score,
            verdict: outcome.verdict,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightedEvidence<'a> {
    pub item: &'a EvidenceItem,
    pub weight: Weight,
}

/// Weighted mean of the scores of enabled signals, clamped to [0, 1].
///
/// Items whose signal is not enabled contribute neither score nor weight.
/// No enabled evidence yields 0.0. Contributions are summed in a canonical
/// order so the result does not depend on the order items are supplied in.
pub fn aggregate(items: &[WeightedEvidence<'_>], enabled: &BTreeSet<String>) -> f64 {
    let mut contributions: Vec<(&str, f64, f64)> = items
        .iter()
        .filter(|w| enabled.contains(w.item.id()))
        .map(|w| (w.item.id(), w.item.score(), w.weight.get()))
        .collect();

    if contributions.is_empty() {
        return 0.0;
    }

    contributions.sort_by(|a, b| {
        a.0.cmp(b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.total_cmp(&b.2))
    });

    let (weighted_sum, total_weight) = contributions
        .iter()
        .fold((0.0, 0.0), |(num, den), &(_, score, weight)| {
            (num + weight * score, den + weight)
        });

    (weighted_sum / total_weight).clamp(0.0, 1.0)
}

/// Presentation banding of a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Strong,
    Moderate,
    Weak,
}

impl ConfidenceBand {
    pub const STRONG_FLOOR: f64 = 0.9;
    pub const MODERATE_FLOOR: f64 = 0.7;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::STRONG_FLOOR {
            ConfidenceBand::Strong
        } else if confidence >= Self::MODERATE_FLOOR {
            ConfidenceBand::Moderate
        } else {
            ConfidenceBand::Weak
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceBand::Strong => "strong",
            ConfidenceBand::Moderate => "moderate",
            ConfidenceBand::Weak => "weak",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::catalog::SignalCatalog;

    fn enabled(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_aggregate_is_zero() {
        assert_eq!(aggregate(&[], &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_only_phash_enabled() {
        let catalog = SignalCatalog::builtin();
        let phash = catalog.get("phash").unwrap();
        let size = catalog.get("size").unwrap();
        let phash_item = EvidenceItem::evaluate(phash, 8.0, 10.0).unwrap();
        let size_item = EvidenceItem::evaluate(size, 0.0, 0.05).unwrap();

        let items = [
            WeightedEvidence { item: &phash_item, weight: phash.weight },
            WeightedEvidence { item: &size_item, weight: size.weight },
        ];

        let confidence = aggregate(&items, &enabled(&["phash"]));
        assert!((confidence - 0.2).abs() < 1e-12);
        assert_eq!(phash_item.verdict(), Verdict::Pass);
    }

    #[test]
    fn test_disabling_renormalizes() {
        let catalog = SignalCatalog::builtin();
        let checksum = catalog.get("checksum").unwrap();
        let phash = catalog.get("phash").unwrap();
        let a = EvidenceItem::evaluate(checksum, 0.0, 0.5).unwrap();
        let b = EvidenceItem::evaluate(phash, 10.0, 10.0).unwrap();
        let items = [
            WeightedEvidence { item: &a, weight: checksum.weight },
            WeightedEvidence { item: &b, weight: phash.weight },
        ];

        let both = aggregate(&items, &enabled(&["checksum", "phash"]));
        assert!((both - 1.0 / 1.8).abs() < 1e-12);

        // Disabled phash is dropped, not counted as a zero score.
        let checksum_only = aggregate(&items, &enabled(&["checksum"]));
        assert_eq!(checksum_only, 1.0);
    }

    #[test]
    fn test_order_invariance_is_exact() {
        let catalog = SignalCatalog::builtin();
        let items: Vec<EvidenceItem> = vec![
            EvidenceItem::evaluate(catalog.get("phash").unwrap(), 3.0, 10.0).unwrap(),
            EvidenceItem::evaluate(catalog.get("size").unwrap(), 0.01, 0.05).unwrap(),
            EvidenceItem::evaluate(catalog.get("duration").unwrap(), 0.7, 1.0).unwrap(),
        ];
        let weighted: Vec<WeightedEvidence> = items
            .iter()
            .map(|item| WeightedEvidence {
                item,
                weight: catalog.get(item.id()).unwrap().weight,
            })
            .collect();
        let mut reversed = weighted.clone();
        reversed.reverse();

        let set = enabled(&["phash", "size", "duration"]);
        assert_eq!(aggregate(&weighted, &set), aggregate(&reversed, &set));
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceBand::from_confidence(0.95), ConfidenceBand::Strong);
        assert_eq!(ConfidenceBand::from_confidence(0.9), ConfidenceBand::Strong);
        assert_eq!(ConfidenceBand::from_confidence(0.75), ConfidenceBand::Moderate);
        assert_eq!(ConfidenceBand::from_confidence(0.7), ConfidenceBand::Moderate);
        assert_eq!(ConfidenceBand::from_confidence(0.2), ConfidenceBand::Weak);
    }
}
