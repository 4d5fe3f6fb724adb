use crate::config::{AppConfig, SignalConfig};
use crate::error::Error;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which direction of a raw measurement counts as "more alike".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    /// Distances: 0 is identical, larger is further apart.
    LowerIsBetter,
    /// Similarity ratios compared against a minimum.
    HigherIsBetter,
}

/// Strictly positive, finite signal weight.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Weight(f64);

impl Weight {
    pub fn new(signal_id: &str, value: f64) -> Result<Self, Error> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidWeight {
                signal_id: signal_id.to_string(),
                weight: value,
            })
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDefinition {
    pub id: String,
    pub display_name: String,
    pub weight: Weight,
    pub comparison: ComparisonKind,
    /// Threshold used when a measurement arrives without one.
    pub default_threshold: f64,
    /// Member of the catalog's baseline enabled subset.
    pub enabled_by_default: bool,
}

impl SignalDefinition {
    pub fn new(
        id: &str,
        display_name: &str,
        weight: f64,
        comparison: ComparisonKind,
        default_threshold: f64,
        enabled_by_default: bool,
    ) -> Result<Self, Error> {
        let weight = Weight::new(id, weight)?;
        if !(default_threshold.is_finite() && default_threshold > 0.0) {
            return Err(Error::InvalidThreshold(default_threshold));
        }

        Ok(Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            weight,
            comparison,
            default_threshold,
            enabled_by_default,
        })
    }
}

impl TryFrom<&SignalConfig> for SignalDefinition {
    type Error = Error;

    fn try_from(cfg: &SignalConfig) -> Result<Self, Error> {
        SignalDefinition::new(
            &cfg.id,
            cfg.display_name.as_deref().unwrap_or(&cfg.id),
            cfg.weight,
            cfg.comparison,
            cfg.default_threshold,
            cfg.enabled_by_default,
        )
    }
}

/// Built-in signals: (id, display name, weight, comparison, default threshold, baseline).
const BUILTIN_SIGNALS: &[(&str, &str, f64, ComparisonKind, f64, bool)] = &[
    ("checksum", "Checksum", 1.0, ComparisonKind::LowerIsBetter, 0.5, true),
    ("phash", "Perceptual Hash", 0.8, ComparisonKind::LowerIsBetter, 10.0, true),
    ("size", "File Size", 0.4, ComparisonKind::LowerIsBetter, 0.05, true),
    ("dimensions", "Dimensions", 0.4, ComparisonKind::LowerIsBetter, 0.02, true),
    ("duration", "Duration", 0.4, ComparisonKind::LowerIsBetter, 1.0, true),
    ("metadata", "Metadata", 0.5, ComparisonKind::HigherIsBetter, 0.8, false),
    ("filename", "File Name", 0.3, ComparisonKind::HigherIsBetter, 0.7, false),
];

/// Registry of known signals. Registration order is preserved for display;
/// definitions are immutable once registered.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    signals: Vec<SignalDefinition>,
    index: AHashMap<String, usize>,
}

impl SignalCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for &(id, name, weight, comparison, threshold, baseline) in BUILTIN_SIGNALS {
            let def = SignalDefinition {
                id: id.to_string(),
                display_name: name.to_string(),
                weight: Weight(weight),
                comparison,
                default_threshold: threshold,
                enabled_by_default: baseline,
            };
            catalog.index.insert(def.id.clone(), catalog.signals.len());
            catalog.signals.push(def);
        }
        catalog
    }

    /// Built-in signals plus any `[[signals]]` entries from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let mut catalog = Self::builtin();
        for signal in &config.signals {
            catalog.register(SignalDefinition::try_from(signal)?)?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, def: SignalDefinition) -> Result<(), Error> {
        if self.index.contains_key(&def.id) {
            return Err(Error::DuplicateSignalId(def.id));
        }
        debug!("Registering signal '{}' (weight {})", def.id, def.weight.get());
        self.index.insert(def.id.clone(), self.signals.len());
        self.signals.push(def);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SignalDefinition> {
        self.index.get(id).map(|&i| &self.signals[i])
    }

    pub fn require(&self, id: &str) -> Result<&SignalDefinition, Error> {
        self.get(id)
            .ok_or_else(|| Error::UnknownSignalId(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalDefinition> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn baseline_ids(&self) -> impl Iterator<Item = &str> {
        self.signals
            .iter()
            .filter(|s| s.enabled_by_default)
            .map(|s| s.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_baseline() {
        let catalog = SignalCatalog::builtin();
        let baseline: Vec<&str> = catalog.baseline_ids().collect();
        assert_eq!(baseline, vec!["checksum", "phash", "size", "dimensions", "duration"]);
        assert!(catalog.contains("metadata"));
        assert!(!catalog.get("metadata").unwrap().enabled_by_default);
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut catalog = SignalCatalog::builtin();
        let def = SignalDefinition::new(
            "phash",
            "Another pHash",
            0.5,
            ComparisonKind::LowerIsBetter,
            8.0,
            true,
        )
        .unwrap();
        assert!(matches!(catalog.register(def), Err(Error::DuplicateSignalId(id)) if id == "phash"));
    }

    #[test]
    fn test_weight_must_be_positive() {
        assert!(Weight::new("x", 0.0).is_err());
        assert!(Weight::new("x", -1.0).is_err());
        assert!(Weight::new("x", f64::NAN).is_err());
        assert_eq!(Weight::new("x", 0.25).unwrap().get(), 0.25);
    }

    #[test]
    fn test_definition_rejects_bad_default_threshold() {
        let result = SignalDefinition::new("x", "X", 1.0, ComparisonKind::HigherIsBetter, 0.0, false);
        assert!(matches!(result, Err(Error::InvalidThreshold(_))));
    }

    #[test]
    fn test_require_unknown_signal() {
        let catalog = SignalCatalog::builtin();
        assert!(matches!(catalog.require("audio_fp"), Err(Error::UnknownSignalId(id)) if id == "audio_fp"));
    }
}
