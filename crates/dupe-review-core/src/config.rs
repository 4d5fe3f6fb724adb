use crate::evidence::ComparisonKind;
use crate::settings::DEFAULT_OVERALL_THRESHOLD;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub similarity: SimilarityConfig,
    /// Extra signals registered on top of the built-in catalog.
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_overall_threshold")]
    pub overall_threshold: f64,
    /// `None` means the catalog's baseline subset.
    #[serde(default)]
    pub enabled_signals: Option<Vec<String>>,
    #[serde(default)]
    pub weight_overrides: HashMap<String, f64>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            overall_threshold: DEFAULT_OVERALL_THRESHOLD,
            enabled_signals: None,
            weight_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub weight: f64,
    pub comparison: ComparisonKind,
    pub default_threshold: f64,
    #[serde(default)]
    pub enabled_by_default: bool,
}

fn default_overall_threshold() -> f64 {
    DEFAULT_OVERALL_THRESHOLD
}

/// Load `Config.{toml,json,...}` from the working directory (optional),
/// overlaid with `DUPE_REVIEW_*` environment variables (`__` separates
/// nested keys, e.g. `DUPE_REVIEW_SIMILARITY__OVERALL_THRESHOLD`).
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("DUPE_REVIEW").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Load configuration from an explicit file; the file must exist.
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
