use crate::config::SimilarityConfig;
use crate::error::Error;
use crate::evidence::{SignalCatalog, SignalDefinition, Weight};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

pub const DEFAULT_OVERALL_THRESHOLD: f64 = 0.8;
pub const MIN_OVERALL_THRESHOLD: f64 = 0.5;
pub const MAX_OVERALL_THRESHOLD: f64 = 1.0;

/// One complete set of similarity settings. Working and baseline copies are
/// compared structurally to derive pending changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsState {
    pub overall_threshold: f64,
    pub enabled_signals: BTreeSet<String>,
    pub weight_overrides: BTreeMap<String, Weight>,
}

impl SettingsState {
    pub fn defaults(catalog: &SignalCatalog) -> Self {
        Self {
            overall_threshold: DEFAULT_OVERALL_THRESHOLD,
            enabled_signals: catalog.baseline_ids().map(str::to_string).collect(),
            weight_overrides: BTreeMap::new(),
        }
    }

    pub fn weight_for(&self, def: &SignalDefinition) -> Weight {
        self.weight_overrides
            .get(&def.id)
            .copied()
            .unwrap_or(def.weight)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_signals.contains(id)
    }
}

/// Applied settings as seen by the scan driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsSnapshot {
    /// Bumped on every effective `apply_changes`.
    pub revision: u64,
    #[serde(flatten)]
    pub state: SettingsState,
}

/// Emitted to subscribers when new settings are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChanged {
    pub revision: u64,
}

/// Read-only view of the most recently applied settings. Cloning shares the
/// same underlying slot.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    slot: Arc<RwLock<Arc<SettingsSnapshot>>>,
}

impl SettingsHandle {
    fn new(snapshot: SettingsSnapshot) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Arc<SettingsSnapshot> {
        let guard = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    fn publish(&self, snapshot: SettingsSnapshot) {
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}

/// User-editable similarity settings with an explicit commit step.
///
/// Mutations only touch the working copy. `apply_changes` is the single point
/// where they become visible through the [`SettingsHandle`].
pub struct SimilaritySettings {
    catalog: Arc<SignalCatalog>,
    working: SettingsState,
    baseline: SettingsState,
    has_pending_changes: bool,
    revision: u64,
    published: SettingsHandle,
    subscribers: Vec<Sender<SettingsChanged>>,
}

impl SimilaritySettings {
    pub fn new(catalog: Arc<SignalCatalog>) -> Self {
        let baseline = SettingsState::defaults(&catalog);
        Self::with_baseline(catalog, baseline)
    }

    /// Start from configured values; the configured state becomes the
    /// applied baseline.
    pub fn from_config(catalog: Arc<SignalCatalog>, config: &SimilarityConfig) -> Result<Self, Error> {
        let mut baseline = SettingsState::defaults(&catalog);
        baseline.overall_threshold = clamp_overall_threshold(config.overall_threshold)?;

        if let Some(ids) = &config.enabled_signals {
            let mut enabled = BTreeSet::new();
            for id in ids {
                catalog.require(id)?;
                enabled.insert(id.clone());
            }
            baseline.enabled_signals = enabled;
        }

        for (id, &value) in &config.weight_overrides {
            catalog.require(id)?;
            baseline
                .weight_overrides
                .insert(id.clone(), Weight::new(id, value)?);
        }

        Ok(Self::with_baseline(catalog, baseline))
    }

    fn with_baseline(catalog: Arc<SignalCatalog>, baseline: SettingsState) -> Self {
        let published = SettingsHandle::new(SettingsSnapshot {
            revision: 0,
            state: baseline.clone(),
        });
        Self {
            catalog,
            working: baseline.clone(),
            baseline,
            has_pending_changes: false,
            revision: 0,
            published,
            subscribers: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<SignalCatalog> {
        &self.catalog
    }

    pub fn working(&self) -> &SettingsState {
        &self.working
    }

    pub fn baseline(&self) -> &SettingsState {
        &self.baseline
    }

    pub fn has_pending_changes(&self) -> bool {
        self.has_pending_changes
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn handle(&self) -> SettingsHandle {
        self.published.clone()
    }

    /// Receive a [`SettingsChanged`] per applied revision. Scan drivers react
    /// by calling [`crate::ScanSession::sync_settings`].
    pub fn subscribe(&mut self) -> Receiver<SettingsChanged> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Flip membership of `id` in the enabled set. Returns the new state.
    pub fn toggle_signal(&mut self, id: &str) -> Result<bool, Error> {
        self.catalog.require(id)?;
        let now_enabled = if self.working.enabled_signals.remove(id) {
            false
        } else {
            self.working.enabled_signals.insert(id.to_string());
            true
        };
        self.refresh_pending();
        Ok(now_enabled)
    }

    pub fn set_signal_enabled(&mut self, id: &str, enabled: bool) -> Result<(), Error> {
        self.catalog.require(id)?;
        if enabled {
            self.working.enabled_signals.insert(id.to_string());
        } else {
            self.working.enabled_signals.remove(id);
        }
        self.refresh_pending();
        Ok(())
    }

    /// Store `value` clamped into the supported range. Returns the stored value.
    pub fn set_overall_threshold(&mut self, value: f64) -> Result<f64, Error> {
        let clamped = clamp_overall_threshold(value)?;
        self.working.overall_threshold = clamped;
        self.refresh_pending();
        Ok(clamped)
    }

    pub fn set_weight_override(&mut self, id: &str, weight: f64) -> Result<(), Error> {
        self.catalog.require(id)?;
        let weight = Weight::new(id, weight)?;
        self.working.weight_overrides.insert(id.to_string(), weight);
        self.refresh_pending();
        Ok(())
    }

    pub fn clear_weight_override(&mut self, id: &str) -> Result<(), Error> {
        self.catalog.require(id)?;
        self.working.weight_overrides.remove(id);
        self.refresh_pending();
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.working = SettingsState::defaults(&self.catalog);
        self.refresh_pending();
    }

    pub fn discard_changes(&mut self) {
        self.working = self.baseline.clone();
        self.refresh_pending();
    }

    /// Commit the working copy as the new baseline and publish it.
    ///
    /// Returns `false` without side effects when nothing is pending.
    pub fn apply_changes(&mut self) -> bool {
        if !self.has_pending_changes {
            debug!("apply_changes: nothing pending");
            return false;
        }

        self.baseline = self.working.clone();
        self.revision += 1;
        self.published.publish(SettingsSnapshot {
            revision: self.revision,
            state: self.baseline.clone(),
        });
        self.refresh_pending();

        info!(
            "Applied similarity settings (revision {}): threshold {:.2}, {} signals enabled",
            self.revision,
            self.baseline.overall_threshold,
            self.baseline.enabled_signals.len(),
        );

        let event = SettingsChanged {
            revision: self.revision,
        };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
        true
    }

    fn refresh_pending(&mut self) {
        self.has_pending_changes = self.working != self.baseline;
    }
}

fn clamp_overall_threshold(value: f64) -> Result<f64, Error> {
    if value.is_nan() {
        return Err(Error::InvalidThreshold(value));
    }
    Ok(value.clamp(MIN_OVERALL_THRESHOLD, MAX_OVERALL_THRESHOLD))
}
