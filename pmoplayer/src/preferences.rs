//! Owners of the process-wide [`QualityPreference`].
//!
//! The orchestrator only reads a snapshot when it builds a load. Writes go
//! through the store itself, driven by the presentation layer.

use std::sync::{Arc, RwLock};

use pmoconfig::Config;
use tracing::warn;

use crate::config_ext::PlayerConfigExt;
use crate::quality::{Quality, QualityPreference};

pub trait QualityPreferenceStore: Send + Sync {
    /// Snapshot taken at the moment of a quality decision.
    fn preference(&self) -> QualityPreference;

    fn set_automatic_quality(&self, automatic: bool);

    fn set_last_chosen_quality(&self, quality: Option<Quality>);
}

/// In-memory store shared by every clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryQualityStore {
    inner: Arc<RwLock<QualityPreference>>,
}

impl MemoryQualityStore {
    pub fn new(preference: QualityPreference) -> Self {
        Self {
            inner: Arc::new(RwLock::new(preference)),
        }
    }
}

impl QualityPreferenceStore for MemoryQualityStore {
    fn preference(&self) -> QualityPreference {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_automatic_quality(&self, automatic: bool) {
        match self.inner.write() {
            Ok(mut guard) => guard.automatic_quality = automatic,
            Err(poisoned) => poisoned.into_inner().automatic_quality = automatic,
        }
    }

    fn set_last_chosen_quality(&self, quality: Option<Quality>) {
        match self.inner.write() {
            Ok(mut guard) => guard.last_chosen_quality = quality,
            Err(poisoned) => poisoned.into_inner().last_chosen_quality = quality,
        }
    }
}

/// Store persisted in the `player.quality` section of the configuration.
#[derive(Clone, Debug)]
pub struct ConfigQualityStore {
    config: Arc<Config>,
}

impl ConfigQualityStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Store backed by the global configuration.
    pub fn global() -> Self {
        Self::new(pmoconfig::get_config())
    }
}

impl QualityPreferenceStore for ConfigQualityStore {
    fn preference(&self) -> QualityPreference {
        self.config.get_quality_preference().unwrap_or_else(|err| {
            warn!("Failed to read quality preference, using defaults: {}", err);
            QualityPreference::default()
        })
    }

    fn set_automatic_quality(&self, automatic: bool) {
        if let Err(err) = self.config.set_automatic_quality(automatic) {
            warn!("Failed to persist automatic quality: {}", err);
        }
    }

    fn set_last_chosen_quality(&self, quality: Option<Quality>) {
        if let Err(err) = self.config.set_last_chosen_quality(quality) {
            warn!("Failed to persist last chosen quality: {}", err);
        }
    }
}
