use std::fs;
use std::path::{Path, PathBuf};
use std::{env, fmt};

use uuid::Uuid;

use nutri_core::{
    HabitEdit, HabitLearner, HabitPattern, HealthSummary, MealAnalysis, MealRecord,
    RecognitionResult, Repository, analyze_meal, health_from_meals,
};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::store::Store;

const DEVICE_ID_KEY: &str = "device_id";

/// Default base directory for all nutri storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".nutri")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Sanitize a device name so it is safe in logs, file names and keys.
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Where the resolved device id came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceSource {
    Explicit,
    Config,
    Persisted,
    Generated,
}

impl fmt::Display for DeviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceSource::Explicit => "flag",
            DeviceSource::Config => "config",
            DeviceSource::Persisted => "database",
            DeviceSource::Generated => "generated",
        })
    }
}

/// Resolve the device identity.
///
/// Priority chain:
/// 1. Explicit `--device` name
/// 2. `device_id` in config.toml
/// 3. `device_id` persisted in the database metadata
/// 4. A fresh UUID, persisted so later runs agree
fn resolve_device_id(
    explicit: Option<&str>,
    config: &Config,
    store: &Store,
) -> Result<(String, DeviceSource)> {
    let named = [
        (explicit, DeviceSource::Explicit),
        (config.device_id.as_deref(), DeviceSource::Config),
    ];
    for (name, source) in named {
        if let Some(name) = name {
            let sanitized = sanitize_name(name);
            if !sanitized.is_empty() {
                return Ok((sanitized, source));
            }
        }
    }

    if let Some(id) = store.get_metadata(DEVICE_ID_KEY)?
        && !id.is_empty()
    {
        return Ok((id, DeviceSource::Persisted));
    }

    let id = Uuid::new_v4().to_string();
    store.set_metadata(DEVICE_ID_KEY, &id)?;
    tracing::info!("generated device id {id}");
    Ok((id, DeviceSource::Generated))
}

/// Result of logging one recognized meal.
#[derive(Clone, Debug, Serialize)]
pub struct MealOutcome {
    pub record: MealRecord,
    pub analysis: MealAnalysis,
    /// Original names rewritten by learned habits.
    pub applied: Vec<String>,
    /// Every item was corrected silently; the UI can skip the review step.
    pub trusted: bool,
    pub saved: bool,
}

/// One device's view of the data directory.
///
/// Layout:
/// ```text
/// ~/.nutri/
/// ├── config.toml
/// └── nutri.db
/// ```
pub struct DeviceStore {
    store: Store,
    config: Config,
    device_id: String,
    source: DeviceSource,
}

impl DeviceStore {
    /// Open the store and config, creating the directory as needed.
    /// `device`: explicit device name (overrides config and database).
    /// `base_dir`: override the base directory (for testing).
    pub fn open(device: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        fs::create_dir_all(&base).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", base.display()))
        })?;

        let config = Config::load(&base.join("config.toml"))?;
        let store = Store::open(&base.join("nutri.db"))?;
        Self::with_parts(device, config, store)
    }

    /// Open with an in-memory store and default config (for testing).
    pub fn open_in_memory(device: Option<&str>) -> Result<Self> {
        Self::with_parts(device, Config::default(), Store::open_in_memory()?)
    }

    fn with_parts(device: Option<&str>, config: Config, store: Store) -> Result<Self> {
        let (device_id, source) = resolve_device_id(device, &config, &store)?;
        tracing::debug!("device {device_id} (from {source})");
        Ok(Self {
            store,
            config,
            device_id,
            source,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn device_source(&self) -> DeviceSource {
        self.source
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// This device's learned patterns, ready to apply.
    pub fn learner(&self) -> Result<HabitLearner> {
        HabitLearner::load(&self.store, &self.device_id)
    }

    pub fn record_edit(&self, edit: &HabitEdit) -> Result<HabitPattern> {
        self.store.record_edit(&self.device_id, edit)
    }

    pub fn patterns(&self) -> Result<Vec<HabitPattern>> {
        self.store.get_patterns_by_device(&self.device_id)
    }

    pub fn save_meal(&self, meal: &MealRecord) -> Result<()> {
        if meal.device_id != self.device_id {
            return Err(StoreError::InvalidData(format!(
                "meal belongs to device '{}', not '{}'",
                meal.device_id, self.device_id
            )));
        }
        self.store.save_meal(meal)
    }

    pub fn meals(&self) -> Result<Vec<MealRecord>> {
        self.store.get_meals_by_device(&self.device_id)
    }

    pub fn health(&self) -> Result<HealthSummary> {
        Ok(health_from_meals(&self.meals()?))
    }

    /// Apply this device's habits to a recognized meal, analyze it and
    /// optionally append it to the meal log.
    pub fn log_meal(
        &self,
        recognition: &RecognitionResult,
        current_hour: u32,
        save: bool,
    ) -> Result<MealOutcome> {
        let learner = self.learner()?;
        let recognized = recognition.to_ingredients();
        let trusted = learner.is_trusted_meal(&recognized);
        let application = learner.apply_habits(&recognized);

        let ctx = self.config.analysis_context(current_hour);
        let analysis = analyze_meal(&application.ingredients, &ctx);
        let record = MealRecord::new(
            &self.device_id,
            &recognition.food,
            application.ingredients,
            &analysis,
        );
        if save {
            self.store.save_meal(&record)?;
            tracing::info!(
                meal = %record.id,
                quality = analysis.quality.as_str(),
                "logged meal"
            );
        }

        Ok(MealOutcome {
            record,
            analysis,
            applied: application.applied.into_iter().collect(),
            trusted,
            saved: save,
        })
    }
}
