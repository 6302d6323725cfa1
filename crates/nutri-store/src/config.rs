use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use nutri_core::constants::{DEFAULT_CRASH_OFFSET_HOURS, DEFAULT_GI, LAST_HOUR_OF_DAY};
use nutri_core::{AnalysisContext, MacroTargets};

use crate::error::{Result, StoreError};

/// User settings read from `config.toml` in the data directory.
///
/// ```toml
/// device_id = "kitchen-tablet"
/// crash_offset_hours = 2
/// default_gi = 55
///
/// [targets]
/// calories = 1800
/// protein_g = 90
/// ```
///
/// Every key is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device_id: Option<String>,
    pub crash_offset_hours: u32,
    pub default_gi: f64,
    pub targets: MacroTargets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: None,
            crash_offset_hours: DEFAULT_CRASH_OFFSET_HOURS,
            default_gi: DEFAULT_GI,
            targets: MacroTargets::default(),
        }
    }
}

impl Config {
    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .map_err(|e| StoreError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(StoreError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| {
            StoreError::Config(format!("failed to write {}: {e}", path.display()))
        })
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.default_gi) {
            return Err(StoreError::Config(format!(
                "default_gi must be within 0..=100, got {}",
                self.default_gi
            )));
        }
        if self.crash_offset_hours > LAST_HOUR_OF_DAY {
            return Err(StoreError::Config(format!(
                "crash_offset_hours must be at most {LAST_HOUR_OF_DAY}, got {}",
                self.crash_offset_hours
            )));
        }
        let t = &self.targets;
        if [t.calories, t.protein_g, t.fat_g, t.carbs_g]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(StoreError::Config(
                "targets must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// The analysis context for a meal eaten at `current_hour`.
    pub fn analysis_context(&self, current_hour: u32) -> AnalysisContext {
        AnalysisContext {
            targets: self.targets,
            gi: Some(self.default_gi),
            current_hour: current_hour.min(LAST_HOUR_OF_DAY),
            crash_offset_hours: self.crash_offset_hours,
        }
    }
}
