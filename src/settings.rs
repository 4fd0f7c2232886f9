use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::coverage::{CoverageThresholds, MetricThresholds};
use crate::config::DEFAULT_COVERAGE_THRESHOLD;
use crate::error::{Result, TesterError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSettings {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TesterSettings {
    #[serde(default)]
    pub thresholds: Option<CoverageThresholds>,
    #[serde(default)]
    pub dashboard: Option<DashboardSettings>,
}

impl TesterSettings {
    /// Configured thresholds, or the default uniform global minimum.
    pub fn effective_thresholds(&self) -> CoverageThresholds {
        self.thresholds.clone().unwrap_or_else(|| {
            CoverageThresholds::global(MetricThresholds::uniform(DEFAULT_COVERAGE_THRESHOLD))
        })
    }
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<TesterSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(TesterSettings::default());
        }
        Err(e) => return Err(TesterError::file(path, e)),
    };

    let settings: TesterSettings = serde_json::from_str(&content).map_err(|e| {
        TesterError::Validation(format!("invalid settings file {}: {}", path.display(), e))
    })?;
    validate(&settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &TesterSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TesterError::Validation(format!("settings not serializable: {e}")))?;
    std::fs::write(path, json).map_err(|e| {
        warn!("Failed to save settings to {:?}: {}", path, e);
        TesterError::file(path, e)
    })
}

/// Thresholds are percentages: each configured value must be in `0..=100`.
pub fn validate(settings: &TesterSettings) -> Result<()> {
    let Some(thresholds) = &settings.thresholds else {
        return Ok(());
    };
    for (scope, metric, value) in thresholds.configured() {
        if !(0.0..=100.0).contains(&value) {
            return Err(TesterError::Validation(format!(
                "{} threshold for {} must be between 0 and 100, got {}",
                metric.label(),
                scope,
                value
            )));
        }
    }
    Ok(())
}
