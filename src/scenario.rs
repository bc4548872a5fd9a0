use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    config::{
        validate_scenario_name, ConfigError, ExchangeMode, GridConfig, LoggingConfig,
    },
    engine::SimulationSettings,
    snapshot::SnapshotConfig,
};

fn default_ticks() -> u64 {
    50
}

fn default_initial_infections() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_initial_infections")]
    pub initial_infections: u32,
    #[serde(default)]
    pub exchange_mode: ExchangeMode,
    pub grid: GridConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text).context("invalid scenario yaml")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_scenario_name(&self.name)?;
        self.grid.validate()
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.unwrap_or(self.ticks)
    }

    pub fn settings(&self) -> SimulationSettings {
        SimulationSettings::new(self.name.clone(), self.seed)
            .with_exchange_mode(self.exchange_mode)
            .with_initial_infections(self.initial_infections)
            .with_snapshot(self.snapshot.clone())
    }
}
