use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_population() -> u64 {
    50
}

fn default_transmission_chance() -> f64 {
    0.1
}

fn default_death_chance() -> f64 {
    0.08
}

fn default_exchange_chance() -> f64 {
    0.15
}

fn default_travel_chance() -> f64 {
    0.001
}

fn default_immunity_growth_max() -> f64 {
    0.015
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("immunity growth range [{min}, {max}] must be ordered and within [0, 1]")]
    InvalidImmunityRange { min: f64, max: f64 },
    #[error("override at ({x}, {y}) lies outside the {width}x{height} grid")]
    OverrideOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("district ({x}, {y}) is overridden more than once")]
    DuplicateOverride { x: u32, y: u32 },
    #[error("district ({x}, {y}) is missing, duplicated or outside the grid")]
    MisplacedDistrict { x: u32, y: u32 },
    #[error("scenario name {name:?} must be a single non-empty path component")]
    InvalidScenarioName { name: String },
    #[error("snapshot holds {found} districts, a {width}x{height} grid needs {expected}")]
    SnapshotShape {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { field, value })
    }
}

/// Scenario names become a snapshot subdirectory, so they may not climb out
/// of the output directory or nest below it.
pub fn validate_scenario_name(name: &str) -> Result<(), ConfigError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':']);
    if invalid {
        Err(ConfigError::InvalidScenarioName {
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Bounds of the per-tick immunity increment. Carried by every district but
/// not applied by the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImmunityGrowth {
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_immunity_growth_max")]
    pub max: f64,
}

impl Default for ImmunityGrowth {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_immunity_growth_max(),
        }
    }
}

/// Epidemiological parameters shared by every district unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistrictConfig {
    #[serde(default = "default_population")]
    pub population: u64,
    #[serde(default = "default_transmission_chance")]
    pub transmission_chance: f64,
    #[serde(default = "default_death_chance")]
    pub death_chance: f64,
    #[serde(default = "default_exchange_chance")]
    pub exchange_chance: f64,
    #[serde(default = "default_travel_chance")]
    pub travel_chance: f64,
    #[serde(default)]
    pub immunity_growth: ImmunityGrowth,
}

impl Default for DistrictConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
            transmission_chance: default_transmission_chance(),
            death_chance: default_death_chance(),
            exchange_chance: default_exchange_chance(),
            travel_chance: default_travel_chance(),
            immunity_growth: ImmunityGrowth::default(),
        }
    }
}

impl DistrictConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("transmission_chance", self.transmission_chance)?;
        check_probability("death_chance", self.death_chance)?;
        check_probability("exchange_chance", self.exchange_chance)?;
        check_probability("travel_chance", self.travel_chance)?;

        let growth = self.immunity_growth;
        let in_range = (0.0..=1.0).contains(&growth.min) && (0.0..=1.0).contains(&growth.max);
        if !in_range || growth.min > growth.max {
            return Err(ConfigError::InvalidImmunityRange {
                min: growth.min,
                max: growth.max,
            });
        }
        Ok(())
    }
}

/// How the exchange pass treats an attempt where both or neither direction
/// is active.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeMode {
    /// A stalemate ends the district's whole exchange for the tick.
    #[default]
    Legacy,
    /// A stalemate only skips the individual that caused it.
    Strict,
}

/// Replaces selected parameters of a single district.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictOverride {
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub transmission_chance: Option<f64>,
    #[serde(default)]
    pub exchange_chance: Option<f64>,
}

impl DistrictOverride {
    pub fn apply(&self, base: DistrictConfig) -> DistrictConfig {
        DistrictConfig {
            population: self.population.unwrap_or(base.population),
            transmission_chance: self.transmission_chance.unwrap_or(base.transmission_chance),
            exchange_chance: self.exchange_chance.unwrap_or(base.exchange_chance),
            ..base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub district: DistrictConfig,
    #[serde(default)]
    pub overrides: Vec<DistrictOverride>,
}

impl GridConfig {
    pub fn new(width: u32, height: u32, district: DistrictConfig) -> Self {
        Self {
            width,
            height,
            district,
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, district_override: DistrictOverride) -> Self {
        self.overrides.push(district_override);
        self
    }

    pub fn district_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        self.district.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.overrides {
            if entry.x >= self.width || entry.y >= self.height {
                return Err(ConfigError::OverrideOutOfBounds {
                    x: entry.x,
                    y: entry.y,
                    width: self.width,
                    height: self.height,
                });
            }
            if !seen.insert((entry.x, entry.y)) {
                return Err(ConfigError::DuplicateOverride {
                    x: entry.x,
                    y: entry.y,
                });
            }
            entry.apply(self.district).validate()?;
        }
        Ok(())
    }

    /// Effective parameters for the district at `(x, y)`.
    pub fn district_config_at(&self, x: u32, y: u32) -> DistrictConfig {
        self.overrides
            .iter()
            .find(|entry| entry.x == x && entry.y == y)
            .map(|entry| entry.apply(self.district))
            .unwrap_or(self.district)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
