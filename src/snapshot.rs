use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, DistrictConfig};
use crate::district::District;
use crate::grid::{Grid, Position};

fn default_output_dir() -> PathBuf {
    PathBuf::from("saves")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Write a snapshot every `interval_ticks` ticks; 0 disables periodic
    /// snapshots.
    #[serde(default)]
    pub interval_ticks: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 0,
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSnapshot {
    pub x: u32,
    pub y: u32,
    pub population: u64,
    pub infected: u64,
    pub immunity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub scenario: String,
    pub tick: u64,
    pub saved_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub districts: Vec<DistrictSnapshot>,
}

impl GridSnapshot {
    pub fn capture(grid: &Grid, scenario: &str, tick: u64) -> Self {
        let districts = grid
            .districts()
            .map(|district| DistrictSnapshot {
                x: district.position().x,
                y: district.position().y,
                population: district.population(),
                infected: district.infected(),
                immunity: district.immunity(),
            })
            .collect();
        Self {
            scenario: scenario.to_string(),
            tick,
            saved_at: Utc::now(),
            width: grid.width(),
            height: grid.height(),
            districts,
        }
    }

    /// Rebuilds a grid. Population, infected and immunity come from the
    /// snapshot, the remaining parameters from `template`.
    pub fn restore(&self, template: &DistrictConfig) -> Result<Grid, ConfigError> {
        template.validate()?;
        let cells = self
            .districts
            .iter()
            .map(|entry| {
                let mut district = District::new(
                    Position::new(entry.x, entry.y),
                    DistrictConfig {
                        population: entry.population,
                        ..*template
                    },
                );
                district.set_infected(entry.infected);
                district.set_immunity(entry.immunity);
                district
            })
            .collect();
        Grid::from_cells(self.width, self.height, cells)
    }
}

pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_ticks: u64,
}

impl SnapshotWriter {
    /// Creates the output directory up front when snapshots are enabled.
    pub fn new(config: &SnapshotConfig) -> Result<Self, SnapshotError> {
        if config.interval_ticks > 0 {
            fs::create_dir_all(&config.output_dir)?;
        }
        Ok(Self {
            output_dir: config.output_dir.clone(),
            interval_ticks: config.interval_ticks,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ticks > 0
    }

    pub fn maybe_write(
        &self,
        grid: &Grid,
        scenario: &str,
        tick: u64,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.is_enabled() || tick % self.interval_ticks != 0 {
            return Ok(None);
        }
        self.write(grid, scenario, tick).map(Some)
    }

    pub fn write(&self, grid: &Grid, scenario: &str, tick: u64) -> Result<PathBuf, SnapshotError> {
        let dir = self.output_dir.join(scenario);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("tick_{tick:06}.json"));
        let snapshot = GridSnapshot::capture(grid, scenario, tick);
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(path)
    }
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<GridSnapshot, SnapshotError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn sample_grid() -> Grid {
        let mut grid = Grid::new(&GridConfig::new(3, 2, DistrictConfig::default())).unwrap();
        grid.infect_at(Position::new(2, 1));
        grid.infect_at(Position::new(2, 1));
        if let Some(district) = grid.district_mut(Position::new(0, 1)) {
            district.set_immunity(0.25);
        }
        grid
    }

    #[test]
    fn disabled_writer_skips_every_tick() {
        let temp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(&SnapshotConfig {
            interval_ticks: 0,
            output_dir: temp.path().join("saves"),
        })
        .unwrap();
        let grid = sample_grid();
        assert!(writer.maybe_write(&grid, "city", 10).unwrap().is_none());
        assert!(!temp.path().join("saves").exists());
    }

    #[test]
    fn writes_on_interval_and_restores_state() {
        let temp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(&SnapshotConfig {
            interval_ticks: 5,
            output_dir: temp.path().to_path_buf(),
        })
        .unwrap();
        let grid = sample_grid();

        assert!(writer.maybe_write(&grid, "city", 4).unwrap().is_none());
        let path = writer
            .maybe_write(&grid, "city", 5)
            .unwrap()
            .expect("snapshot on interval");
        assert_eq!(path, temp.path().join("city").join("tick_000005.json"));

        let snapshot = load_snapshot(&path).unwrap();
        assert_eq!(snapshot.tick, 5);
        assert_eq!(snapshot.districts.len(), 6);

        let restored = snapshot.restore(&DistrictConfig::default()).unwrap();
        assert_eq!(restored.generate_stats(), grid.generate_stats());
        let district = restored.district(Position::new(0, 1)).unwrap();
        assert_eq!(district.immunity(), 0.25);
    }

    #[test]
    fn restore_rejects_missing_districts() {
        let mut snapshot = GridSnapshot::capture(&sample_grid(), "city", 0);
        snapshot.districts.pop();
        assert!(matches!(
            snapshot.restore(&DistrictConfig::default()),
            Err(ConfigError::SnapshotShape { found: 5, .. })
        ));

        let mut snapshot = GridSnapshot::capture(&sample_grid(), "city", 0);
        snapshot.districts[0].x = 7;
        assert!(matches!(
            snapshot.restore(&DistrictConfig::default()),
            Err(ConfigError::MisplacedDistrict { .. })
        ));
    }
}
