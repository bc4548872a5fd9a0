use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{validate_scenario_name, ConfigError, ExchangeMode, GridConfig};
use crate::grid::{ExchangeReport, Grid, Position};
use crate::observer::{NoObserver, NoProgress, ProgressReporter, TickFrame, TickObserver};
use crate::rng::{RngManager, SystemRng};
use crate::scenario::Scenario;
use crate::snapshot::{SnapshotConfig, SnapshotError, SnapshotWriter};
use crate::stats::GridStats;
use crate::systems::{ExchangeSystem, LocalInfectionSystem};

const SEEDING_STREAM: &str = "seeding";

pub struct SimulationSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub initial_infections: u32,
    pub exchange_mode: ExchangeMode,
    pub snapshot: SnapshotConfig,
}

impl SimulationSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            initial_infections: 1,
            exchange_mode: ExchangeMode::default(),
            snapshot: SnapshotConfig::default(),
        }
    }

    pub fn with_exchange_mode(mut self, mode: ExchangeMode) -> Self {
        self.exchange_mode = mode;
        self
    }

    pub fn with_initial_infections(mut self, count: u32) -> Self {
        self.initial_infections = count;
        self
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub struct SimulationBuilder {
    settings: SimulationSettings,
    grid: GridConfig,
    systems: Vec<Box<dyn System>>,
    progress: Box<dyn ProgressReporter>,
}

impl SimulationBuilder {
    pub fn new(settings: SimulationSettings, grid: GridConfig) -> Self {
        Self {
            settings,
            grid,
            systems: Vec::new(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self::new(scenario.settings(), scenario.grid.clone())
    }

    /// Replaces the default exchange-then-local pipeline. Systems run in the
    /// order they are added.
    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn build(self) -> Result<Simulation, SimulationError> {
        validate_scenario_name(&self.settings.scenario_name)?;
        let grid = Grid::build(&self.grid, self.progress.as_ref())?;
        let snapshot_writer = SnapshotWriter::new(&self.settings.snapshot)?;
        let systems = if self.systems.is_empty() {
            default_systems(self.settings.exchange_mode)
        } else {
            self.systems
        };
        info!(
            scenario = %self.settings.scenario_name,
            seed = self.settings.seed,
            width = grid.width(),
            height = grid.height(),
            population = grid.total_population(),
            mode = ?self.settings.exchange_mode,
            "grid constructed"
        );
        Ok(Simulation {
            grid,
            rng: RngManager::new(self.settings.seed),
            systems,
            progress: self.progress,
            snapshot_writer,
            settings: self.settings,
            phase: SimulationPhase::Init,
            tick: 0,
            seeded: Vec::new(),
            final_stats: None,
        })
    }
}

fn default_systems(mode: ExchangeMode) -> Vec<Box<dyn System>> {
    vec![
        Box::new(ExchangeSystem::new(mode)),
        Box::new(LocalInfectionSystem::new()),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationPhase {
    Init,
    Seeding,
    Running,
    Converged,
    Exhausted,
}

impl SimulationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationPhase::Converged | SimulationPhase::Exhausted)
    }
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SimulationPhase::Init => "init",
            SimulationPhase::Seeding => "seeding",
            SimulationPhase::Running => "running",
            SimulationPhase::Converged => "converged",
            SimulationPhase::Exhausted => "exhausted",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub phase: SimulationPhase,
    pub system_reports: Vec<SystemRunReport>,
    pub exchange: Option<ExchangeReport>,
    pub new_infections: Option<u64>,
    pub total_infected: u64,
    pub fully_infected: bool,
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunOutcome {
    pub phase: SimulationPhase,
    pub ticks: u64,
    pub stats: GridStats,
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub scenario_name: &'a str,
    pub progress: &'a dyn ProgressReporter,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, grid: &mut Grid, rng: &mut SystemRng<'_>) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
}

pub struct Simulation {
    grid: Grid,
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    progress: Box<dyn ProgressReporter>,
    snapshot_writer: SnapshotWriter,
    settings: SimulationSettings,
    phase: SimulationPhase,
    tick: u64,
    seeded: Vec<Position>,
    final_stats: Option<GridStats>,
}

impl Simulation {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    /// Positions that received the initial infections, in seeding order.
    pub fn seeded_positions(&self) -> &[Position] {
        &self.seeded
    }

    pub fn final_stats(&self) -> Option<&GridStats> {
        self.final_stats.as_ref()
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.final_stats.as_ref().map(|stats| RunOutcome {
            phase: self.phase,
            ticks: self.tick,
            stats: stats.clone(),
        })
    }

    pub fn get_system<T: 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|system| system.as_any().downcast_ref::<T>())
    }

    /// Places the initial infections. Only acts in the `Init` phase.
    pub fn seed(&mut self) -> Result<&[Position]> {
        if self.phase != SimulationPhase::Init {
            return Ok(&self.seeded);
        }
        self.phase = SimulationPhase::Seeding;
        let mut rng = self.rng.stream(SEEDING_STREAM);
        for _ in 0..self.settings.initial_infections {
            let position = self.grid.seed_random_infection(&mut rng);
            self.seeded.push(position);
        }
        info!(seeded = ?self.seeded, "initial infections placed");

        if self.grid.is_fully_infected() {
            self.finish(SimulationPhase::Converged)?;
        } else {
            self.phase = SimulationPhase::Running;
        }
        Ok(&self.seeded)
    }

    /// Advances one tick. Returns `None` once the simulation is terminal.
    pub fn step(&mut self) -> Result<Option<TickSummary>> {
        if self.phase == SimulationPhase::Init {
            self.seed()?;
        }
        if self.phase != SimulationPhase::Running {
            return Ok(None);
        }

        self.tick += 1;
        let tick = self.tick;
        let mut system_reports = Vec::with_capacity(self.systems.len());
        for system in self.systems.iter_mut() {
            let mut rng = self.rng.stream(system.name());
            let ctx = SystemContext {
                tick,
                scenario_name: &self.settings.scenario_name,
                progress: self.progress.as_ref(),
            };
            let start = Instant::now();
            system.run(&ctx, &mut self.grid, &mut rng)?;
            system_reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }

        let fully_infected = self.grid.is_fully_infected();
        let mut snapshot_path =
            self.snapshot_writer
                .maybe_write(&self.grid, &self.settings.scenario_name, tick)?;
        if fully_infected {
            snapshot_path = self.finish(SimulationPhase::Converged)?.or(snapshot_path);
        }

        let summary = TickSummary {
            tick,
            phase: self.phase,
            system_reports,
            exchange: self
                .get_system::<ExchangeSystem>()
                .and_then(ExchangeSystem::latest_report),
            new_infections: self
                .get_system::<LocalInfectionSystem>()
                .and_then(LocalInfectionSystem::latest_new_infections),
            total_infected: self.grid.total_infected(),
            fully_infected,
            snapshot_path,
        };
        debug!(
            tick,
            infected = summary.total_infected,
            moves = summary.exchange.map(|report| report.moves()).unwrap_or(0),
            new_infections = summary.new_infections.unwrap_or(0),
            "tick complete"
        );
        Ok(Some(summary))
    }

    pub fn run(&mut self, max_ticks: u64) -> Result<RunOutcome> {
        self.run_with_observer(max_ticks, &mut NoObserver)
    }

    /// Runs until every district is infected or `max_ticks` ticks have
    /// elapsed in total, notifying `observer` after each tick.
    pub fn run_with_observer<O>(&mut self, max_ticks: u64, observer: &mut O) -> Result<RunOutcome>
    where
        O: TickObserver + ?Sized,
    {
        if self.phase == SimulationPhase::Init {
            self.seed()?;
        }
        while self.phase == SimulationPhase::Running {
            if self.tick >= max_ticks {
                self.finish(SimulationPhase::Exhausted)?;
                break;
            }
            if let Some(summary) = self.step()? {
                observer.on_tick(&TickFrame {
                    tick: summary.tick,
                    phase: self.phase,
                    summary: &summary,
                    grid: &self.grid,
                });
            }
        }

        match self.outcome() {
            Some(outcome) => Ok(outcome),
            None => anyhow::bail!("simulation stopped in phase {} without an outcome", self.phase),
        }
    }

    fn finish(&mut self, phase: SimulationPhase) -> Result<Option<PathBuf>, SnapshotError> {
        self.phase = phase;
        let stats = self.grid.generate_stats();
        info!(
            phase = %phase,
            ticks = self.tick,
            infected = stats.total_infected,
            population = stats.total_population,
            "simulation finished"
        );
        self.final_stats = Some(stats);
        if self.snapshot_writer.is_enabled() {
            let path = self
                .snapshot_writer
                .write(&self.grid, &self.settings.scenario_name, self.tick)?;
            return Ok(Some(path));
        }
        Ok(None)
    }
}
