pub mod config;
pub mod district;
pub mod engine;
pub mod grid;
pub mod observer;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod stats;
pub mod systems;

pub use config::{ConfigError, DistrictConfig, ExchangeMode, GridConfig};
pub use district::District;
pub use engine::{RunOutcome, Simulation, SimulationBuilder, SimulationPhase, TickSummary};
pub use grid::{Grid, Position};
pub use stats::GridStats;
