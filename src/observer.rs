//! Read-only hooks for whatever presents the simulation: renderers get a
//! frame after every tick, progress reporters get `(completed, total)`
//! during long grid traversals.

use tracing::{event, Level};

use crate::engine::{SimulationPhase, TickSummary};
use crate::grid::Grid;

/// What a renderer needs from one district.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistrictView {
    pub x: u32,
    pub y: u32,
    pub infected: u64,
    pub population: u64,
}

impl DistrictView {
    /// `1 - infected / population`; renderers map this onto their
    /// green-yellow-red gradient. An empty district counts as healthy.
    pub fn health(&self) -> f64 {
        if self.population == 0 {
            1.0
        } else {
            1.0 - self.infected as f64 / self.population as f64
        }
    }
}

pub struct TickFrame<'a> {
    pub tick: u64,
    pub phase: SimulationPhase,
    pub summary: &'a TickSummary,
    pub grid: &'a Grid,
}

pub trait TickObserver {
    fn on_tick(&mut self, frame: &TickFrame<'_>);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickFrame<'_>),
{
    fn on_tick(&mut self, frame: &TickFrame<'_>) {
        self(frame)
    }
}

pub struct NoObserver;

impl TickObserver for NoObserver {
    fn on_tick(&mut self, _frame: &TickFrame<'_>) {}
}

pub trait ProgressReporter {
    fn report(&self, completed: usize, total: usize);
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _completed: usize, _total: usize) {}
}

/// Emits a trace event each time progress crosses a whole percent.
/// Target and level of `LogProgress` events.
pub const PROGRESS_TARGET: &str = "outbreak::progress";
pub const PROGRESS_LEVEL: Level = Level::INFO;

pub struct LogProgress {
    label: &'static str,
}

impl LogProgress {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, completed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let percent = completed * 100 / total;
        let previous = completed.saturating_sub(1) * 100 / total;
        if completed == total || percent != previous {
            event!(
                target: PROGRESS_TARGET,
                PROGRESS_LEVEL,
                label = self.label,
                completed,
                total,
                percent,
                "{} {completed}/{total} districts",
                self.label
            );
        }
    }
}
