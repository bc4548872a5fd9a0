//! The city: a toroidal grid of districts and the two per-tick passes that
//! move infection around it.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ExchangeMode, GridConfig};
use crate::district::District;
use crate::observer::{DistrictView, NoProgress, ProgressReporter};
use crate::rng::RngExt;
use crate::stats::GridStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Up,
    Right,
    Down,
}

impl Direction {
    /// Neighbour visiting order used by the exchange pass.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Up,
        Direction::Right,
        Direction::Down,
    ];
}

/// Counters for one exchange pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    /// Infected individuals sampled against a neighbour.
    pub attempts: u64,
    pub moved_out: u64,
    pub moved_in: u64,
    /// Samples where both directions or neither came up.
    pub stalemates: u64,
    /// Districts whose exchange was cut short by a stalemate in legacy mode.
    pub halted_districts: u64,
}

impl ExchangeReport {
    pub fn moves(&self) -> u64 {
        self.moved_out + self.moved_in
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeDecision {
    Outbound,
    Inbound,
    Stalemate,
}

impl ExchangeDecision {
    fn from_directions(travel_out: bool, travel_in: bool) -> Self {
        match (travel_out, travel_in) {
            (true, false) => ExchangeDecision::Outbound,
            (false, true) => ExchangeDecision::Inbound,
            _ => ExchangeDecision::Stalemate,
        }
    }
}

enum ExchangeFlow {
    Completed,
    Halted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<District>,
}

impl Grid {
    pub fn new(config: &GridConfig) -> Result<Self, ConfigError> {
        Self::build(config, &NoProgress)
    }

    pub fn build(config: &GridConfig, progress: &dyn ProgressReporter) -> Result<Self, ConfigError> {
        config.validate()?;
        let total = config.district_count();
        let mut cells = Vec::with_capacity(total);
        for y in 0..config.height {
            for x in 0..config.width {
                cells.push(District::new(
                    Position::new(x, y),
                    config.district_config_at(x, y),
                ));
                progress.report(cells.len(), total);
            }
        }
        Ok(Self {
            width: config.width,
            height: config.height,
            cells,
        })
    }

    /// Assembles a grid from districts carrying their own positions, e.g.
    /// when restoring a snapshot. Every coordinate must appear exactly once.
    pub(crate) fn from_cells(
        width: u32,
        height: u32,
        mut cells: Vec<District>,
    ) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(ConfigError::SnapshotShape {
                width,
                height,
                expected,
                found: cells.len(),
            });
        }
        cells.sort_by_key(|district| (district.position().y, district.position().x));
        for (index, district) in cells.iter().enumerate() {
            let expected = Position::new(index as u32 % width, index as u32 / width);
            if district.position() != expected {
                return Err(ConfigError::MisplacedDistrict {
                    x: district.position().x,
                    y: district.position().y,
                });
            }
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    fn index(&self, position: Position) -> usize {
        position.y as usize * self.width as usize + position.x as usize
    }

    pub fn district(&self, position: Position) -> Option<&District> {
        if self.contains(position) {
            self.cells.get(self.index(position))
        } else {
            None
        }
    }

    pub fn district_mut(&mut self, position: Position) -> Option<&mut District> {
        if self.contains(position) {
            let index = self.index(position);
            self.cells.get_mut(index)
        } else {
            None
        }
    }

    /// Districts in row-major order.
    pub fn districts(&self) -> impl Iterator<Item = &District> {
        self.cells.iter()
    }

    pub fn views(&self) -> impl Iterator<Item = DistrictView> + '_ {
        self.cells.iter().map(|district| {
            let position = district.position();
            DistrictView {
                x: position.x,
                y: position.y,
                infected: district.infected(),
                population: district.population(),
            }
        })
    }

    /// Coordinates outside the grid are wrapped onto it first.
    pub fn neighbor(&self, position: Position, direction: Direction) -> Position {
        let (x, y) = (position.x % self.width, position.y % self.height);
        match direction {
            Direction::Left => Position::new(if x == 0 { self.width - 1 } else { x - 1 }, y),
            Direction::Up => Position::new(x, if y == 0 { self.height - 1 } else { y - 1 }),
            Direction::Right => Position::new((x + 1) % self.width, y),
            Direction::Down => Position::new(x, (y + 1) % self.height),
        }
    }

    /// Left, up, right and down of `(x, y)`, always wrapping around the edges.
    pub fn neighbors(&self, x: u32, y: u32) -> [Position; 4] {
        let center = Position::new(x, y);
        Direction::ALL.map(|direction| self.neighbor(center, direction))
    }

    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        Position::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height))
    }

    /// Returns false when the position is off the grid or the district is
    /// already fully infected.
    pub fn infect_at(&mut self, position: Position) -> bool {
        self.district_mut(position)
            .map(District::infect_random_person)
            .unwrap_or(false)
    }

    pub fn seed_random_infection<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Position {
        let position = self.random_position(rng);
        self.infect_at(position);
        position
    }

    /// Returns the number of new infections across the grid.
    pub fn run_local_infection_pass<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        self.run_local_infection_pass_with_progress(rng, &NoProgress)
    }

    pub fn run_local_infection_pass_with_progress<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        progress: &dyn ProgressReporter,
    ) -> u64 {
        let total = self.cells.len();
        let mut newly_infected = 0;
        for (index, district) in self.cells.iter_mut().enumerate() {
            newly_infected += district.infect_locally(rng);
            progress.report(index + 1, total);
        }
        newly_infected
    }

    /// Moves infected individuals between neighbouring districts. Districts
    /// are visited in row-major order and updated in place, so a district
    /// that received someone earlier in the pass exchanges with that count.
    ///
    /// Each infected individual samples leaving (`exchange_chance`) and the
    /// neighbour independently samples sending someone in (its infected
    /// share). Exactly one direction moves a unit; otherwise it is a
    /// stalemate, which ends the district's exchange in legacy mode.
    pub fn run_exchange_pass<R: Rng + ?Sized>(
        &mut self,
        mode: ExchangeMode,
        rng: &mut R,
    ) -> ExchangeReport {
        let mut report = ExchangeReport::default();
        for index in 0..self.cells.len() {
            if self.cells[index].infected() == 0 {
                continue;
            }
            if let ExchangeFlow::Halted = self.exchange_from(index, mode, rng, &mut report) {
                report.halted_districts += 1;
            }
        }
        report
    }

    fn exchange_from<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        mode: ExchangeMode,
        rng: &mut R,
        report: &mut ExchangeReport,
    ) -> ExchangeFlow {
        let origin = self.cells[index].position();
        let exchange_chance = self.cells[index].exchange_chance;
        for direction in Direction::ALL {
            let target = self.index(self.neighbor(origin, direction));
            let present = self.cells[index].infected();
            for _ in 0..present {
                report.attempts += 1;
                let travel_out = rng.chance(exchange_chance);
                let travel_in = rng.chance(self.cells[target].infected_ratio());
                match ExchangeDecision::from_directions(travel_out, travel_in) {
                    ExchangeDecision::Outbound => {
                        if self.transfer(index, target) {
                            report.moved_out += 1;
                        }
                    }
                    ExchangeDecision::Inbound => {
                        if self.transfer(target, index) {
                            report.moved_in += 1;
                        }
                    }
                    ExchangeDecision::Stalemate => {
                        report.stalemates += 1;
                        if mode == ExchangeMode::Legacy {
                            return ExchangeFlow::Halted;
                        }
                    }
                }
            }
        }
        ExchangeFlow::Completed
    }

    /// Moves one infected unit. Nothing moves unless the giver has someone
    /// infected and the receiver has room, which keeps both counts in range
    /// and the grid total unchanged.
    fn transfer(&mut self, from: usize, to: usize) -> bool {
        if from == to || self.cells[from].infected() == 0 || !self.cells[to].has_capacity() {
            return false;
        }
        self.cells[from].release_one();
        self.cells[to].infect_random_person();
        true
    }

    pub fn is_fully_infected(&self) -> bool {
        self.cells.iter().all(District::is_fully_infected)
    }

    pub fn total_infected(&self) -> u64 {
        self.cells.iter().map(District::infected).sum()
    }

    pub fn total_population(&self) -> u64 {
        self.cells.iter().map(District::population).sum()
    }

    pub fn generate_stats(&self) -> GridStats {
        GridStats::from_districts(&self.cells)
    }
}
