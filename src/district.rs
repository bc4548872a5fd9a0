use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DistrictConfig, ImmunityGrowth};
use crate::grid::Position;
use crate::rng::RngExt;

/// One grid cell: a fixed population and how many of them are infected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    position: Position,
    population: u64,
    infected: u64,
    immunity: f64,
    pub transmission_chance: f64,
    pub death_chance: f64,
    pub exchange_chance: f64,
    pub travel_chance: f64,
    pub immunity_growth: ImmunityGrowth,
}

impl District {
    pub fn new(position: Position, config: DistrictConfig) -> Self {
        Self {
            position,
            population: config.population,
            infected: 0,
            immunity: 0.0,
            transmission_chance: config.transmission_chance,
            death_chance: config.death_chance,
            exchange_chance: config.exchange_chance,
            travel_chance: config.travel_chance,
            immunity_growth: config.immunity_growth,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn infected(&self) -> u64 {
        self.infected
    }

    pub fn immunity(&self) -> f64 {
        self.immunity
    }

    pub fn set_immunity(&mut self, immunity: f64) {
        self.immunity = immunity.clamp(0.0, 1.0);
    }

    /// Overwrites the infected count, clamped to the population.
    pub fn set_infected(&mut self, infected: u64) {
        self.infected = infected.min(self.population);
    }

    pub fn is_fully_infected(&self) -> bool {
        self.infected == self.population
    }

    pub fn has_capacity(&self) -> bool {
        self.infected < self.population
    }

    /// Share of the population that is infected, `0.0` for an empty district.
    pub fn infected_ratio(&self) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            self.infected as f64 / self.population as f64
        }
    }

    /// Every infected person gets one transmission attempt, damped by
    /// immunity. Returns the number of new infections after clamping.
    pub fn infect_locally<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        let chance = self.transmission_chance * (1.0 - self.immunity);
        let newly_infected = (0..self.infected).filter(|_| rng.chance(chance)).count() as u64;
        let before = self.infected;
        self.infected = (self.infected + newly_infected).min(self.population);
        self.infected - before
    }

    pub fn infect_random_person(&mut self) -> bool {
        if self.has_capacity() {
            self.infected += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn release_one(&mut self) -> bool {
        if self.infected > 0 {
            self.infected -= 1;
            true
        } else {
            false
        }
    }
}
