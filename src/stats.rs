use serde::{Deserialize, Serialize};

use crate::district::District;

/// Point-in-time aggregate of the grid, rebuilt on every call to
/// [`crate::Grid::generate_stats`]. Lists are in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStats {
    pub infected: Vec<u64>,
    pub population: Vec<u64>,
    pub infected_mean: f64,
    pub population_mean: f64,
    pub total_infected: u64,
    pub total_population: u64,
}

impl GridStats {
    pub fn from_districts<'a>(districts: impl IntoIterator<Item = &'a District>) -> Self {
        let (infected, population): (Vec<u64>, Vec<u64>) = districts
            .into_iter()
            .map(|district| (district.infected(), district.population()))
            .unzip();
        let total_infected = infected.iter().sum();
        let total_population = population.iter().sum();
        Self {
            infected_mean: mean(&infected),
            population_mean: mean(&population),
            infected,
            population,
            total_infected,
            total_population,
        }
    }

    pub fn all_infected(&self) -> bool {
        self.infected
            .iter()
            .zip(&self.population)
            .all(|(infected, population)| infected == population)
    }

    pub fn infected_share(&self) -> f64 {
        if self.total_population == 0 {
            0.0
        } else {
            self.total_infected as f64 / self.total_population as f64
        }
    }
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}
