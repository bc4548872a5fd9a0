use std::any::Any;

use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    grid::Grid,
    rng::SystemRng,
};

pub struct LocalInfectionSystem {
    latest_new_infections: Option<u64>,
}

impl LocalInfectionSystem {
    pub fn new() -> Self {
        Self {
            latest_new_infections: None,
        }
    }

    pub fn latest_new_infections(&self) -> Option<u64> {
        self.latest_new_infections
    }
}

impl Default for LocalInfectionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LocalInfectionSystem {
    fn name(&self) -> &str {
        "local_infection"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        grid: &mut Grid,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let newly_infected = grid.run_local_infection_pass_with_progress(rng, ctx.progress);
        self.latest_new_infections = Some(newly_infected);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
