use std::any::Any;

use anyhow::Result;

use crate::{
    config::ExchangeMode,
    engine::{System, SystemContext},
    grid::{ExchangeReport, Grid},
    rng::SystemRng,
};

pub struct ExchangeSystem {
    mode: ExchangeMode,
    latest: Option<ExchangeReport>,
}

impl ExchangeSystem {
    pub fn new(mode: ExchangeMode) -> Self {
        Self { mode, latest: None }
    }

    pub fn mode(&self) -> ExchangeMode {
        self.mode
    }

    pub fn latest_report(&self) -> Option<ExchangeReport> {
        self.latest
    }
}

impl Default for ExchangeSystem {
    fn default() -> Self {
        Self::new(ExchangeMode::default())
    }
}

impl System for ExchangeSystem {
    fn name(&self) -> &str {
        "exchange"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        grid: &mut Grid,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        self.latest = Some(grid.run_exchange_pass(self.mode, rng));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
