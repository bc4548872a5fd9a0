use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outbreak::{
    config::ExchangeMode, engine::SimulationBuilder, observer::LogProgress,
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Toroidal district outbreak simulation")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/default_city.yaml")]
    scenario: PathBuf,

    /// Override the tick budget (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the master random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override how exchange stalemates are handled
    #[arg(long, value_enum)]
    mode: Option<ExchangeMode>,

    /// Override snapshot interval in ticks (0 disables snapshots)
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Log construction and per-pass progress at the info level
    #[arg(long)]
    progress: bool,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    init_tracing(&scenario.logging.level);

    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }
    if let Some(mode) = cli.mode {
        scenario.exchange_mode = mode;
    }
    if let Some(interval) = cli.snapshot_interval {
        scenario.snapshot.interval_ticks = interval;
    }
    if let Some(dir) = cli.snapshot_dir {
        scenario.snapshot.output_dir = dir;
    }
    let ticks = scenario.ticks(cli.ticks);

    let mut builder = SimulationBuilder::from_scenario(&scenario);
    if cli.progress {
        builder = builder.with_progress(LogProgress::new("districts"));
    }
    let mut simulation = builder.build()?;

    info!(scenario = %scenario.name, ticks, "starting run");
    let outcome = simulation.run(ticks)?;
    println!(
        "Scenario '{}' {} after {} ticks. Infected: {}/{} ({:.1}%)",
        scenario.name,
        outcome.phase,
        outcome.ticks,
        outcome.stats.total_infected,
        outcome.stats.total_population,
        outcome.stats.infected_share() * 100.0
    );
    Ok(())
}
