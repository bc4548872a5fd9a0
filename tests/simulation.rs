use std::path::PathBuf;

use outbreak::{
    config::{ConfigError, DistrictConfig, ExchangeMode, GridConfig},
    engine::{SimulationBuilder, SimulationError, SimulationPhase, SimulationSettings},
    observer::{TickFrame, TickObserver},
    scenario::{Scenario, ScenarioLoader},
    snapshot::{load_snapshot, SnapshotConfig},
    systems::LocalInfectionSystem,
};

fn scenario_loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

fn tiny_block() -> Scenario {
    scenario_loader()
        .load(PathBuf::from("scenarios/tiny_block.yaml"))
        .expect("scenario parses")
}

fn single_district(population: u64, transmission_chance: f64) -> SimulationBuilder {
    let district = DistrictConfig {
        population,
        transmission_chance,
        exchange_chance: 1.0,
        ..DistrictConfig::default()
    };
    SimulationBuilder::new(
        SimulationSettings::new("single", 5),
        GridConfig::new(1, 1, district),
    )
}

#[derive(Default)]
struct Recorder {
    ticks: Vec<u64>,
    infected: Vec<Vec<u64>>,
    out_of_range: usize,
}

impl TickObserver for Recorder {
    fn on_tick(&mut self, frame: &TickFrame<'_>) {
        self.ticks.push(frame.tick);
        self.infected
            .push(frame.grid.views().map(|view| view.infected).collect());
        self.out_of_range += frame
            .grid
            .views()
            .filter(|view| view.infected > view.population)
            .count();
    }
}

#[test]
fn doubling_district_converges_on_the_third_tick() {
    let mut simulation = single_district(8, 1.0).build().unwrap();
    let mut recorder = Recorder::default();
    let outcome = simulation.run_with_observer(50, &mut recorder).unwrap();

    assert_eq!(outcome.phase, SimulationPhase::Converged);
    assert_eq!(outcome.ticks, 3);
    assert_eq!(recorder.ticks, vec![1, 2, 3]);
    assert_eq!(recorder.infected, vec![vec![2], vec![4], vec![8]]);
    assert!(outcome.stats.all_infected());
}

#[test]
fn tick_budget_exhausts_before_convergence() {
    let mut simulation = single_district(8, 1.0).build().unwrap();
    let outcome = simulation.run(2).unwrap();

    assert_eq!(outcome.phase, SimulationPhase::Exhausted);
    assert_eq!(outcome.ticks, 2);
    assert_eq!(outcome.stats.total_infected, 4);
}

#[test]
fn zero_transmission_never_spreads() {
    let mut simulation = single_district(8, 0.0).build().unwrap();
    let outcome = simulation.run(10).unwrap();

    assert_eq!(outcome.phase, SimulationPhase::Exhausted);
    assert_eq!(outcome.ticks, 10);
    assert_eq!(outcome.stats.total_infected, 1);
}

#[test]
fn grid_full_after_seeding_converges_without_ticking() {
    let mut simulation = single_district(1, 0.5).build().unwrap();
    let mut recorder = Recorder::default();
    let outcome = simulation.run_with_observer(10, &mut recorder).unwrap();

    assert_eq!(outcome.phase, SimulationPhase::Converged);
    assert_eq!(outcome.ticks, 0);
    assert!(recorder.ticks.is_empty());
}

#[test]
fn terminal_simulation_does_not_mutate() {
    let mut simulation = single_district(8, 1.0).build().unwrap();
    let first = simulation.run(2).unwrap();

    assert!(simulation.step().unwrap().is_none());
    let second = simulation.run(100).unwrap();
    assert_eq!(first, second);
    assert_eq!(simulation.current_tick(), 2);
    assert_eq!(simulation.grid().total_infected(), 4);
}

#[test]
fn construction_rejects_malformed_grid() {
    let result = SimulationBuilder::new(
        SimulationSettings::new("broken", 1),
        GridConfig::new(0, 3, DistrictConfig::default()),
    )
    .build();
    assert!(result.is_err());
}

#[test]
fn construction_rejects_scenario_names_outside_the_snapshot_dir() {
    let result = SimulationBuilder::new(
        SimulationSettings::new("../elsewhere", 1),
        GridConfig::new(2, 2, DistrictConfig::default()),
    )
    .build();
    assert!(matches!(
        result,
        Err(SimulationError::Config(ConfigError::InvalidScenarioName { .. }))
    ));
}

#[test]
fn seeding_happens_once_before_the_first_tick() {
    let mut scenario = tiny_block();
    // Every district can take the seed.
    scenario.grid.overrides.clear();
    let mut simulation = SimulationBuilder::from_scenario(&scenario).build().unwrap();
    assert_eq!(simulation.phase(), SimulationPhase::Init);

    let seeded = simulation.seed().unwrap().to_vec();
    assert_eq!(seeded.len(), 1);
    assert_eq!(simulation.phase(), SimulationPhase::Running);
    assert_eq!(simulation.grid().total_infected(), 1);

    simulation.seed().unwrap();
    assert_eq!(simulation.grid().total_infected(), 1);
}

#[test]
fn same_seed_reproduces_every_tick() {
    let scenario = tiny_block();
    let run = |scenario: &Scenario| {
        let mut simulation = SimulationBuilder::from_scenario(scenario).build().unwrap();
        let mut recorder = Recorder::default();
        let outcome = simulation.run_with_observer(40, &mut recorder).unwrap();
        (outcome, recorder.infected)
    };

    let (outcome_a, history_a) = run(&scenario);
    let (outcome_b, history_b) = run(&scenario);
    assert_eq!(history_a, history_b);
    assert_eq!(outcome_a.phase, outcome_b.phase);
    assert_eq!(outcome_a.stats, outcome_b.stats);
}

#[test]
fn counts_stay_in_range_for_both_exchange_modes() {
    for mode in [ExchangeMode::Legacy, ExchangeMode::Strict] {
        let mut scenario = tiny_block();
        scenario.exchange_mode = mode;
        let mut simulation = SimulationBuilder::from_scenario(&scenario).build().unwrap();
        let mut recorder = Recorder::default();
        let outcome = simulation
            .run_with_observer(scenario.ticks, &mut recorder)
            .unwrap();

        assert_eq!(recorder.out_of_range, 0, "mode {mode:?}");
        assert!(outcome.phase.is_terminal());
        assert!(outcome.ticks <= scenario.ticks);
        assert_eq!(recorder.ticks.len() as u64, outcome.ticks);
        assert_eq!(
            outcome.phase == SimulationPhase::Converged,
            outcome.stats.all_infected()
        );
        // The empty district stays empty whatever happens around it.
        assert_eq!(outcome.stats.population[23], 0);
        assert_eq!(outcome.stats.infected[23], 0);
    }
}

#[test]
fn custom_pipeline_skips_exchange() {
    let mut simulation = single_district(8, 1.0)
        .with_system(LocalInfectionSystem::new())
        .build()
        .unwrap();
    let summary = simulation.step().unwrap().expect("tick runs");

    assert_eq!(summary.tick, 1);
    assert!(summary.exchange.is_none());
    assert_eq!(summary.new_infections, Some(1));
    assert_eq!(summary.system_reports.len(), 1);
    assert_eq!(summary.system_reports[0].name, "local_infection");
}

#[test]
fn default_pipeline_reports_exchange_then_local() {
    let mut simulation = single_district(8, 1.0).build().unwrap();
    let summary = simulation.step().unwrap().expect("tick runs");
    let names: Vec<&str> = summary
        .system_reports
        .iter()
        .map(|report| report.name.as_str())
        .collect();

    assert_eq!(names, vec!["exchange", "local_infection"]);
    let exchange = summary.exchange.expect("exchange report");
    assert_eq!(exchange.moves(), 0);
    assert_eq!(summary.total_infected, 2);
}

#[test]
fn snapshots_are_written_on_interval_and_at_the_end() {
    let temp = tempfile::tempdir().unwrap();
    let mut scenario = tiny_block();
    scenario.snapshot = SnapshotConfig {
        interval_ticks: 5,
        output_dir: temp.path().join("saves"),
    };

    let mut simulation = SimulationBuilder::from_scenario(&scenario).build().unwrap();
    assert!(temp.path().join("saves").is_dir());
    let outcome = simulation.run(7).unwrap();
    assert_eq!(outcome.phase, SimulationPhase::Exhausted);

    let dir = temp.path().join("saves").join("tiny_block");
    assert!(dir.join("tick_000005.json").exists());
    let last = load_snapshot(dir.join("tick_000007.json")).unwrap();
    assert_eq!(last.tick, 7);
    assert_eq!((last.width, last.height), (6, 4));

    let restored = last.restore(&scenario.grid.district).unwrap();
    assert_eq!(restored.generate_stats(), outcome.stats);
}
