//! Headless game runner.
//!
//! Loads a scenario, ticks it without any presentation layer and reports
//! what happened.

use std::path::Path;

use thiserror::Error;

use dune_core::config::GameOptions;
use dune_core::error::GameError;
use dune_core::savegame::SaveGame;
use dune_core::scenario::{ScenarioDescription, ScenarioError, ScenarioLoader};
use dune_core::simulation::Simulation;

use crate::summary::{EventCounts, GameSummary};

/// Errors from the headless runner.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// Scenario or options could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// The game itself failed.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Result of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of each run.
    pub hashes: Vec<u64>,
    /// Whether every run ended with the same hash.
    pub deterministic: bool,
}

/// A scenario being played headless.
#[derive(Debug)]
pub struct GameRunner {
    scenario: String,
    sim: Simulation,
    events: EventCounts,
}

impl GameRunner {
    /// Start a scenario.
    pub fn new(desc: &ScenarioDescription, options: GameOptions) -> Result<Self, HeadlessError> {
        Ok(Self {
            scenario: desc.name.clone(),
            sim: ScenarioLoader::build(desc, options)?,
            events: EventCounts::default(),
        })
    }

    /// Start a scenario from a RON file, with optional RON game options.
    pub fn from_files(scenario: &Path, options: Option<&Path>) -> Result<Self, HeadlessError> {
        let desc = ScenarioDescription::load(scenario)?;
        let options = match options {
            Some(path) => GameOptions::load(path)?,
            None => GameOptions::default(),
        };
        Self::new(&desc, options)
    }

    /// Continue a saved game.
    pub fn from_save(save: &SaveGame) -> Result<Self, HeadlessError> {
        Ok(Self {
            scenario: save.scenario_name.clone(),
            sim: save.restore()?,
            events: EventCounts::default(),
        })
    }

    /// Tick up to `ticks` times, stopping early if the game ends.
    ///
    /// Returns the number of ticks run.
    pub fn run(&mut self, ticks: u64) -> u64 {
        let mut ran = 0;
        while ran < ticks && !self.sim.is_finished() {
            for event in self.sim.tick() {
                self.events.record(&event);
            }
            ran += 1;
        }
        // Events raised by the final tick of a finished game.
        for event in self.sim.drain_events() {
            self.events.record(&event);
        }
        tracing::debug!(ran, cycle = self.sim.cycle(), "Run finished");
        ran
    }

    /// The game.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Event totals so far.
    #[must_use]
    pub const fn events(&self) -> EventCounts {
        self.events
    }

    /// Summarize the game.
    #[must_use]
    pub fn summary(&self) -> GameSummary {
        GameSummary::new(self.scenario.clone(), &self.sim, self.events)
    }

    /// Snapshot the game.
    #[must_use]
    pub fn capture(&self) -> SaveGame {
        SaveGame::capture(self.scenario.clone(), &self.sim)
    }
}

/// Play a scenario `runs` times and compare the final hashes.
pub fn verify_determinism(
    desc: &ScenarioDescription,
    options: GameOptions,
    ticks: u64,
    runs: u32,
) -> Result<VerifyReport, HeadlessError> {
    let mut hashes = Vec::with_capacity(runs as usize);
    for run in 0..runs {
        let mut runner = GameRunner::new(desc, options)?;
        runner.run(ticks);
        let hash = runner.simulation().state_hash();
        tracing::info!(run, cycle = runner.simulation().cycle(), hash, "Verification run complete");
        hashes.push(hash);
    }
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    Ok(VerifyReport {
        scenario: desc.name.clone(),
        ticks,
        hashes,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dune_test_utils::fixtures::{sample_scenario, SAMPLE_SCENARIO};

    #[test]
    fn test_run_counts_events() {
        let mut runner = GameRunner::new(&sample_scenario(), GameOptions::default()).unwrap();
        assert_eq!(runner.run(10), 10);
        let summary = runner.summary();
        assert_eq!(summary.cycle, 10);
        assert_eq!(summary.events.deployed as usize, summary.objects);
        assert!(summary.outcome.is_none());
    }

    #[test]
    fn test_run_stops_at_end() {
        let mut desc = sample_scenario();
        desc.timeout_minutes = Some(0);
        let mut runner = GameRunner::new(&desc, GameOptions::default()).unwrap();
        assert_eq!(runner.run(100), 1);
        let outcome = runner.summary().outcome.unwrap();
        assert_eq!(outcome.result, "timed_out");
    }

    #[test]
    fn test_from_files_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = dir.path().join("basin.ron");
        let options = dir.path().join("options.ron");
        let save = dir.path().join("basin.sav");
        std::fs::write(&scenario, SAMPLE_SCENARIO).unwrap();
        std::fs::write(&options, "(fog_of_war: true, max_units_override: Some(30))").unwrap();

        let mut runner = GameRunner::from_files(&scenario, Some(&options)).unwrap();
        assert!(runner.simulation().options().fog_of_war);
        runner.run(40);
        runner.capture().save_to_file(&save).unwrap();

        let restored = GameRunner::from_save(&SaveGame::load_from_file(&save).unwrap()).unwrap();
        assert_eq!(restored.summary().state_hash, runner.summary().state_hash);
        assert_eq!(restored.summary().houses, runner.summary().houses);
    }

    #[test]
    fn test_bundled_scenario_runs() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/arrakeen.ron");
        let mut runner = GameRunner::from_files(&path, None).unwrap();
        let summary = runner.summary();
        assert_eq!(summary.scenario, "Arrakeen Approach");
        assert_eq!(summary.houses.len(), 2);
        runner.run(500);
        assert_eq!(runner.simulation().cycle(), 500);
    }

    #[test]
    fn test_missing_scenario() {
        assert!(matches!(
            GameRunner::from_files(Path::new("/nonexistent/scenario.ron"), None),
            Err(HeadlessError::Scenario(ScenarioError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_verify_determinism() {
        let report = verify_determinism(&sample_scenario(), GameOptions::default(), 200, 3).unwrap();
        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 3);
    }
}
