//! JSON summaries of a game.
//!
//! Summaries are plain serde structs so the CLI can print them with
//! `serde_json` and CI scripts can diff them.

use serde::{Deserialize, Serialize};

use dune_core::house::House;
use dune_core::math::lround;
use dune_core::simulation::{GameEvent, GameOutcome, Simulation};

/// Event totals over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    /// Explosions played.
    pub explosions: u64,
    /// Units and structures that appeared.
    pub deployed: u64,
    /// Units and structures destroyed.
    pub destroyed: u64,
    /// Spice and special blooms set off.
    pub blooms: u64,
    /// Cycles in which some house lost spice to full storage.
    pub spice_lost: u64,
    /// Houses defeated.
    pub defeats: u64,
}

impl EventCounts {
    /// Count one event.
    pub fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Explosion { .. } => self.explosions += 1,
            GameEvent::Deployed { .. } => self.deployed += 1,
            GameEvent::Destroyed { .. } => self.destroyed += 1,
            GameEvent::SpiceBloom { .. } | GameEvent::SpecialBloom { .. } => self.blooms += 1,
            GameEvent::SpiceLost { .. } => self.spice_lost += 1,
            GameEvent::HouseDefeated { .. } => self.defeats += 1,
            GameEvent::ScenarioEnded { .. } => {}
        }
    }
}

/// One house at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseSummary {
    /// House name.
    pub house: String,
    /// Team number.
    pub team: u8,
    /// Whether a computer controls it.
    pub ai: bool,
    /// Whether it has been defeated.
    pub defeated: bool,
    /// Credits on hand.
    pub credits: i32,
    /// Units on the map or in transit.
    pub units: i32,
    /// Structures standing.
    pub structures: i32,
    /// Power produced by wind traps.
    pub power_produced: i32,
    /// Power needed by structures.
    pub power_required: i32,
    /// Enemy objects killed, by price.
    pub kill_value: i32,
    /// Own objects lost, by price.
    pub loss_value: i32,
    /// Spice refined, rounded.
    pub harvested_spice: i32,
}

impl HouseSummary {
    /// Summarize a house.
    #[must_use]
    pub fn from_house(house: &House) -> Self {
        let stats = house.stats();
        Self {
            house: house.id().name().to_string(),
            team: house.team(),
            ai: house.is_ai(),
            defeated: house.is_defeated(),
            credits: house.credits(),
            units: house.num_units(),
            structures: house.num_structures(),
            power_produced: house.produced_power(),
            power_required: house.power_requirement(),
            kill_value: stats.kill_value,
            loss_value: stats.loss_value,
            harvested_spice: lround(stats.harvested_spice),
        }
    }
}

/// How a game ended, in words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    /// `victory`, `draw` or `timed_out`.
    pub result: String,
    /// Winning team, for victories.
    pub team: Option<u8>,
    /// House that completed the win.
    pub house: Option<String>,
}

impl From<GameOutcome> for OutcomeSummary {
    fn from(outcome: GameOutcome) -> Self {
        match outcome {
            GameOutcome::Victory { team, house } => Self {
                result: "victory".into(),
                team: Some(team),
                house: Some(house.name().to_string()),
            },
            GameOutcome::Draw => Self {
                result: "draw".into(),
                team: None,
                house: None,
            },
            GameOutcome::TimedOut => Self {
                result: "timed_out".into(),
                team: None,
                house: None,
            },
        }
    }
}

/// Complete summary of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Scenario name.
    pub scenario: String,
    /// Current cycle.
    pub cycle: u32,
    /// State hash (for determinism validation).
    pub state_hash: u64,
    /// Outcome, if the game is over.
    pub outcome: Option<OutcomeSummary>,
    /// Houses in id order.
    pub houses: Vec<HouseSummary>,
    /// Objects in the registry.
    pub objects: usize,
    /// Bullets in flight.
    pub bullets: usize,
    /// Triggers still queued.
    pub pending_triggers: usize,
    /// Events seen while running.
    pub events: EventCounts,
}

impl GameSummary {
    /// Summarize a simulation.
    #[must_use]
    pub fn new(scenario: impl Into<String>, sim: &Simulation, events: EventCounts) -> Self {
        Self {
            scenario: scenario.into(),
            cycle: sim.cycle(),
            state_hash: sim.state_hash(),
            outcome: sim.outcome().map(OutcomeSummary::from),
            houses: sim.houses().map(HouseSummary::from_house).collect(),
            objects: sim.objects().len(),
            bullets: sim.bullets().len(),
            pending_triggers: sim.triggers().len(),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dune_core::data::{HouseId, ItemId};
    use dune_core::math::Coord;
    use dune_core::simulation::ExplosionKind;
    use dune_core::objects::ObjectId;
    use dune_test_utils::fixtures::sample_simulation;

    #[test]
    fn test_event_counts() {
        let mut counts = EventCounts::default();
        counts.record(&GameEvent::Explosion {
            kind: ExplosionKind::Small,
            position: Coord::new(1, 1),
            house: None,
        });
        counts.record(&GameEvent::Deployed {
            id: ObjectId(1),
            item: ItemId::Trike,
            house: HouseId::Ordos,
            location: Coord::new(0, 0),
        });
        counts.record(&GameEvent::SpecialBloom {
            location: Coord::new(2, 2),
            house: HouseId::Ordos,
        });
        counts.record(&GameEvent::ScenarioEnded {
            outcome: GameOutcome::Draw,
        });
        assert_eq!(counts.explosions, 1);
        assert_eq!(counts.deployed, 1);
        assert_eq!(counts.blooms, 1);
        assert_eq!(counts.defeats, 0);
    }

    #[test]
    fn test_summary_serializes() {
        let sim = sample_simulation();
        let summary = GameSummary::new("Sample Basin", &sim, EventCounts::default());
        assert_eq!(summary.houses.len(), 2);
        assert_eq!(summary.houses[0].house, "Harkonnen");
        assert!(summary.houses[0].ai);
        assert!(!summary.houses[1].ai);

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: GameSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_outcome_words() {
        let victory = OutcomeSummary::from(GameOutcome::Victory {
            team: 2,
            house: HouseId::Harkonnen,
        });
        assert_eq!(victory.result, "victory");
        assert_eq!(victory.house.as_deref(), Some("Harkonnen"));
        assert_eq!(OutcomeSummary::from(GameOutcome::TimedOut).result, "timed_out");
    }
}
