//! Scenario descriptions and the loader that turns them into a running game.
//!
//! Scenarios are written in RON:
//!
//! ```ron
//! (
//!     name: "Arrakis Outpost",
//!     seed: 7,
//!     map: [
//!         "--------",
//!         "-%%%%---",
//!         "-%%%%-~~",
//!         "------~+",
//!     ],
//!     houses: [
//!         (house: Atreides, credits: 1500, team: Some(1), players: [(name: "Duke", kind: Human)]),
//!         (house: Harkonnen, credits: 1000),
//!     ],
//!     units: [(house: Harkonnen, item: Trike, x: 6, y: 0)],
//!     structures: [(house: Atreides, item: ConstructionYard, x: 1, y: 1)],
//!     reinforcements: [(house: Harkonnen, item: Infantry, drop: East, minutes: 2, repeat: true)],
//!     choam: [(Trike, 4)],
//!     timeout_minutes: Some(30),
//! )
//! ```
//!
//! The loader only goes through the public [`Simulation`] API.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GameOptions;
use crate::data::{milli_to_cycles, HouseId, ItemId};
use crate::error::GameError;
use crate::house::{House, Player};
use crate::map::default_max_units;
use crate::math::{Coord, Fixed};
use crate::objects::ObjectId;
use crate::simulation::Simulation;
use crate::tile::TerrainType;
use crate::trigger::{DropLocation, Trigger};

/// Full health on the scenario scale.
pub const SCENARIO_FULL_HEALTH: i32 = 256;

const MILLIS_PER_MINUTE: u32 = 60_000;

/// Errors raised while reading or building a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Scenario or options file does not exist.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),

    /// File could not be read.
    #[error("Failed to read scenario: {0}")]
    ReadError(#[from] std::io::Error),

    /// RON syntax or shape error.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// Map rows do not form a rectangle.
    #[error("Invalid scenario map: {0}")]
    InvalidMap(String),

    /// The game rejected part of the scenario.
    #[error(transparent)]
    Game(#[from] GameError),
}

const fn default_health() -> i32 {
    SCENARIO_FULL_HEALTH
}

/// A circular spice field grown at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiceFieldSpec {
    /// Center column.
    pub x: i32,
    /// Center row.
    pub y: i32,
    /// Radius in tiles.
    pub radius: i32,
    /// Thick spice at the center.
    #[serde(default)]
    pub thick: bool,
}

/// A house taking part in the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseSpec {
    /// Which house.
    pub house: HouseId,
    /// Starting credits.
    #[serde(default)]
    pub credits: i32,
    /// Team; defaults to the game type's team for unbound houses.
    #[serde(default)]
    pub team: Option<u8>,
    /// Credits needed to win, 0 for none.
    #[serde(default)]
    pub quota: i32,
    /// Unit cap; defaults to the map-size rule.
    #[serde(default)]
    pub max_units: Option<i32>,
    /// Controllers.
    #[serde(default)]
    pub players: Vec<Player>,
}

/// A unit placed at the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Owner.
    pub house: HouseId,
    /// Unit type. `Infantry` and `Troopers` become three soldiers or troopers.
    pub item: ItemId,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Health on a 0..=256 scale.
    #[serde(default = "default_health")]
    pub health: i32,
    /// Facing, 0..8.
    #[serde(default)]
    pub angle: u8,
}

/// A structure placed at the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSpec {
    /// Owner.
    pub house: HouseId,
    /// Structure type.
    pub item: ItemId,
    /// Top-left column.
    pub x: i32,
    /// Top-left row.
    pub y: i32,
    /// Health on a 0..=256 scale.
    #[serde(default = "default_health")]
    pub health: i32,
}

/// A scheduled reinforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinforcementSpec {
    /// Receiving house.
    pub house: HouseId,
    /// Unit type.
    pub item: ItemId,
    /// Where it arrives.
    pub drop: DropLocation,
    /// Game minutes until arrival.
    pub minutes: u32,
    /// Arrive again every `minutes`.
    #[serde(default)]
    pub repeat: bool,
}

/// Everything needed to start a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDescription {
    /// Display name.
    pub name: String,
    /// Seed for the game's random stream.
    #[serde(default)]
    pub seed: u64,
    /// Map rows, one terrain character per tile.
    pub map: Vec<String>,
    /// Spice fields grown on top of the map.
    #[serde(default)]
    pub spice_fields: Vec<SpiceFieldSpec>,
    /// Participating houses.
    pub houses: Vec<HouseSpec>,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    /// Starting structures.
    #[serde(default)]
    pub structures: Vec<StructureSpec>,
    /// Scheduled reinforcements.
    #[serde(default)]
    pub reinforcements: Vec<ReinforcementSpec>,
    /// CHOAM offer shared by all houses.
    #[serde(default)]
    pub choam: Vec<(ItemId, i32)>,
    /// Mission time limit.
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

impl ScenarioDescription {
    /// Parse a scenario from RON.
    pub fn from_ron_str(source: &str) -> Result<Self, ScenarioError> {
        Ok(ron::from_str(source)?)
    }

    /// Read a scenario from a RON file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    /// Map size in tiles.
    pub fn map_size(&self) -> Result<(i32, i32), ScenarioError> {
        let width = self.map.first().map_or(0, |row| row.chars().count());
        if let Some((y, row)) = self
            .map
            .iter()
            .enumerate()
            .find(|(_, row)| row.chars().count() != width)
        {
            return Err(ScenarioError::InvalidMap(format!(
                "row {y} has {} tiles, expected {width}",
                row.chars().count()
            )));
        }
        let width = i32::try_from(width).map_err(|_| ScenarioError::InvalidMap("map too wide".into()))?;
        let height =
            i32::try_from(self.map.len()).map_err(|_| ScenarioError::InvalidMap("map too tall".into()))?;
        Ok((width, height))
    }
}

/// Builds a [`Simulation`] from a [`ScenarioDescription`].
pub struct ScenarioLoader;

impl ScenarioLoader {
    /// Set up the map, houses, objects and triggers of a scenario.
    ///
    /// Unknown terrain characters and objects that cannot be placed are
    /// logged and skipped. Anything the game rejects outright aborts the
    /// load.
    pub fn build(desc: &ScenarioDescription, options: GameOptions) -> Result<Simulation, ScenarioError> {
        let (width, height) = desc.map_size()?;
        let mut sim = Simulation::new(width, height, options, desc.seed)?;

        Self::load_map(&mut sim, desc);
        for field in &desc.spice_fields {
            sim.create_spice_field(Coord::new(field.x, field.y), field.radius, field.thick);
        }
        sim.map_mut().create_sand_regions();

        let default_max = options
            .max_units_override
            .unwrap_or_else(|| default_max_units(sim.map()));
        for entry in &desc.houses {
            let team = entry.team.unwrap_or_else(|| options.game_type.unbound_house_team());
            let max_units = options.max_units_override.or(entry.max_units).unwrap_or(default_max);
            let mut house = House::new(entry.house, entry.credits, max_units, team, entry.quota);
            for player in &entry.players {
                house.add_player(player.clone());
            }
            for &(item, num) in &desc.choam {
                house.choam_mut().add_item(item, num);
            }
            sim.insert_house(house);
        }

        for entry in &desc.structures {
            let placed = sim.place_structure(entry.house, None, entry.item, entry.x, entry.y, false)?;
            match placed {
                Some(id) => Self::scale_health(&mut sim, id, entry.health),
                None => tracing::warn!(
                    house = entry.house.name(),
                    item = ?entry.item,
                    x = entry.x,
                    y = entry.y,
                    "Could not place scenario structure"
                ),
            }
        }

        for entry in &desc.units {
            let item = entry.item.resolve_special(entry.house);
            for item in expand_group(item) {
                match sim.place_unit(entry.house, item, entry.x, entry.y)? {
                    Some(id) => {
                        Self::scale_health(&mut sim, id, entry.health);
                        if let Some(object) = sim.object_mut(id) {
                            object.set_angle(entry.angle);
                        }
                    }
                    None => tracing::warn!(
                        house = entry.house.name(),
                        item = ?item,
                        x = entry.x,
                        y = entry.y,
                        "Could not place scenario unit"
                    ),
                }
            }
        }

        for entry in &desc.reinforcements {
            let cycle = milli_to_cycles(entry.minutes.saturating_mul(MILLIS_PER_MINUTE));
            let item = entry.item.resolve_special(entry.house);
            for item in expand_group(item) {
                sim.triggers_mut()
                    .add_reinforcement(entry.house, item, entry.drop, cycle, entry.repeat);
            }
        }

        if let Some(minutes) = desc.timeout_minutes {
            let cycle = milli_to_cycles(minutes.saturating_mul(MILLIS_PER_MINUTE));
            sim.triggers_mut().add_trigger(cycle, Trigger::Timeout);
        }

        tracing::info!(
            scenario = %desc.name,
            width,
            height,
            houses = desc.houses.len(),
            objects = sim.objects().len(),
            "Scenario loaded"
        );
        Ok(sim)
    }

    fn load_map(sim: &mut Simulation, desc: &ScenarioDescription) {
        for (y, row) in (0..).zip(&desc.map) {
            for (x, c) in (0..).zip(row.chars()) {
                match TerrainType::from_char(c) {
                    Some(TerrainType::Sand) => {}
                    Some(terrain) => sim.set_terrain_type(Coord::new(x, y), terrain),
                    None => tracing::warn!(x, y, character = %c, "Unknown terrain character"),
                }
            }
        }
    }

    fn scale_health(sim: &mut Simulation, id: ObjectId, health: i32) {
        if let Some(object) = sim.object_mut(id) {
            let health = health.clamp(0, SCENARIO_FULL_HEALTH);
            let scaled = object.max_health() * Fixed::from_num(health) / Fixed::from_num(SCENARIO_FULL_HEALTH);
            object.set_health(scaled.max(Fixed::ONE));
        }
    }
}

fn expand_group(item: ItemId) -> Vec<ItemId> {
    match item {
        ItemId::Infantry => vec![ItemId::Soldier; 3],
        ItemId::Troopers => vec![ItemId::Trooper; 3],
        other => vec![other],
    }
}
