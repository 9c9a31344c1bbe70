//! Test fixtures and helpers.
//!
//! Pre-built game states and scenario descriptions
//! for consistent testing.

use dune_core::bullet::BulletType;
use dune_core::config::GameOptions;
use dune_core::data::{HouseId, ItemId};
use dune_core::house::House;
use dune_core::math::Coord;
use dune_core::scenario::{ScenarioDescription, ScenarioLoader};
use dune_core::simulation::Simulation;
use dune_core::tile::TerrainType;
use dune_core::trigger::DropLocation;
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// An empty sand map with Atreides on team 1 and Harkonnen on team 2.
///
/// # Panics
///
/// Panics if the size is not a valid map size.
#[must_use]
pub fn sandbox(width: i32, height: i32, seed: u64) -> Simulation {
    let mut sim = Simulation::new(width, height, GameOptions::default(), seed)
        .expect("valid sandbox size");
    sim.insert_house(House::new(HouseId::Atreides, 1000, 25, 1, 0));
    sim.insert_house(House::new(HouseId::Harkonnen, 1000, 25, 2, 0));
    sim
}

/// Turn a rectangle of the map into rock.
pub fn rock_plateau(sim: &mut Simulation, x: i32, y: i32, width: i32, height: i32) {
    for ty in y..y + height {
        for tx in x..x + width {
            sim.set_terrain_type(Coord::new(tx, ty), TerrainType::Rock);
        }
    }
    sim.map_mut().create_sand_regions();
}

/// Two bases, a few armies, rockets in flight and a repeating reinforcement.
///
/// # Panics
///
/// Panics if a fixture placement is rejected.
#[must_use]
pub fn skirmish_battle(seed: u64) -> Simulation {
    let mut sim = sandbox(48, 32, seed);
    rock_plateau(&mut sim, 2, 2, 8, 8);
    rock_plateau(&mut sim, 38, 22, 8, 8);
    sim.create_spice_field(Coord::new(24, 16), 4, true);

    sim.place_structure(HouseId::Atreides, None, ItemId::ConstructionYard, 2, 2, false)
        .expect("placement")
        .expect("rock");
    sim.place_structure(HouseId::Atreides, None, ItemId::WindTrap, 4, 2, false)
        .expect("placement")
        .expect("rock");
    sim.place_structure(HouseId::Harkonnen, None, ItemId::ConstructionYard, 40, 24, false)
        .expect("placement")
        .expect("rock");

    for x in 12..16 {
        sim.place_unit(HouseId::Atreides, ItemId::Tank, x, 12).expect("unit");
    }
    for x in 30..34 {
        sim.place_unit(HouseId::Harkonnen, ItemId::Quad, x, 18).expect("unit");
        sim.place_unit(HouseId::Harkonnen, ItemId::Soldier, x, 19).expect("unit");
    }

    for (i, bullet) in [BulletType::Rocket, BulletType::ShellMedium, BulletType::LargeRocket]
        .into_iter()
        .enumerate()
    {
        let offset = i as i32;
        sim.fire_bullet(
            None,
            Coord::new(12 + offset, 12).tile_center(),
            Coord::new(31 + offset, 18).tile_center(),
            bullet,
            40,
            false,
        );
    }

    sim.triggers_mut().add_reinforcement(
        HouseId::Harkonnen,
        ItemId::Trike,
        DropLocation::East,
        20,
        true,
    );
    sim
}

/// A small but complete scenario in RON.
pub const SAMPLE_SCENARIO: &str = r#"(
    name: "Sample Basin",
    seed: 2024,
    map: [
        "--------------------------------",
        "-%%%%%%%%-----------------------",
        "-%%%%%%%%------^^^^-------------",
        "-%%%%%%%%------^^^^-------------",
        "-%%%%%%%%-----------------------",
        "-%%%%%%%%------------~~~~-------",
        "---------------------~++~-------",
        "---------------------~~~~-------",
        "----------O---------------------",
        "-----------------------%%%%%%%%-",
        "-----------------------%%%%%%%%-",
        "-----------@@------Q---%%%%%%%%-",
        "-----------@@----------%%%%%%%%-",
        "-----------------------%%%%%%%%-",
        "--------------------------------",
        "--------------------------------",
    ],
    spice_fields: [(x: 6, y: 13, radius: 2, thick: true)],
    houses: [
        (house: Atreides, credits: 1500, team: Some(1), quota: 0,
         players: [(name: "Leto", kind: Human)]),
        (house: Harkonnen, credits: 1200, team: Some(2),
         players: [(name: "Vladimir", kind: Ai("default"))]),
    ],
    units: [
        (house: Atreides, item: Tank, x: 10, y: 4),
        (house: Atreides, item: Infantry, x: 11, y: 5),
        (house: Atreides, item: Trike, x: 12, y: 6, health: 200),
        (house: Harkonnen, item: Quad, x: 20, y: 11),
        (house: Harkonnen, item: Troopers, x: 21, y: 12),
        (house: Harkonnen, item: Special, x: 22, y: 13),
    ],
    structures: [
        (house: Atreides, item: ConstructionYard, x: 1, y: 1),
        (house: Atreides, item: WindTrap, x: 3, y: 1),
        (house: Atreides, item: Refinery, x: 5, y: 1),
        (house: Atreides, item: Silo, x: 1, y: 3),
        (house: Harkonnen, item: ConstructionYard, x: 23, y: 9),
        (house: Harkonnen, item: WindTrap, x: 25, y: 9),
        (house: Harkonnen, item: GunTurret, x: 23, y: 12),
    ],
    reinforcements: [
        (house: Harkonnen, item: Quad, drop: Homebase, minutes: 1, repeat: true),
        (house: Atreides, item: Infantry, drop: South, minutes: 2),
    ],
    choam: [(Trike, 3), (Quad, 2), (Tank, 1)],
    timeout_minutes: Some(45),
)"#;

/// [`SAMPLE_SCENARIO`] parsed.
///
/// # Panics
///
/// Panics if the sample no longer parses.
#[must_use]
pub fn sample_scenario() -> ScenarioDescription {
    ScenarioDescription::from_ron_str(SAMPLE_SCENARIO).expect("sample scenario parses")
}

/// [`SAMPLE_SCENARIO`] loaded with default options.
///
/// # Panics
///
/// Panics if the sample no longer loads.
#[must_use]
pub fn sample_simulation() -> Simulation {
    ScenarioLoader::build(&sample_scenario(), GameOptions::default()).expect("sample scenario loads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_helpers() {
        assert_eq!(fixed(3), I32F32::from_num(3));
        assert_eq!(fixed_f(0.5) * 2, fixed(1));
    }

    #[test]
    fn test_sample_scenario_loads() {
        let sim = sample_simulation();
        assert_eq!(sim.map().width(), 32);
        assert_eq!(sim.map().height(), 16);
        assert_eq!(sim.houses().count(), 2);
        assert!(sim.objects().len() > 10);
        assert_eq!(sim.triggers().len(), 3);
    }

    #[test]
    fn test_skirmish_battle_has_everything() {
        let sim = skirmish_battle(1);
        assert_eq!(sim.bullets().len(), 3);
        assert_eq!(sim.house(HouseId::Harkonnen).unwrap().num_structures(), 1);
        assert_eq!(sim.house(HouseId::Atreides).unwrap().num_units(), 4);
    }
}
