//! Item identifiers and the per-item constant table.

use serde::{Deserialize, Serialize};

use crate::data::HouseId;
use crate::error::{GameError, Result};
use crate::math::{fixed_int, fixed_ratio, Fixed};
use crate::tile::TerrainType;

/// Size of per-item counter arrays (ids start at 1).
pub const NUM_ITEM_IDS: usize = 41;

/// Every unit and structure type.
///
/// Numeric values are stable and appear in save data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ItemId {
    Barracks = 1,
    ConstructionYard = 2,
    GunTurret = 3,
    HeavyFactory = 4,
    HighTechFactory = 5,
    IX = 6,
    LightFactory = 7,
    Palace = 8,
    Radar = 9,
    Refinery = 10,
    RepairYard = 11,
    RocketTurret = 12,
    Silo = 13,
    Slab1 = 14,
    Slab4 = 15,
    StarPort = 16,
    Wall = 17,
    WindTrap = 18,
    WOR = 19,
    Carryall = 20,
    Devastator = 21,
    Deviator = 22,
    Frigate = 23,
    Harvester = 24,
    Soldier = 25,
    Launcher = 26,
    MCV = 27,
    Ornithopter = 28,
    Quad = 29,
    Saboteur = 30,
    Sandworm = 31,
    SiegeTank = 32,
    SonicTank = 33,
    Tank = 34,
    Trike = 35,
    RaiderTrike = 36,
    Trooper = 37,
    /// Placeholder resolved to the owning house's special unit.
    Special = 38,
    /// Scenario shorthand for a squad of three soldiers.
    Infantry = 39,
    /// Scenario shorthand for a squad of three troopers.
    Troopers = 40,
}

/// Movement class, used for terrain difficulty and passability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitClass {
    /// Immobile buildings.
    Structure,
    /// Soldiers, troopers and saboteurs.
    Infantry,
    /// Trikes and quads.
    Wheeled,
    /// Tanks, harvesters and other tracked vehicles.
    Tracked,
    /// Carryalls, ornithopters and frigates.
    Air,
    /// The sandworm.
    Sandworm,
}

/// Gameplay constants for one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemData {
    /// Maximum health.
    pub hitpoints: i32,
    /// Build price in credits.
    pub price: i32,
    /// Power drawn (positive) or produced (negative).
    pub power: i32,
    /// Spice storage provided.
    pub capacity: i32,
    /// Footprint width and height in tiles.
    pub size: (i32, i32),
    /// Sight radius in tiles.
    pub view_range: i32,
    /// Damage per shot of the primary weapon.
    pub weapon_damage: i32,
    /// Weapon range in tiles.
    pub weapon_range: i32,
}

const fn structure(hitpoints: i32, price: i32, power: i32, size: (i32, i32)) -> ItemData {
    ItemData {
        hitpoints,
        price,
        power,
        capacity: 0,
        size,
        view_range: 3,
        weapon_damage: 0,
        weapon_range: 0,
    }
}

const fn unit(
    hitpoints: i32,
    price: i32,
    view_range: i32,
    weapon_damage: i32,
    weapon_range: i32,
) -> ItemData {
    ItemData {
        hitpoints,
        price,
        power: 0,
        capacity: 0,
        size: (1, 1),
        view_range,
        weapon_damage,
        weapon_range,
    }
}

impl ItemId {
    /// Every real item in id order (scenario shorthands excluded).
    pub const ALL: [Self; 37] = [
        Self::Barracks,
        Self::ConstructionYard,
        Self::GunTurret,
        Self::HeavyFactory,
        Self::HighTechFactory,
        Self::IX,
        Self::LightFactory,
        Self::Palace,
        Self::Radar,
        Self::Refinery,
        Self::RepairYard,
        Self::RocketTurret,
        Self::Silo,
        Self::Slab1,
        Self::Slab4,
        Self::StarPort,
        Self::Wall,
        Self::WindTrap,
        Self::WOR,
        Self::Carryall,
        Self::Devastator,
        Self::Deviator,
        Self::Frigate,
        Self::Harvester,
        Self::Soldier,
        Self::Launcher,
        Self::MCV,
        Self::Ornithopter,
        Self::Quad,
        Self::Saboteur,
        Self::Sandworm,
        Self::SiegeTank,
        Self::SonicTank,
        Self::Tank,
        Self::Trike,
        Self::RaiderTrike,
        Self::Trooper,
    ];

    /// Look up an item by its numeric id.
    pub fn from_u32(id: u32) -> Result<Self> {
        match id {
            38 => Ok(Self::Special),
            39 => Ok(Self::Infantry),
            40 => Ok(Self::Troopers),
            _ => Self::ALL
                .iter()
                .copied()
                .find(|item| *item as u32 == id)
                .ok_or(GameError::InvalidItemId(id)),
        }
    }

    /// Numeric id, usable as an index into per-item counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Buildings, including walls and concrete.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        (self as u32) <= Self::WOR as u32
    }

    /// Mobile units.
    #[must_use]
    pub const fn is_unit(self) -> bool {
        let id = self as u32;
        id >= Self::Carryall as u32 && id <= Self::Trooper as u32
    }

    /// Soldier-class units that share tiles in sub-tile slots.
    #[must_use]
    pub const fn is_infantry(self) -> bool {
        matches!(self, Self::Soldier | Self::Trooper | Self::Saboteur)
    }

    /// Flying units.
    #[must_use]
    pub const fn is_air_unit(self) -> bool {
        matches!(self, Self::Carryall | Self::Ornithopter | Self::Frigate)
    }

    /// Units that travel below the sand.
    #[must_use]
    pub const fn is_underground_unit(self) -> bool {
        matches!(self, Self::Sandworm)
    }

    /// Units that move on the ground (infantry and vehicles).
    #[must_use]
    pub const fn is_ground_unit(self) -> bool {
        self.is_unit() && !self.is_air_unit() && !self.is_underground_unit()
    }

    /// Movement class of this item.
    #[must_use]
    pub const fn unit_class(self) -> UnitClass {
        match self {
            Self::Soldier | Self::Trooper | Self::Saboteur | Self::Infantry | Self::Troopers => {
                UnitClass::Infantry
            }
            Self::Trike | Self::RaiderTrike | Self::Quad => UnitClass::Wheeled,
            Self::Carryall | Self::Ornithopter | Self::Frigate => UnitClass::Air,
            Self::Sandworm => UnitClass::Sandworm,
            Self::Devastator
            | Self::Deviator
            | Self::Harvester
            | Self::Launcher
            | Self::MCV
            | Self::SiegeTank
            | Self::SonicTank
            | Self::Tank
            | Self::Special => UnitClass::Tracked,
            _ => UnitClass::Structure,
        }
    }

    /// Resolve [`ItemId::Special`] to the house's signature unit.
    #[must_use]
    pub const fn resolve_special(self, house: HouseId) -> Self {
        match self {
            Self::Special => match house {
                HouseId::Harkonnen | HouseId::Sardaukar => Self::Devastator,
                HouseId::Atreides | HouseId::Fremen => Self::SonicTank,
                HouseId::Ordos | HouseId::Mercenary => Self::Deviator,
            },
            other => other,
        }
    }

    /// Gameplay constants for this item.
    #[must_use]
    pub const fn data(self) -> ItemData {
        match self {
            Self::Barracks => structure(600, 300, 10, (2, 2)),
            Self::ConstructionYard => structure(800, 400, 0, (2, 2)),
            Self::GunTurret => ItemData {
                weapon_damage: 30,
                weapon_range: 5,
                view_range: 5,
                ..structure(700, 125, 10, (1, 1))
            },
            Self::HeavyFactory => structure(800, 600, 35, (3, 2)),
            Self::HighTechFactory => structure(1000, 500, 35, (3, 2)),
            Self::IX => structure(1000, 500, 40, (2, 2)),
            Self::LightFactory => structure(700, 400, 20, (2, 2)),
            Self::Palace => structure(2000, 999, 80, (3, 3)),
            Self::Radar => ItemData {
                view_range: 8,
                ..structure(1000, 400, 30, (2, 2))
            },
            Self::Refinery => ItemData {
                capacity: 1000,
                ..structure(1500, 400, 30, (3, 2))
            },
            Self::RepairYard => structure(1800, 700, 20, (3, 2)),
            Self::RocketTurret => ItemData {
                weapon_damage: 40,
                weapon_range: 9,
                view_range: 9,
                ..structure(1200, 250, 20, (1, 1))
            },
            Self::Silo => ItemData {
                capacity: 1000,
                ..structure(300, 150, 5, (2, 2))
            },
            Self::Slab1 => structure(40, 5, 0, (1, 1)),
            Self::Slab4 => structure(40, 20, 0, (2, 2)),
            Self::StarPort => structure(2000, 500, 50, (3, 3)),
            Self::Wall => structure(140, 50, 0, (1, 1)),
            Self::WindTrap => structure(1000, 300, -100, (2, 2)),
            Self::WOR => structure(1500, 400, 20, (2, 2)),
            Self::Carryall => unit(100, 800, 2, 0, 0),
            Self::Devastator => unit(1200, 800, 4, 60, 5),
            Self::Deviator => unit(240, 750, 5, 50, 7),
            Self::Frigate => unit(1000, 0, 2, 0, 0),
            Self::Harvester => unit(600, 300, 2, 0, 0),
            Self::Soldier | Self::Infantry => unit(40, 60, 2, 8, 2),
            Self::Launcher => unit(200, 450, 5, 75, 9),
            Self::MCV => unit(600, 900, 2, 0, 0),
            Self::Ornithopter => unit(100, 600, 5, 50, 5),
            Self::Quad => unit(260, 200, 3, 10, 3),
            Self::Saboteur => unit(100, 0, 4, 0, 0),
            Self::Sandworm => unit(1000, 0, 0, 300, 0),
            Self::SiegeTank => unit(600, 600, 5, 60, 5),
            Self::SonicTank => unit(500, 600, 5, 90, 8),
            Self::Tank | Self::Special => unit(400, 300, 4, 40, 4),
            Self::Trike | Self::RaiderTrike => unit(200, 150, 3, 8, 3),
            Self::Trooper | Self::Troopers => unit(90, 100, 3, 12, 5),
        }
    }
}

/// Speed penalty of a movement class on a terrain type.
///
/// Larger values mean slower movement; 1 is unhindered.
#[must_use]
pub fn terrain_difficulty(class: UnitClass, terrain: TerrainType) -> Fixed {
    use TerrainType as T;

    const ONE: Fixed = fixed_int(1);
    match class {
        UnitClass::Tracked => match terrain {
            T::Slab | T::Mountain => ONE,
            T::Sand | T::SpiceBloom | T::SpecialBloom => fixed_ratio(25, 16),
            T::Rock | T::Dunes | T::Spice | T::ThickSpice => fixed_ratio(11, 8),
        },
        UnitClass::Wheeled => match terrain {
            T::Slab | T::Rock | T::Mountain => ONE,
            T::Dunes => fixed_ratio(3, 2),
            T::Sand | T::Spice | T::ThickSpice | T::SpiceBloom | T::SpecialBloom => {
                fixed_ratio(5, 4)
            }
        },
        UnitClass::Infantry => match terrain {
            T::Slab | T::Rock => ONE,
            T::Dunes | T::Mountain => fixed_ratio(3, 2),
            T::Sand | T::Spice | T::ThickSpice | T::SpiceBloom | T::SpecialBloom => {
                fixed_ratio(5, 4)
            }
        },
        UnitClass::Air | UnitClass::Sandworm | UnitClass::Structure => ONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u32_roundtrip() {
        for item in ItemId::ALL {
            assert_eq!(ItemId::from_u32(item as u32), Ok(item));
        }
        assert_eq!(ItemId::from_u32(39), Ok(ItemId::Infantry));
        assert_eq!(ItemId::from_u32(0), Err(GameError::InvalidItemId(0)));
        assert_eq!(ItemId::from_u32(41), Err(GameError::InvalidItemId(41)));
    }

    #[test]
    fn test_capabilities() {
        assert!(ItemId::Wall.is_structure());
        assert!(!ItemId::Wall.is_unit());
        assert!(ItemId::Soldier.is_infantry());
        assert!(ItemId::Soldier.is_ground_unit());
        assert!(ItemId::Ornithopter.is_air_unit());
        assert!(!ItemId::Ornithopter.is_ground_unit());
        assert!(ItemId::Sandworm.is_underground_unit());
        assert!(!ItemId::Sandworm.is_ground_unit());
        assert!(!ItemId::Infantry.is_unit());
    }

    #[test]
    fn test_tracked_difficulty_table() {
        assert_eq!(
            terrain_difficulty(UnitClass::Tracked, TerrainType::Sand),
            Fixed::from_num(1.5625)
        );
        assert_eq!(
            terrain_difficulty(UnitClass::Tracked, TerrainType::Rock),
            Fixed::from_num(1.375)
        );
        assert_eq!(
            terrain_difficulty(UnitClass::Tracked, TerrainType::Slab),
            Fixed::from_num(1)
        );
        assert_eq!(
            terrain_difficulty(ItemId::Tank.unit_class(), TerrainType::SpecialBloom),
            Fixed::from_num(1.5625)
        );
    }

    #[test]
    fn test_special_resolution() {
        assert_eq!(
            ItemId::Special.resolve_special(HouseId::Atreides),
            ItemId::SonicTank
        );
        assert_eq!(ItemId::Trike.resolve_special(HouseId::Ordos), ItemId::Trike);
    }
}
