//! House identifiers.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Number of playable houses.
pub const NUM_HOUSES: usize = 6;

/// The great houses and their allies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HouseId {
    /// House Harkonnen.
    Harkonnen = 0,
    /// House Atreides.
    Atreides = 1,
    /// House Ordos.
    Ordos = 2,
    /// The Fremen.
    Fremen = 3,
    /// The Emperor's Sardaukar.
    Sardaukar = 4,
    /// Mercenaries.
    Mercenary = 5,
}

impl HouseId {
    /// All houses in id order.
    pub const ALL: [Self; NUM_HOUSES] = [
        Self::Harkonnen,
        Self::Atreides,
        Self::Ordos,
        Self::Fremen,
        Self::Sardaukar,
        Self::Mercenary,
    ];

    /// Look up a house by its numeric id.
    pub fn from_u32(id: u32) -> Result<Self> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(GameError::InvalidHouseId(id))
    }

    /// Numeric id, usable as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Harkonnen => "Harkonnen",
            Self::Atreides => "Atreides",
            Self::Ordos => "Ordos",
            Self::Fremen => "Fremen",
            Self::Sardaukar => "Sardaukar",
            Self::Mercenary => "Mercenary",
        }
    }

    /// Radar colour (ARGB).
    #[must_use]
    pub const fn color(self) -> u32 {
        match self {
            Self::Harkonnen => 0xFF_C0_1C_1C,
            Self::Atreides => 0xFF_2C_4C_C0,
            Self::Ordos => 0xFF_20_90_20,
            Self::Fremen => 0xFF_A0_A0_A0,
            Self::Sardaukar => 0xFF_80_20_A0,
            Self::Mercenary => 0xFF_B0_90_20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u32() {
        assert_eq!(HouseId::from_u32(2), Ok(HouseId::Ordos));
        assert_eq!(HouseId::from_u32(6), Err(GameError::InvalidHouseId(6)));
        for house in HouseId::ALL {
            assert_eq!(HouseId::from_u32(house.index() as u32), Ok(house));
        }
    }
}
