//! Game options.
//!
//! Options are fixed for the lifetime of a scenario and travel with the
//! save state, so a restored game behaves exactly like the one that was
//! saved. They can be written by hand as RON:
//!
//! ```ron
//! (
//!     game_type: Skirmish,
//!     fog_of_war: true,
//!     max_units_override: Some(40),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::HouseId;
use crate::error::{GameError, Result};
use crate::scenario::ScenarioError;
use crate::stream::{InputStream, OutputStream};

/// Kind of game being played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameType {
    /// Story mission.
    #[default]
    Campaign,
    /// Single player against AI houses.
    Skirmish,
    /// Custom single player map.
    Custom,
    /// Custom multiplayer map.
    Multiplayer,
}

impl GameType {
    fn from_u8(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::Campaign,
            1 => Self::Skirmish,
            2 => Self::Custom,
            3 => Self::Multiplayer,
            other => return Err(GameError::CorruptSave(format!("invalid game type {other}"))),
        })
    }

    /// Team given to houses the scenario does not bind to a player.
    #[must_use]
    pub const fn unbound_house_team(self) -> u8 {
        match self {
            Self::Campaign | Self::Skirmish => 2,
            Self::Custom | Self::Multiplayer => 0,
        }
    }
}

/// Per-game settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    /// Kind of game.
    pub game_type: GameType,
    /// Tiles not seen recently are fogged.
    pub fog_of_war: bool,
    /// Every house starts with the whole map explored.
    pub start_explored: bool,
    /// Debug switch: everything is visible to everyone.
    pub reveal_map: bool,
    /// Replaces every house's unit cap.
    pub max_units_override: Option<i32>,
    /// A house that reaches its credit quota wins.
    pub quota_victory: bool,
    /// House controlled by the local player, if any.
    pub local_house: Option<HouseId>,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            game_type: GameType::Campaign,
            fog_of_war: false,
            start_explored: false,
            reveal_map: false,
            max_units_override: None,
            quota_victory: true,
            local_house: None,
        }
    }
}

impl GameOptions {
    /// Parse options from RON.
    pub fn from_ron_str(source: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }

    /// Read options from a RON file.
    pub fn load(path: &Path) -> std::result::Result<Self, ScenarioError> {
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)?;
        Ok(Self::from_ron_str(&source)?)
    }

    /// Write the options into a save stream.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u8(self.game_type as u8);
        stream.write_bools(&[
            self.fog_of_war,
            self.start_explored,
            self.reveal_map,
            self.quota_victory,
        ]);
        stream.write_i32(self.max_units_override.unwrap_or(-1));
        stream.write_i32(self.local_house.map_or(-1, |house| house.index() as i32));
    }

    /// Read options written by [`GameOptions::save`].
    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self> {
        let game_type = GameType::from_u8(stream.read_u8()?)?;
        let [fog_of_war, start_explored, reveal_map, quota_victory] = stream.read_bools::<4>()?;
        let max_units_override = match stream.read_i32()? {
            value if value < 0 => None,
            value => Some(value),
        };
        let local_house = match stream.read_i32()? {
            -1 => None,
            id => Some(HouseId::from_u32(id as u32)?),
        };
        Ok(Self {
            game_type,
            fog_of_war,
            start_explored,
            reveal_map,
            max_units_override,
            quota_victory,
            local_house,
        })
    }
}
