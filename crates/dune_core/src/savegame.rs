//! Save game files.
//!
//! A save game wraps the binary game state with enough metadata to tell
//! what it is without restoring it, and a state hash that proves the
//! restored game is the one that was saved.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GameError, Result};
use crate::simulation::Simulation;

/// Save game file format version for compatibility.
pub const SAVEGAME_VERSION: u32 = 1;

/// Complete save game data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveGame {
    /// Save format version.
    pub version: u32,
    /// Scenario the game was started from.
    pub scenario_name: String,
    /// Cycle the game was saved at.
    pub cycle: u32,
    /// State hash at save time.
    pub state_hash: u64,
    /// Serialized simulation state.
    pub payload: Vec<u8>,
}

impl SaveGame {
    /// Snapshot a running game.
    #[must_use]
    pub fn capture(scenario_name: impl Into<String>, sim: &Simulation) -> Self {
        let payload = sim.save();
        Self {
            version: SAVEGAME_VERSION,
            scenario_name: scenario_name.into(),
            cycle: sim.cycle(),
            state_hash: sim.state_hash(),
            payload,
        }
    }

    /// Rebuild the game.
    ///
    /// # Errors
    /// Returns an error if the payload is corrupt or the restored state
    /// does not hash to the recorded value.
    pub fn restore(&self) -> Result<Simulation> {
        let sim = Simulation::load(&self.payload)?;
        let restored = sim.state_hash();
        if restored != self.state_hash {
            return Err(GameError::HashMismatch {
                cycle: self.cycle,
                stored: self.state_hash,
                restored,
            });
        }
        Ok(sim)
    }

    /// Save the game to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize save game: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write save file: {e}")))?;
        tracing::info!(
            path = %path.as_ref().display(),
            cycle = self.cycle,
            "Game saved"
        );
        Ok(())
    }

    /// Load a game from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// file was written by another format version.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read save file: {e}")))?;
        let save: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::CorruptSave(format!("Failed to deserialize save game: {e}")))?;

        if save.version != SAVEGAME_VERSION {
            return Err(GameError::InvalidState(format!(
                "Save game version mismatch: expected {}, got {}",
                SAVEGAME_VERSION, save.version
            )));
        }

        Ok(save)
    }
}
