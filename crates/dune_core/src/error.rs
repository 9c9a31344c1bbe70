//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Unknown item (unit or structure) identifier.
    #[error("Invalid item ID: {0}")]
    InvalidItemId(u32),

    /// Unknown house identifier.
    #[error("Invalid house ID: {0}")]
    InvalidHouseId(u32),

    /// Unknown terrain identifier.
    #[error("Invalid terrain type: {0}")]
    InvalidTerrainType(u32),

    /// Unknown bullet identifier or a type that is not a projectile.
    #[error("Invalid bullet type: {0}")]
    InvalidBulletType(u32),

    /// Unknown trigger kind in a save stream.
    #[error("Invalid trigger kind: {0}")]
    InvalidTriggerKind(u32),

    /// Map dimensions must be positive.
    #[error("Invalid map size {width}x{height}")]
    InvalidMapSize {
        /// Requested width in tiles.
        width: i32,
        /// Requested height in tiles.
        height: i32,
    },

    /// Fixed-point division with a zero divisor.
    #[error("Division by zero")]
    DivisionByZero,

    /// Save stream ended before a value could be read.
    #[error("Save stream truncated: needed {needed} bytes, {remaining} remaining")]
    StreamTruncated {
        /// Bytes required by the read.
        needed: usize,
        /// Bytes left in the stream.
        remaining: usize,
    },

    /// Save data is structurally invalid.
    #[error("Corrupt save data: {0}")]
    CorruptSave(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Save game hash does not match the restored state.
    #[error("Save game hash mismatch at cycle {cycle}: stored {stored}, restored {restored}")]
    HashMismatch {
        /// Cycle the save was taken at.
        cycle: u32,
        /// Hash recorded when saving.
        stored: u64,
        /// Hash of the restored state.
        restored: u64,
    },
}
