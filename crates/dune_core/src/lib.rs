//! # Dune Core
//!
//! Deterministic game simulation core for a Dune-style RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No audio
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and determinism testing
//! - Save games that restore bit-identical state
//! - Any presentation layer reading state and events between ticks
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Game context and tick loop
//! - [`map`], [`tile`] - The tile grid, terrain, spice and fog
//! - [`house`], [`choam`] - House economy and the CHOAM market
//! - [`objects`] - Units and structures by id
//! - [`combat`], [`bullet`] - Area damage and projectiles
//! - [`trigger`] - Scheduled reinforcements and timeouts
//! - [`scenario`], [`savegame`] - Loading and saving games
//! - [`math`], [`random`], [`stream`] - Fixed-point math, seeded randomness, binary save streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod bullet;
pub mod choam;
pub mod combat;
pub mod config;
pub mod data;
pub mod error;
pub mod house;
pub mod map;
pub mod math;
pub mod objects;
pub mod random;
pub mod savegame;
pub mod scenario;
pub mod simulation;
pub mod stream;
pub mod tile;
pub mod trigger;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bullet::{Bullet, BulletType};
    pub use crate::combat::DamageSource;
    pub use crate::config::{GameOptions, GameType};
    pub use crate::data::{HouseId, ItemId};
    pub use crate::error::{GameError, Result};
    pub use crate::house::{House, Player, PlayerKind};
    pub use crate::map::Map;
    pub use crate::math::{Coord, Fixed, Vec2Fixed};
    pub use crate::objects::{GameObject, ObjectId};
    pub use crate::savegame::SaveGame;
    pub use crate::scenario::{ScenarioDescription, ScenarioError, ScenarioLoader};
    pub use crate::simulation::{ExplosionKind, GameEvent, GameOutcome, Simulation};
    pub use crate::tile::{TerrainType, Tile};
    pub use crate::trigger::{DropLocation, Trigger};
}
