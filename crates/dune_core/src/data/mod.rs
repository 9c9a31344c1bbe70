//! Static game data: identifiers, per-item constants and timing.
//!
//! Everything here is plain data with no IO. Timings are expressed in
//! simulation cycles; one cycle is [`MILLIS_PER_CYCLE`] milliseconds of
//! game time at default speed.

mod houses;
mod items;

pub use houses::{HouseId, NUM_HOUSES};
pub use items::{terrain_difficulty, ItemData, ItemId, UnitClass, NUM_ITEM_IDS};

use crate::math::{fixed_ratio, Fixed};

/// Width and height of one tile in world units.
pub const TILESIZE: i32 = 64;

/// Number of per-house visibility slots kept on every tile.
pub const NUM_TEAMS: usize = 7;

/// Infantry sub-tile slots per tile.
pub const NUM_INFANTRY_PER_TILE: usize = 5;

/// Maximum number of damage decals on a tile.
pub const DAMAGE_PER_TILE: usize = 5;

/// Number of facing directions used for tracks.
pub const NUM_ANGLES: usize = 8;

/// Game time represented by one cycle.
pub const MILLIS_PER_CYCLE: u32 = 16;

/// Convert milliseconds of game time to cycles.
#[must_use]
pub const fn milli_to_cycles(millis: u32) -> u32 {
    millis / MILLIS_PER_CYCLE
}

/// A tile not seen for this many cycles is fogged again.
pub const FOG_TIMEOUT: u32 = milli_to_cycles(10_000);

/// Lifetime of vehicle tracks on sand.
pub const TRACKS_TIME: u32 = milli_to_cycles(20_000);

/// Interval between power bills.
pub const POWER_BILLING_INTERVAL: i32 = milli_to_cycles(15_000) as i32;

/// Interval between CHOAM price changes.
pub const CHOAM_PRICE_INTERVAL: u32 = milli_to_cycles(30_000);

/// Cycles a dead unit remnant stays on its tile.
pub const DEAD_UNIT_TIME: i16 = 2000;

/// Lower bound of the spice amount rolled for fresh spice.
pub const RANDOM_SPICE_MIN: i32 = 111;

/// Upper bound of the spice amount rolled for fresh spice.
pub const RANDOM_SPICE_MAX: i32 = 255;

/// Spice at or above this amount is thick spice.
pub const RANDOM_THICK_SPICE_MIN: i32 = 416;

/// Upper bound of the spice amount rolled for thick spice.
pub const RANDOM_THICK_SPICE_MAX: i32 = 666;

/// Spice removed by one harvesting step.
pub const HARVEST_SPEED: Fixed = fixed_ratio(1, 10);

/// Default unit cap used when a scenario does not set one.
pub const DEFAULT_MAX_UNITS: i32 = 25;
