//! Core simulation loop.
//!
//! [`Simulation`] is the explicit game context: it owns the map, the
//! houses, the object registry, bullets in flight and the trigger queue,
//! and advances them one cycle at a time.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - A single seeded random stream that is part of the saved state
//! - Consistent iteration order (sorted object ids, houses by id)
//! - Same inputs always produce same outputs
//!
//! # Example
//!
//! ```
//! use dune_core::config::GameOptions;
//! use dune_core::data::{HouseId, ItemId};
//! use dune_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(32, 32, GameOptions::default(), 42).unwrap();
//! sim.get_or_create_house(HouseId::Atreides);
//! let trike = sim.place_unit(HouseId::Atreides, ItemId::Trike, 4, 4).unwrap();
//! assert!(trike.is_some());
//!
//! let events = sim.tick();
//! assert_eq!(sim.cycle(), 1);
//! assert!(!events.is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::bullet::Bullet;
use crate::config::GameOptions;
use crate::data::{HouseId, ItemId, NUM_HOUSES};
use crate::error::{GameError, Result};
use crate::house::House;
use crate::map::Map;
use crate::math::Coord;
use crate::objects::{GameObject, ObjectId, ObjectManager};
use crate::random::GameRng;
use crate::stream::{InputStream, OutputStream};
use crate::trigger::TriggerManager;

/// Game cycles per second.
pub const CYCLES_PER_SECOND: u32 = 1000 / crate::data::MILLIS_PER_CYCLE;

/// Explosion graphics the presentation layer should play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ExplosionKind {
    Gas,
    Large1,
    Large2,
    Small,
    ShellSmall,
    ShellMedium,
    ShellLarge,
    Medium1,
    Medium2,
    SpiceBloom,
}

/// How a scenario ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    /// Only one team is left.
    Victory {
        /// Winning team.
        team: u8,
        /// House that completed the win.
        house: HouseId,
    },
    /// Nobody is left.
    Draw,
    /// The mission timer ran out.
    TimedOut,
}

/// Something the presentation layer may want to show or play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An explosion went off.
    Explosion {
        /// Graphic.
        kind: ExplosionKind,
        /// World position.
        position: Coord,
        /// House whose weapon exploded.
        house: Option<HouseId>,
    },
    /// A unit or structure appeared on the map.
    Deployed {
        /// New object.
        id: ObjectId,
        /// Its type.
        item: ItemId,
        /// Its owner.
        house: HouseId,
        /// Its tile.
        location: Coord,
    },
    /// A unit or structure was destroyed.
    Destroyed {
        /// Former object.
        id: ObjectId,
        /// Its type.
        item: ItemId,
        /// Its owner.
        house: HouseId,
        /// Its last world position.
        position: Coord,
    },
    /// A spice bloom erupted.
    SpiceBloom {
        /// Bloom tile.
        location: Coord,
        /// House that set it off.
        house: Option<HouseId>,
    },
    /// A special bloom was consumed.
    SpecialBloom {
        /// Bloom tile.
        location: Coord,
        /// House that set it off.
        house: HouseId,
    },
    /// Spice above storage capacity was lost.
    SpiceLost {
        /// Affected house.
        house: HouseId,
    },
    /// A house has been defeated.
    HouseDefeated {
        /// Defeated house.
        house: HouseId,
    },
    /// The scenario is over.
    ScenarioEnded {
        /// Result.
        outcome: GameOutcome,
    },
}

const OUTCOME_NONE: u8 = 0;
const OUTCOME_VICTORY: u8 = 1;
const OUTCOME_DRAW: u8 = 2;
const OUTCOME_TIMED_OUT: u8 = 3;

/// The game world of one scenario.
///
/// # Tick order
///
/// 1. **Triggers** due this cycle fire
/// 2. **Houses** bill power, lose excess spice and re-price CHOAM
/// 3. **Bullets** move and detonate
/// 4. **Tiles** decay remnants; objects refresh what they see
///
/// Then the cycle counter increments.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(crate) cycle: u32,
    pub(crate) options: GameOptions,
    pub(crate) rng: GameRng,
    pub(crate) map: Map,
    pub(crate) houses: [Option<House>; NUM_HOUSES],
    pub(crate) objects: ObjectManager,
    pub(crate) bullets: Vec<Bullet>,
    pub(crate) triggers: TriggerManager,
    pub(crate) events: Vec<GameEvent>,
    pub(crate) outcome: Option<GameOutcome>,
}

impl Simulation {
    /// An empty sand map of `width` x `height` tiles.
    pub fn new(width: i32, height: i32, options: GameOptions, seed: u64) -> Result<Self> {
        Ok(Self {
            cycle: 0,
            options,
            rng: GameRng::from_seed(seed),
            map: Map::new(width, height)?,
            houses: Default::default(),
            objects: ObjectManager::new(),
            bullets: Vec::new(),
            triggers: TriggerManager::new(),
            events: Vec::new(),
            outcome: None,
        })
    }

    /// Current game cycle.
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Game options.
    #[must_use]
    pub const fn options(&self) -> &GameOptions {
        &self.options
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Mutable map, for scenario setup.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// Grow a spice field around `center`.
    pub fn create_spice_field(&mut self, center: Coord, radius: i32, center_is_thick: bool) {
        self.map
            .create_spice_field(center, radius, center_is_thick, &mut self.rng);
    }

    /// The object registry.
    #[must_use]
    pub const fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    /// One object.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    /// One mutable object.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    /// A house, if it takes part.
    #[must_use]
    pub fn house(&self, id: HouseId) -> Option<&House> {
        self.houses[id.index()].as_ref()
    }

    /// A mutable house, if it takes part.
    pub fn house_mut(&mut self, id: HouseId) -> Option<&mut House> {
        self.houses[id.index()].as_mut()
    }

    /// Houses taking part, in id order.
    pub fn houses(&self) -> impl Iterator<Item = &House> + '_ {
        self.houses.iter().flatten()
    }

    /// Add or replace a house.
    pub fn insert_house(&mut self, house: House) {
        let id = house.id();
        self.houses[id.index()] = Some(house);
        if self.options.start_explored {
            self.explore_all(id);
        }
    }

    pub(crate) fn explore_all(&mut self, house: HouseId) {
        let (width, height) = (self.map.width(), self.map.height());
        for y in 0..height {
            for x in 0..width {
                if let Some(tile) = self.map.tile_mut(x, y) {
                    tile.set_explored(house, self.cycle);
                }
            }
        }
    }

    /// Events since the last drain.
    #[must_use]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take the pending events.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// How the scenario ended, if it has.
    #[must_use]
    pub const fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    /// Whether the scenario is over.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// End the scenario. Only the first outcome counts.
    pub(crate) fn finish(&mut self, outcome: GameOutcome) {
        if self.outcome.is_some() {
            return;
        }
        tracing::info!(cycle = self.cycle, ?outcome, "Scenario ended");
        self.outcome = Some(outcome);
        self.events.push(GameEvent::ScenarioEnded { outcome });
    }

    /// Advance the simulation by one cycle.
    ///
    /// Returns every event raised since the previous call, including
    /// those raised by setup calls in between. Does nothing once the
    /// scenario is over.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        if self.is_finished() {
            return self.drain_events();
        }

        // 1. Triggers
        self.run_triggers();

        // 2. Houses
        self.update_houses();

        // 3. Bullets
        self.update_bullets();

        // 4. Tiles and sight
        self.map.update();
        self.refresh_sight();

        self.cycle += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(cycle = self.cycle, state_hash = hash, "Simulation state hash");
        }

        self.drain_events()
    }

    fn update_houses(&mut self) {
        for id in HouseId::ALL {
            let Some(house) = self.houses[id.index()].as_mut() else {
                continue;
            };
            let spice_lost = house.update(self.cycle, &mut self.rng);
            let quota = house.quota();
            let reached_quota = quota > 0 && house.credits() >= quota;
            if spice_lost {
                self.events.push(GameEvent::SpiceLost { house: id });
            }
            if self.options.quota_victory && reached_quota {
                tracing::info!(house = id.name(), quota, "Quota reached");
                self.win_house(id);
            }
        }
    }

    fn refresh_sight(&mut self) {
        let sightings: Vec<(HouseId, Coord, i32)> = self
            .objects
            .iter_sorted()
            .filter(|object| object.location().is_some())
            .map(|object| {
                (
                    object.owner(),
                    object.real_position().to_tile(),
                    object.item().data().view_range,
                )
            })
            .collect();
        for (house, center, radius) in sightings {
            self.view_map_for_team(house, center, radius);
        }
    }

    /// Hash of the complete saved state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.save().hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the whole game state.
    #[must_use]
    pub fn save(&self) -> Vec<u8> {
        let mut stream = OutputStream::new();
        stream.write_u32(self.cycle);
        self.options.save(&mut stream);
        self.rng.save(&mut stream);
        self.map.save(&mut stream, self.cycle);

        let present: Vec<bool> = self.houses.iter().map(Option::is_some).collect();
        stream.write_bools(&present);
        for house in self.houses() {
            house.save(&mut stream);
        }

        self.objects.save(&mut stream);

        stream.write_u32(self.bullets.len() as u32);
        for bullet in &self.bullets {
            bullet.save(&mut stream);
        }

        self.triggers.save(&mut stream);

        match self.outcome {
            None => stream.write_u8(OUTCOME_NONE),
            Some(GameOutcome::Victory { team, house }) => {
                stream.write_u8(OUTCOME_VICTORY);
                stream.write_u8(team);
                stream.write_u32(house as u32);
            }
            Some(GameOutcome::Draw) => stream.write_u8(OUTCOME_DRAW),
            Some(GameOutcome::TimedOut) => stream.write_u8(OUTCOME_TIMED_OUT),
        }
        stream.into_bytes()
    }

    /// Restore a game written by [`Simulation::save`].
    ///
    /// Fails without side effects on truncated, trailing or inconsistent
    /// data. House object counters are rebuilt from the registry.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut stream = InputStream::new(data);
        let cycle = stream.read_u32()?;
        let options = GameOptions::load_from_stream(&mut stream)?;
        let rng = GameRng::load(&mut stream)?;
        let map = Map::load(&mut stream)?;

        let present = stream.read_bools::<NUM_HOUSES>()?;
        let mut houses: [Option<House>; NUM_HOUSES] = Default::default();
        for (index, slot) in houses.iter_mut().enumerate() {
            if !present[index] {
                continue;
            }
            let house = House::load(&mut stream)?;
            if house.id().index() != index {
                return Err(GameError::CorruptSave(format!(
                    "house {} stored in slot {index}",
                    house.id().name()
                )));
            }
            *slot = Some(house);
        }

        let objects = ObjectManager::load(&mut stream)?;

        let num_bullets = stream.read_count(4)?;
        let bullets = (0..num_bullets)
            .map(|_| Bullet::load(&mut stream))
            .collect::<Result<Vec<_>>>()?;

        let triggers = TriggerManager::load(&mut stream)?;

        let outcome = match stream.read_u8()? {
            OUTCOME_NONE => None,
            OUTCOME_VICTORY => {
                let team = stream.read_u8()?;
                let house = HouseId::from_u32(stream.read_u32()?)?;
                Some(GameOutcome::Victory { team, house })
            }
            OUTCOME_DRAW => Some(GameOutcome::Draw),
            OUTCOME_TIMED_OUT => Some(GameOutcome::TimedOut),
            other => return Err(GameError::CorruptSave(format!("invalid outcome {other}"))),
        };

        if stream.remaining() > 0 {
            return Err(GameError::CorruptSave(format!(
                "{} trailing bytes after game state",
                stream.remaining()
            )));
        }

        for object in objects.iter_sorted() {
            let Some(house) = houses[object.owner().index()].as_mut() else {
                return Err(GameError::CorruptSave(format!(
                    "object {} owned by missing house {}",
                    object.id(),
                    object.owner().name()
                )));
            };
            if object.is_structure() {
                house.increment_structures(object.item());
            } else {
                house.increment_units(object.item());
            }
        }

        tracing::info!(cycle, objects = objects.len(), bullets = bullets.len(), "Game state loaded");

        Ok(Self {
            cycle,
            options,
            rng,
            map,
            houses,
            objects,
            bullets,
            triggers,
            events: Vec::new(),
            outcome,
        })
    }
}
