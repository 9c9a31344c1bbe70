//! A single map cell.
//!
//! A tile owns its terrain, spice, fog-of-war bookkeeping, cosmetic remnants
//! (damage decals, dead units, tracks) and four occupancy lists. Occupants
//! are referenced by [`ObjectId`] only; the lists never own objects and may
//! contain ids whose object has already been destroyed.

use serde::{Deserialize, Serialize};

use crate::config::GameOptions;
use crate::data::{
    HouseId, DAMAGE_PER_TILE, FOG_TIMEOUT, NUM_ANGLES, NUM_INFANTRY_PER_TILE, NUM_TEAMS,
    RANDOM_SPICE_MAX, RANDOM_SPICE_MIN, RANDOM_THICK_SPICE_MAX, RANDOM_THICK_SPICE_MIN,
    TRACKS_TIME,
};
use crate::error::{GameError, Result};
use crate::math::{fixed_int, Coord, Fixed};
use crate::objects::{ObjectId, ObjectManager};
use crate::random::GameRng;
use crate::stream::{InputStream, OutputStream};

/// Upper bound for the spice stored on one tile.
pub const MAX_SPICE: Fixed = fixed_int(RANDOM_THICK_SPICE_MAX);

/// Terrain of a tile. Numeric values appear in save data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainType {
    /// Concrete foundation.
    Slab = 0,
    /// Open sand.
    #[default]
    Sand = 1,
    /// Buildable rock.
    Rock = 2,
    /// Sand dunes.
    Dunes = 3,
    /// Impassable mountain.
    Mountain = 4,
    /// Spice field.
    Spice = 5,
    /// Dense spice field.
    ThickSpice = 6,
    /// Erupts into a spice field when shot.
    SpiceBloom = 7,
    /// Grants a random reward when shot.
    SpecialBloom = 8,
}

impl TerrainType {
    /// Look up a terrain type by numeric id.
    pub fn from_u32(id: u32) -> Result<Self> {
        Ok(match id {
            0 => Self::Slab,
            1 => Self::Sand,
            2 => Self::Rock,
            3 => Self::Dunes,
            4 => Self::Mountain,
            5 => Self::Spice,
            6 => Self::ThickSpice,
            7 => Self::SpiceBloom,
            8 => Self::SpecialBloom,
            other => return Err(GameError::InvalidTerrainType(other)),
        })
    }

    /// Terrain for a scenario map character.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(Self::Sand),
            '^' => Some(Self::Dunes),
            '~' => Some(Self::Spice),
            '+' => Some(Self::ThickSpice),
            '%' => Some(Self::Rock),
            '@' => Some(Self::Mountain),
            'O' => Some(Self::SpiceBloom),
            'Q' => Some(Self::SpecialBloom),
            _ => None,
        }
    }

    /// Rock, slab and mountain: no sand region, no sandworms.
    #[must_use]
    pub const fn is_rock(self) -> bool {
        matches!(self, Self::Rock | Self::Slab | Self::Mountain)
    }

    /// Terrain that keeps vehicle tracks.
    #[must_use]
    pub const fn keeps_tracks(self) -> bool {
        matches!(
            self,
            Self::Sand | Self::Dunes | Self::Spice | Self::ThickSpice
        )
    }

    /// Radar colour (ARGB).
    #[must_use]
    pub const fn color(self) -> u32 {
        match self {
            Self::Slab => 0xFF_60_60_60,
            Self::Sand => 0xFF_D8_B0_70,
            Self::Rock => 0xFF_7C_64_48,
            Self::Dunes => 0xFF_C8_98_58,
            Self::Mountain => 0xFF_4C_3C_2C,
            Self::Spice => 0xFF_D0_70_30,
            Self::ThickSpice => 0xFF_B0_50_20,
            Self::SpiceBloom | Self::SpecialBloom => 0xFF_E0_80_40,
        }
    }
}

/// Kind of crater left on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecalKind {
    /// Scorched rock.
    RockDamage = 0,
    /// Blast crater in sand.
    SandDamage = 1,
}

/// A crater decal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DamageDecal {
    /// Crater kind.
    pub kind: DecalKind,
    /// Graphic variant.
    pub tile: i32,
    /// World position.
    pub real_pos: Coord,
}

/// Kind of remnant left by a dead unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadUnitKind {
    /// A fallen soldier.
    Infantry = 0,
    /// A soldier run over by a vehicle.
    InfantrySquashed1 = 1,
    /// Alternative squashed graphic.
    InfantrySquashed2 = 2,
    /// A crashed carryall.
    Carryall = 3,
    /// A crashed ornithopter.
    Ornithopter = 4,
}

impl DeadUnitKind {
    fn from_u8(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::Infantry,
            1 => Self::InfantrySquashed1,
            2 => Self::InfantrySquashed2,
            3 => Self::Carryall,
            4 => Self::Ornithopter,
            other => {
                return Err(GameError::CorruptSave(format!(
                    "invalid dead unit kind {other}"
                )))
            }
        })
    }
}

/// A decaying dead-unit remnant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadUnit {
    /// Remnant kind.
    pub kind: DeadUnitKind,
    /// House of the dead unit.
    pub house: HouseId,
    /// Whether it lies on sand.
    pub on_sand: bool,
    /// World position.
    pub real_pos: Coord,
    /// Cycles left before it disappears.
    pub timer: i16,
}

/// One map cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    terrain: TerrainType,
    explored: [bool; NUM_TEAMS],
    last_access: [u32; NUM_TEAMS],
    fog_color: u32,
    owner: Option<HouseId>,
    sand_region: Option<u32>,
    spice: Fixed,
    damage: Vec<DamageDecal>,
    dead_units: Vec<DeadUnit>,
    destroyed_structure_tile: Option<i32>,
    tracks: [u32; NUM_ANGLES],
    assigned_air: Vec<ObjectId>,
    assigned_infantry: Vec<ObjectId>,
    assigned_underground: Vec<ObjectId>,
    assigned_non_infantry_ground: Vec<ObjectId>,
}

impl Default for Tile {
    fn default() -> Self {
        Self::new()
    }
}

impl Tile {
    /// An unexplored sand tile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            terrain: TerrainType::Sand,
            explored: [false; NUM_TEAMS],
            last_access: [0; NUM_TEAMS],
            fog_color: 0xFF_00_00_00,
            owner: None,
            sand_region: None,
            spice: Fixed::ZERO,
            damage: Vec::new(),
            dead_units: Vec::new(),
            destroyed_structure_tile: None,
            tracks: [0; NUM_ANGLES],
            assigned_air: Vec::new(),
            assigned_infantry: Vec::new(),
            assigned_underground: Vec::new(),
            assigned_non_infantry_ground: Vec::new(),
        }
    }

    // ---------------------------------------------------------------
    // Terrain and spice
    // ---------------------------------------------------------------

    /// Current terrain.
    #[must_use]
    pub const fn terrain(&self) -> TerrainType {
        self.terrain
    }

    /// Rock, slab or mountain.
    #[must_use]
    pub const fn is_rock(&self) -> bool {
        self.terrain.is_rock()
    }

    /// Mountain.
    #[must_use]
    pub fn is_mountain(&self) -> bool {
        self.terrain == TerrainType::Mountain
    }

    /// Sand or dunes.
    #[must_use]
    pub fn is_sand(&self) -> bool {
        matches!(self.terrain, TerrainType::Sand | TerrainType::Dunes)
    }

    /// Spice or thick spice.
    #[must_use]
    pub fn is_spice(&self) -> bool {
        matches!(self.terrain, TerrainType::Spice | TerrainType::ThickSpice)
    }

    /// Thick spice.
    #[must_use]
    pub fn is_thick_spice(&self) -> bool {
        self.terrain == TerrainType::ThickSpice
    }

    /// Spice bloom.
    #[must_use]
    pub fn is_spice_bloom(&self) -> bool {
        self.terrain == TerrainType::SpiceBloom
    }

    /// Special bloom.
    #[must_use]
    pub fn is_special_bloom(&self) -> bool {
        self.terrain == TerrainType::SpecialBloom
    }

    /// Change the terrain.
    ///
    /// Fresh spice is rolled from `rng`. Turning a tile into rock clears its
    /// sand region and evicts underground units; mountains also evict
    /// non-infantry ground objects. Evicted ids are returned so the caller can
    /// destroy the objects; they are no longer listed on this tile.
    pub fn set_type(&mut self, terrain: TerrainType, rng: &mut GameRng) -> Vec<ObjectId> {
        self.terrain = terrain;
        self.destroyed_structure_tile = None;

        let mut evicted = Vec::new();
        match terrain {
            TerrainType::Spice => {
                self.spice = Fixed::from_num(rng.rand(RANDOM_SPICE_MIN, RANDOM_SPICE_MAX));
            }
            TerrainType::ThickSpice => {
                self.spice = Fixed::from_num(rng.rand(RANDOM_THICK_SPICE_MIN, RANDOM_THICK_SPICE_MAX));
            }
            TerrainType::Dunes => {}
            _ => {
                self.spice = Fixed::ZERO;
                if self.is_rock() {
                    self.sand_region = None;
                    evicted.append(&mut self.assigned_underground);
                    if terrain == TerrainType::Mountain {
                        evicted.append(&mut self.assigned_non_infantry_ground);
                    }
                }
            }
        }
        evicted
    }

    /// Spice on the tile.
    #[must_use]
    pub const fn spice(&self) -> Fixed {
        self.spice
    }

    /// Set the spice amount (clamped to `0..=MAX_SPICE`) and derive the terrain from it.
    pub fn set_spice(&mut self, spice: Fixed) {
        self.spice = spice.clamp(Fixed::ZERO, MAX_SPICE);
        self.terrain = Self::terrain_for_spice(self.spice);
    }

    fn terrain_for_spice(spice: Fixed) -> TerrainType {
        if spice <= Fixed::ZERO {
            TerrainType::Sand
        } else if spice >= fixed_int(RANDOM_THICK_SPICE_MIN) {
            TerrainType::ThickSpice
        } else {
            TerrainType::Spice
        }
    }

    /// Remove one harvesting step of spice and return the amount removed.
    ///
    /// Thick spice falling below the thick threshold becomes spice, and a
    /// tile that runs dry becomes sand.
    pub fn harvest_spice(&mut self) -> Fixed {
        let old = self.spice;
        self.spice = (self.spice - crate::data::HARVEST_SPEED).max(Fixed::ZERO);

        let thick = fixed_int(RANDOM_THICK_SPICE_MIN);
        if old >= thick && self.spice < thick {
            self.terrain = TerrainType::Spice;
        }
        if old > Fixed::ZERO && self.spice == Fixed::ZERO {
            self.terrain = TerrainType::Sand;
        }
        old - self.spice
    }

    /// Connected sand component, `None` on rock.
    #[must_use]
    pub const fn sand_region(&self) -> Option<u32> {
        self.sand_region
    }

    /// Assign the sand region.
    pub fn set_sand_region(&mut self, region: Option<u32>) {
        self.sand_region = region;
    }

    /// House that owns the ground (concrete, structures).
    #[must_use]
    pub const fn owner(&self) -> Option<HouseId> {
        self.owner
    }

    /// Set the ground owner.
    pub fn set_owner(&mut self, owner: Option<HouseId>) {
        self.owner = owner;
    }

    /// Rubble graphic index left by a destroyed structure.
    #[must_use]
    pub const fn destroyed_structure_tile(&self) -> Option<i32> {
        self.destroyed_structure_tile
    }

    /// Set the rubble graphic index.
    pub fn set_destroyed_structure_tile(&mut self, tile: Option<i32>) {
        self.destroyed_structure_tile = tile;
    }

    // ---------------------------------------------------------------
    // Fog of war
    // ---------------------------------------------------------------

    /// Whether `house` has ever seen this tile.
    #[must_use]
    pub fn is_explored(&self, house: HouseId, options: &GameOptions) -> bool {
        options.reveal_map || self.explored[house.index()]
    }

    /// Whether `house` has not seen this tile recently.
    #[must_use]
    pub fn is_fogged(&self, house: HouseId, cycle: u32, options: &GameOptions) -> bool {
        if options.reveal_map || !options.fog_of_war {
            return false;
        }
        cycle.wrapping_sub(self.last_access[house.index()]) >= FOG_TIMEOUT
    }

    /// Record that `house` sees this tile now.
    pub fn set_explored(&mut self, house: HouseId, cycle: u32) {
        self.explored[house.index()] = true;
        self.last_access[house.index()] = cycle;
    }

    /// Cycle of the last sighting by `house`.
    #[must_use]
    pub const fn last_access(&self, house: HouseId) -> u32 {
        self.last_access[house.index()]
    }

    /// Colour remembered for fogged radar pixels.
    #[must_use]
    pub const fn fog_color(&self) -> u32 {
        self.fog_color
    }

    /// Remember the colour shown while fogged.
    pub fn set_fog_color(&mut self, color: u32) {
        self.fog_color = color;
    }

    // ---------------------------------------------------------------
    // Cosmetic remnants
    // ---------------------------------------------------------------

    /// Leave tracks heading `direction` (0..8), on sand-like terrain only.
    pub fn set_track(&mut self, direction: usize, cycle: u32) {
        if self.terrain.keeps_tracks() {
            if let Some(track) = self.tracks.get_mut(direction) {
                *track = cycle;
            }
        }
    }

    /// Whether fresh tracks heading `direction` are visible at `cycle`.
    #[must_use]
    pub fn has_track(&self, direction: usize, cycle: u32) -> bool {
        self.tracks
            .get(direction)
            .is_some_and(|&created| created != 0 && cycle.wrapping_sub(created) < TRACKS_TIME)
    }

    /// Crater decals.
    #[must_use]
    pub fn damage(&self) -> &[DamageDecal] {
        &self.damage
    }

    /// Add a crater unless the tile already has the maximum.
    pub fn add_damage(&mut self, decal: DamageDecal) -> bool {
        if self.damage.len() >= DAMAGE_PER_TILE {
            return false;
        }
        self.damage.push(decal);
        true
    }

    /// Dead-unit remnants.
    #[must_use]
    pub fn dead_units(&self) -> &[DeadUnit] {
        &self.dead_units
    }

    /// Add a dead-unit remnant.
    pub fn add_dead_unit(&mut self, dead_unit: DeadUnit) {
        self.dead_units.push(dead_unit);
    }

    /// Remove craters and remnants.
    pub fn clear_terrain(&mut self) {
        self.damage.clear();
        self.dead_units.clear();
    }

    /// Advance remnant timers; remnants whose timer already hit zero vanish.
    pub fn update(&mut self) {
        self.dead_units.retain_mut(|dead| {
            if dead.timer == 0 {
                return false;
            }
            dead.timer -= 1;
            true
        });
    }

    // ---------------------------------------------------------------
    // Occupancy
    // ---------------------------------------------------------------

    /// Register an air unit.
    pub fn assign_air_unit(&mut self, id: ObjectId) {
        self.unassign_object(id);
        self.assigned_air.push(id);
    }

    /// Register a vehicle or structure.
    pub fn assign_non_infantry_ground_object(&mut self, id: ObjectId) {
        self.unassign_object(id);
        self.assigned_non_infantry_ground.push(id);
    }

    /// Register an underground unit.
    pub fn assign_underground_unit(&mut self, id: ObjectId) {
        self.unassign_object(id);
        self.assigned_underground.push(id);
    }

    /// Register an infantry unit and return its sub-tile slot.
    ///
    /// `current_position` keeps an already chosen slot; otherwise the first
    /// slot not used by any live infantry on the tile is taken. Returns
    /// `None` (and registers nothing) when the tile is full.
    pub fn assign_infantry(
        &mut self,
        id: ObjectId,
        current_position: Option<u8>,
        objects: &ObjectManager,
    ) -> Option<u8> {
        self.unassign_object(id);

        let mut used = [false; NUM_INFANTRY_PER_TILE];
        let mut live = 0;
        for other in &self.assigned_infantry {
            let Some(object) = objects.get(*other) else {
                continue;
            };
            live += 1;
            if let Some(slot) = object.tile_position() {
                if let Some(flag) = used.get_mut(slot as usize) {
                    *flag = true;
                }
            }
        }
        if live >= NUM_INFANTRY_PER_TILE {
            return None;
        }

        let slot = match current_position {
            Some(slot) if (slot as usize) < NUM_INFANTRY_PER_TILE => slot,
            _ => used.iter().position(|taken| !taken)? as u8,
        };
        self.assigned_infantry.push(id);
        Some(slot)
    }

    /// Deregister an air unit.
    pub fn unassign_air_unit(&mut self, id: ObjectId) {
        self.assigned_air.retain(|other| *other != id);
    }

    /// Deregister a vehicle or structure.
    pub fn unassign_non_infantry_ground_object(&mut self, id: ObjectId) {
        self.assigned_non_infantry_ground.retain(|other| *other != id);
    }

    /// Deregister an underground unit.
    pub fn unassign_underground_unit(&mut self, id: ObjectId) {
        self.assigned_underground.retain(|other| *other != id);
    }

    /// Deregister an infantry unit.
    pub fn unassign_infantry(&mut self, id: ObjectId) {
        self.assigned_infantry.retain(|other| *other != id);
    }

    /// Remove `id` from every occupancy list.
    pub fn unassign_object(&mut self, id: ObjectId) {
        self.unassign_infantry(id);
        self.unassign_underground_unit(id);
        self.unassign_non_infantry_ground_object(id);
        self.unassign_air_unit(id);
    }

    /// Air units on the tile.
    #[must_use]
    pub fn air_units(&self) -> &[ObjectId] {
        &self.assigned_air
    }

    /// Infantry on the tile.
    #[must_use]
    pub fn infantry(&self) -> &[ObjectId] {
        &self.assigned_infantry
    }

    /// Underground units on the tile.
    #[must_use]
    pub fn underground_units(&self) -> &[ObjectId] {
        &self.assigned_underground
    }

    /// Vehicles and structures on the tile.
    #[must_use]
    pub fn non_infantry_ground_objects(&self) -> &[ObjectId] {
        &self.assigned_non_infantry_ground
    }

    /// Any air unit present.
    #[must_use]
    pub fn has_air_unit(&self) -> bool {
        !self.assigned_air.is_empty()
    }

    /// Any infantry present.
    #[must_use]
    pub fn has_infantry(&self) -> bool {
        !self.assigned_infantry.is_empty()
    }

    /// Any underground unit present.
    #[must_use]
    pub fn has_underground_unit(&self) -> bool {
        !self.assigned_underground.is_empty()
    }

    /// Any vehicle or structure present.
    #[must_use]
    pub fn has_non_infantry_ground_object(&self) -> bool {
        !self.assigned_non_infantry_ground.is_empty()
    }

    /// Anything standing on the ground.
    #[must_use]
    pub fn has_ground_object(&self) -> bool {
        self.has_infantry() || self.has_non_infantry_ground_object()
    }

    /// Anything at all.
    #[must_use]
    pub fn has_any_object(&self) -> bool {
        self.has_ground_object() || self.has_air_unit() || self.has_underground_unit()
    }

    /// Whether another infantry unit fits.
    #[must_use]
    pub fn infantry_not_full(&self) -> bool {
        self.assigned_infantry.len() < NUM_INFANTRY_PER_TILE
    }

    /// The object drawn on top: air, then vehicles, then infantry, then underground.
    #[must_use]
    pub fn object(&self) -> Option<ObjectId> {
        self.assigned_air
            .first()
            .or_else(|| self.assigned_non_infantry_ground.first())
            .or_else(|| self.assigned_infantry.first())
            .or_else(|| self.assigned_underground.first())
            .copied()
    }

    /// The ground occupant: vehicles or structures before infantry.
    #[must_use]
    pub fn ground_object(&self) -> Option<ObjectId> {
        self.assigned_non_infantry_ground
            .first()
            .or_else(|| self.assigned_infantry.first())
            .copied()
    }

    /// Every occupant: infantry, vehicles, underground, then air.
    pub fn all_assigned(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.assigned_infantry
            .iter()
            .chain(&self.assigned_non_infantry_ground)
            .chain(&self.assigned_underground)
            .chain(&self.assigned_air)
            .copied()
    }

    /// Whether `id` occupies this tile.
    #[must_use]
    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.all_assigned().any(|other| other == id)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write the tile. Tracks older than their lifetime at `cycle` are dropped.
    pub fn save(&self, stream: &mut OutputStream, cycle: u32) {
        stream.write_u32(self.terrain as u32);
        stream.write_bools(&self.explored);

        let access_flags = self.last_access.map(|access| access != 0);
        stream.write_bools(&access_flags);
        for &access in self.last_access.iter().filter(|access| **access != 0) {
            stream.write_u32(access);
        }

        stream.write_u32(self.fog_color);
        stream.write_i32(self.owner.map_or(-1, |house| house.index() as i32));
        stream.write_u32(self.sand_region.unwrap_or(u32::MAX));
        stream.write_fixed(self.spice);

        stream.write_bools(&[
            !self.damage.is_empty(),
            !self.dead_units.is_empty(),
            !self.assigned_air.is_empty(),
            !self.assigned_infantry.is_empty(),
            !self.assigned_underground.is_empty(),
            !self.assigned_non_infantry_ground.is_empty(),
        ]);

        if !self.damage.is_empty() {
            stream.write_u32(self.damage.len() as u32);
            for decal in &self.damage {
                stream.write_u32(decal.kind as u32);
                stream.write_i32(decal.tile);
                stream.write_i32(decal.real_pos.x);
                stream.write_i32(decal.real_pos.y);
            }
        }

        if !self.dead_units.is_empty() {
            stream.write_u32(self.dead_units.len() as u32);
            for dead in &self.dead_units {
                stream.write_u8(dead.kind as u8);
                stream.write_u8(dead.house.index() as u8);
                stream.write_bool(dead.on_sand);
                stream.write_i32(dead.real_pos.x);
                stream.write_i32(dead.real_pos.y);
                stream.write_i16(dead.timer);
            }
        }

        stream.write_i32(self.destroyed_structure_tile.unwrap_or(-1));

        let tracks = self.tracks.map(|created| {
            if created.saturating_add(TRACKS_TIME) < cycle {
                0
            } else {
                created
            }
        });
        stream.write_bools(&tracks.map(|created| created != 0));
        for &created in tracks.iter().filter(|created| **created != 0) {
            stream.write_u32(created);
        }

        for list in [
            &self.assigned_air,
            &self.assigned_infantry,
            &self.assigned_underground,
            &self.assigned_non_infantry_ground,
        ] {
            if !list.is_empty() {
                let raw: Vec<u32> = list.iter().map(|id| id.raw()).collect();
                stream.write_u32_vec(&raw);
            }
        }
    }

    /// Read a tile written by [`Tile::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let mut tile = Self::new();
        tile.terrain = TerrainType::from_u32(stream.read_u32()?)?;
        tile.explored = stream.read_bools::<NUM_TEAMS>()?;

        let access_flags = stream.read_bools::<NUM_TEAMS>()?;
        for (slot, present) in access_flags.iter().enumerate() {
            if *present {
                tile.last_access[slot] = stream.read_u32()?;
            }
        }

        tile.fog_color = stream.read_u32()?;
        tile.owner = match stream.read_i32()? {
            -1 => None,
            id => Some(HouseId::from_u32(id as u32)?),
        };
        tile.sand_region = match stream.read_u32()? {
            u32::MAX => None,
            region => Some(region),
        };
        tile.spice = stream.read_fixed()?;

        let [has_damage, has_dead_units, has_air, has_infantry, has_underground, has_non_infantry] =
            stream.read_bools::<6>()?;

        if has_damage {
            let count = stream.read_count(16)?;
            for _ in 0..count {
                let kind = match stream.read_u32()? {
                    0 => DecalKind::RockDamage,
                    1 => DecalKind::SandDamage,
                    other => {
                        return Err(GameError::CorruptSave(format!("invalid decal kind {other}")))
                    }
                };
                let tile_index = stream.read_i32()?;
                let real_pos = Coord::new(stream.read_i32()?, stream.read_i32()?);
                tile.damage.push(DamageDecal {
                    kind,
                    tile: tile_index,
                    real_pos,
                });
            }
        }

        if has_dead_units {
            let count = stream.read_count(13)?;
            for _ in 0..count {
                let kind = DeadUnitKind::from_u8(stream.read_u8()?)?;
                let house = HouseId::from_u32(u32::from(stream.read_u8()?))?;
                let on_sand = stream.read_bool()?;
                let real_pos = Coord::new(stream.read_i32()?, stream.read_i32()?);
                let timer = stream.read_i16()?;
                tile.dead_units.push(DeadUnit {
                    kind,
                    house,
                    on_sand,
                    real_pos,
                    timer,
                });
            }
        }

        tile.destroyed_structure_tile = match stream.read_i32()? {
            -1 => None,
            index => Some(index),
        };

        let track_flags = stream.read_bools::<NUM_ANGLES>()?;
        for (direction, present) in track_flags.iter().enumerate() {
            if *present {
                tile.tracks[direction] = stream.read_u32()?;
            }
        }

        let read_ids = |stream: &mut InputStream<'_>, present: bool| -> Result<Vec<ObjectId>> {
            if !present {
                return Ok(Vec::new());
            }
            stream
                .read_u32_vec()?
                .into_iter()
                .map(|raw| {
                    ObjectId::from_raw(raw)
                        .ok_or_else(|| GameError::CorruptSave("occupant id 0".to_string()))
                })
                .collect()
        };
        tile.assigned_air = read_ids(stream, has_air)?;
        tile.assigned_infantry = read_ids(stream, has_infantry)?;
        tile.assigned_underground = read_ids(stream, has_underground)?;
        tile.assigned_non_infantry_ground = read_ids(stream, has_non_infantry)?;

        Ok(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ItemId;
    use crate::objects::GameObject;
    use proptest::prelude::*;

    fn roundtrip(tile: &Tile, cycle: u32) -> Tile {
        let mut out = OutputStream::new();
        tile.save(&mut out, cycle);
        let bytes = out.into_bytes();
        let mut input = InputStream::new(&bytes);
        let loaded = Tile::load(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        loaded
    }

    #[test]
    fn test_empty_tile_roundtrip() {
        let tile = Tile::new();
        assert_eq!(roundtrip(&tile, 0), tile);
    }

    #[test]
    fn test_tile_with_decals_and_dead_unit_roundtrip() {
        let mut tile = Tile::new();
        tile.set_explored(HouseId::Ordos, 77);
        tile.set_owner(Some(HouseId::Ordos));
        tile.set_sand_region(Some(3));
        tile.set_spice(Fixed::from_num(123));
        for (index, kind) in [DecalKind::SandDamage, DecalKind::RockDamage].into_iter().enumerate() {
            assert!(tile.add_damage(DamageDecal {
                kind,
                tile: index as i32,
                real_pos: Coord::new(100 + index as i32, 200),
            }));
        }
        tile.add_dead_unit(DeadUnit {
            kind: DeadUnitKind::Infantry,
            house: HouseId::Harkonnen,
            on_sand: true,
            real_pos: Coord::new(90, 91),
            timer: 1200,
        });
        tile.set_track(3, 50);
        tile.assign_air_unit(ObjectId(9));
        tile.assign_non_infantry_ground_object(ObjectId(4));

        let loaded = roundtrip(&tile, 60);
        assert_eq!(loaded, tile);
        assert_eq!(loaded.damage().len(), 2);
        assert_eq!(loaded.dead_units().len(), 1);
        assert!(loaded.has_track(3, 60));
    }

    #[test]
    fn test_expired_tracks_are_not_saved() {
        let mut tile = Tile::new();
        tile.set_track(1, 10);
        let loaded = roundtrip(&tile, 10 + TRACKS_TIME + 1);
        assert!(!loaded.has_track(1, 10));
    }

    #[test]
    fn test_truncated_tile_fails() {
        let mut tile = Tile::new();
        tile.assign_air_unit(ObjectId(2));
        let mut out = OutputStream::new();
        tile.save(&mut out, 0);
        let bytes = out.into_bytes();
        let result = Tile::load(&mut InputStream::new(&bytes[..bytes.len() - 1]));
        assert!(result.is_err());
    }

    #[test]
    fn test_set_spice_thresholds() {
        let mut tile = Tile::new();
        tile.set_spice(Fixed::ZERO);
        assert_eq!(tile.terrain(), TerrainType::Sand);
        tile.set_spice(Fixed::from_num(200));
        assert_eq!(tile.terrain(), TerrainType::Spice);
        tile.set_spice(Fixed::from_num(416));
        assert_eq!(tile.terrain(), TerrainType::ThickSpice);
        tile.set_spice(Fixed::from_num(-5));
        assert_eq!(tile.spice(), Fixed::ZERO);
        assert_eq!(tile.terrain(), TerrainType::Sand);
    }

    #[test]
    fn test_harvest_downgrades_terrain() {
        let mut tile = Tile::new();
        tile.set_spice(Fixed::from_num(416.05));
        assert!(tile.is_thick_spice());
        let removed = tile.harvest_spice();
        assert_eq!(removed, crate::data::HARVEST_SPEED);
        assert_eq!(tile.terrain(), TerrainType::Spice);

        tile.set_spice(Fixed::from_num(0.05));
        let removed = tile.harvest_spice();
        assert_eq!(removed, Fixed::from_num(0.05));
        assert_eq!(tile.terrain(), TerrainType::Sand);
        assert_eq!(tile.harvest_spice(), Fixed::ZERO);
    }

    #[test]
    fn test_set_type_rolls_spice() {
        let mut rng = GameRng::from_seed(1);
        let mut tile = Tile::new();
        tile.set_type(TerrainType::ThickSpice, &mut rng);
        assert!(tile.spice() >= Fixed::from_num(RANDOM_THICK_SPICE_MIN));
        tile.set_type(TerrainType::Dunes, &mut rng);
        assert!(tile.spice() >= Fixed::from_num(RANDOM_THICK_SPICE_MIN));
        tile.set_type(TerrainType::Rock, &mut rng);
        assert_eq!(tile.spice(), Fixed::ZERO);
    }

    #[test]
    fn test_set_type_mountain_evicts() {
        let mut rng = GameRng::from_seed(1);
        let mut tile = Tile::new();
        tile.set_sand_region(Some(1));
        tile.assign_underground_unit(ObjectId(1));
        tile.assign_non_infantry_ground_object(ObjectId(2));
        tile.assign_air_unit(ObjectId(3));

        let evicted = tile.set_type(TerrainType::Rock, &mut rng);
        assert_eq!(evicted, vec![ObjectId(1)]);
        assert_eq!(tile.sand_region(), None);
        assert!(tile.has_non_infantry_ground_object());

        let evicted = tile.set_type(TerrainType::Mountain, &mut rng);
        assert_eq!(evicted, vec![ObjectId(2)]);
        assert!(tile.has_air_unit());
    }

    #[test]
    fn test_fog_window() {
        let options = GameOptions {
            fog_of_war: true,
            ..GameOptions::default()
        };
        let mut tile = Tile::new();
        assert!(!tile.is_explored(HouseId::Atreides, &options));
        tile.set_explored(HouseId::Atreides, 100);
        assert!(tile.is_explored(HouseId::Atreides, &options));
        assert!(!tile.is_fogged(HouseId::Atreides, 100 + FOG_TIMEOUT - 1, &options));
        assert!(tile.is_fogged(HouseId::Atreides, 100 + FOG_TIMEOUT, &options));

        let revealed = GameOptions {
            reveal_map: true,
            ..options
        };
        assert!(!tile.is_fogged(HouseId::Atreides, 100 + FOG_TIMEOUT, &revealed));
        assert!(tile.is_explored(HouseId::Harkonnen, &revealed));
    }

    #[test]
    fn test_tracks_only_on_sand() {
        let mut rng = GameRng::from_seed(1);
        let mut tile = Tile::new();
        tile.set_type(TerrainType::Rock, &mut rng);
        tile.set_track(0, 5);
        assert!(!tile.has_track(0, 5));
    }

    #[test]
    fn test_dead_units_decay() {
        let mut tile = Tile::new();
        tile.add_dead_unit(DeadUnit {
            kind: DeadUnitKind::Ornithopter,
            house: HouseId::Ordos,
            on_sand: false,
            real_pos: Coord::new(1, 1),
            timer: 1,
        });
        tile.update();
        assert_eq!(tile.dead_units()[0].timer, 0);
        tile.update();
        assert!(tile.dead_units().is_empty());
    }

    #[test]
    fn test_infantry_slots() {
        let mut objects = ObjectManager::new();
        let mut tile = Tile::new();
        let mut slots = Vec::new();
        for _ in 0..NUM_INFANTRY_PER_TILE {
            let id = objects.insert(GameObject::new(ItemId::Soldier, HouseId::Ordos));
            let slot = tile.assign_infantry(id, None, &objects).unwrap();
            if let Some(object) = objects.get_mut(id) {
                object.set_tile_position(Some(slot));
            }
            slots.push(slot);
        }
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);

        let extra = objects.insert(GameObject::new(ItemId::Soldier, HouseId::Ordos));
        assert_eq!(tile.assign_infantry(extra, None, &objects), None);
        assert!(!tile.contains_object(extra));

        // a dead soldier frees its slot
        let dead = tile.infantry()[2];
        objects.remove(dead);
        tile.unassign_infantry(dead);
        assert_eq!(tile.assign_infantry(extra, None, &objects), Some(2));
    }

    #[test]
    fn test_object_priority() {
        let mut tile = Tile::new();
        tile.assign_underground_unit(ObjectId(4));
        assert_eq!(tile.object(), Some(ObjectId(4)));
        tile.assign_infantry(ObjectId(3), Some(0), &ObjectManager::new());
        assert_eq!(tile.object(), Some(ObjectId(3)));
        tile.assign_non_infantry_ground_object(ObjectId(2));
        assert_eq!(tile.object(), Some(ObjectId(2)));
        assert_eq!(tile.ground_object(), Some(ObjectId(2)));
        tile.assign_air_unit(ObjectId(1));
        assert_eq!(tile.object(), Some(ObjectId(1)));

        let all: Vec<_> = tile.all_assigned().collect();
        assert_eq!(all, vec![ObjectId(3), ObjectId(2), ObjectId(4), ObjectId(1)]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Air(u32),
        Ground(u32),
        Underground(u32),
        Infantry(u32),
        Unassign(u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..6).prop_map(Op::Air),
            (1u32..6).prop_map(Op::Ground),
            (1u32..6).prop_map(Op::Underground),
            (1u32..6).prop_map(Op::Infantry),
            (1u32..6).prop_map(Op::Unassign),
        ]
    }

    proptest! {
        #[test]
        fn prop_object_in_at_most_one_list(ops in proptest::collection::vec(arb_op(), 0..40)) {
            let objects = ObjectManager::new();
            let mut tile = Tile::new();
            for op in ops {
                match op {
                    Op::Air(id) => tile.assign_air_unit(ObjectId(id)),
                    Op::Ground(id) => tile.assign_non_infantry_ground_object(ObjectId(id)),
                    Op::Underground(id) => tile.assign_underground_unit(ObjectId(id)),
                    Op::Infantry(id) => {
                        tile.assign_infantry(ObjectId(id), None, &objects);
                    }
                    Op::Unassign(id) => tile.unassign_object(ObjectId(id)),
                }
            }
            for id in 1u32..6 {
                let occurrences = tile.all_assigned().filter(|other| *other == ObjectId(id)).count();
                prop_assert!(occurrences <= 1);
            }
        }

        #[test]
        fn prop_set_spice_clamps_and_derives_terrain(raw in -1000i32..2000) {
            let mut tile = Tile::new();
            let spice = Fixed::from_num(raw);
            tile.set_spice(spice);
            prop_assert_eq!(tile.spice(), spice.clamp(Fixed::ZERO, MAX_SPICE));
            if tile.spice() == Fixed::ZERO {
                prop_assert_eq!(tile.terrain(), TerrainType::Sand);
            }
            if tile.spice() >= Fixed::from_num(RANDOM_THICK_SPICE_MIN) {
                prop_assert_eq!(tile.terrain(), TerrainType::ThickSpice);
            }
        }
    }
}
