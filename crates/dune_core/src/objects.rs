//! Units and structures, and the registry that owns them.
//!
//! Everything else in the simulation (tiles, bullets, triggers, houses)
//! refers to objects by [`ObjectId`] only. Ids are allocated from a
//! monotonically increasing counter and never reused, so an id that
//! outlives its object simply resolves to `None`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::math::{Coord, Fixed, Vec2Fixed};
use crate::stream::{InputStream, OutputStream};

/// Stable identifier of a unit or structure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Raw value as stored in save data.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Decode an optional id where 0 means "none".
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Encode an optional id, 0 for "none".
    #[must_use]
    pub fn to_raw(id: Option<Self>) -> u32 {
        id.map_or(0, Self::raw)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit or structure on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameObject {
    id: ObjectId,
    item: ItemId,
    owner: HouseId,
    /// Tile (top-left tile for structures); `None` until deployed.
    location: Option<Coord>,
    /// World position of the object's centre.
    real_position: Vec2Fixed,
    health: Fixed,
    /// Facing, 0..8.
    angle: u8,
    /// Infantry sub-tile slot.
    tile_position: Option<u8>,
}

impl GameObject {
    /// A fresh object at full health, not yet on the map.
    #[must_use]
    pub fn new(item: ItemId, owner: HouseId) -> Self {
        Self {
            id: ObjectId(0),
            item,
            owner,
            location: None,
            real_position: Vec2Fixed::ZERO,
            health: Fixed::from_num(item.data().hitpoints),
            angle: 0,
            tile_position: None,
        }
    }

    /// Registry id.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Item type.
    #[must_use]
    pub const fn item(&self) -> ItemId {
        self.item
    }

    /// Owning house.
    #[must_use]
    pub const fn owner(&self) -> HouseId {
        self.owner
    }

    /// Tile the object stands on, or its footprint origin.
    #[must_use]
    pub const fn location(&self) -> Option<Coord> {
        self.location
    }

    /// World position.
    #[must_use]
    pub const fn real_position(&self) -> Vec2Fixed {
        self.real_position
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.health
    }

    /// Maximum health from the item table.
    #[must_use]
    pub fn max_health(&self) -> Fixed {
        Fixed::from_num(self.item.data().hitpoints)
    }

    /// Facing direction.
    #[must_use]
    pub const fn angle(&self) -> u8 {
        self.angle
    }

    /// Infantry sub-tile slot.
    #[must_use]
    pub const fn tile_position(&self) -> Option<u8> {
        self.tile_position
    }

    /// Shorthand for the item's capability flag.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        self.item.is_structure()
    }

    /// Shorthand for the item's capability flag.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        self.item.is_unit()
    }

    /// Shorthand for the item's capability flag.
    #[must_use]
    pub const fn is_infantry(&self) -> bool {
        self.item.is_infantry()
    }

    /// Shorthand for the item's capability flag.
    #[must_use]
    pub const fn is_air_unit(&self) -> bool {
        self.item.is_air_unit()
    }

    /// Shorthand for the item's capability flag.
    #[must_use]
    pub const fn is_ground_unit(&self) -> bool {
        self.item.is_ground_unit()
    }

    /// Tiles covered by the object (just its own tile for units).
    #[must_use]
    pub fn footprint(&self) -> Vec<Coord> {
        let Some(origin) = self.location else {
            return Vec::new();
        };
        let (width, height) = if self.is_structure() {
            self.item.data().size
        } else {
            (1, 1)
        };
        (0..height)
            .flat_map(|dy| (0..width).map(move |dx| Coord::new(origin.x + dx, origin.y + dy)))
            .collect()
    }

    /// World point of the object closest to `point`.
    ///
    /// Structures measure from the nearest point of their footprint, units
    /// from their centre.
    #[must_use]
    pub fn closest_point(&self, point: Coord) -> Coord {
        match (self.is_structure(), self.location) {
            (true, Some(origin)) => {
                let (width, height) = self.item.data().size;
                let min = Coord::new(
                    origin.x * crate::data::TILESIZE,
                    origin.y * crate::data::TILESIZE,
                );
                let max = Coord::new(
                    min.x + width * crate::data::TILESIZE - 1,
                    min.y + height * crate::data::TILESIZE - 1,
                );
                Coord::new(point.x.clamp(min.x, max.x), point.y.clamp(min.y, max.y))
            }
            _ => self.real_position.round(),
        }
    }

    /// Place the object on a tile, centring its world position.
    pub fn set_location(&mut self, location: Coord) {
        self.location = Some(location);
        let center = if self.is_structure() {
            let (width, height) = self.item.data().size;
            Coord::new(
                location.x * crate::data::TILESIZE + width * crate::data::TILESIZE / 2,
                location.y * crate::data::TILESIZE + height * crate::data::TILESIZE / 2,
            )
        } else {
            location.tile_center()
        };
        self.real_position = Vec2Fixed::from_coord(center);
    }

    /// Set health, clamped to `0..=max`.
    pub fn set_health(&mut self, health: Fixed) {
        self.health = health.clamp(Fixed::ZERO, self.max_health());
    }

    /// Set the facing direction (wrapped to 0..8).
    pub fn set_angle(&mut self, angle: u8) {
        self.angle = angle % 8;
    }

    /// Set the infantry slot.
    pub fn set_tile_position(&mut self, slot: Option<u8>) {
        self.tile_position = slot;
    }

    /// Subtract damage; returns `true` when the object has been destroyed.
    pub fn apply_damage(&mut self, damage: Fixed) -> bool {
        self.health = (self.health - damage).max(Fixed::ZERO);
        self.health == Fixed::ZERO
    }

    /// Write the object.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.id.raw());
        stream.write_u32(self.item as u32);
        stream.write_u32(self.owner as u32);
        stream.write_bool(self.location.is_some());
        if let Some(location) = self.location {
            stream.write_i32(location.x);
            stream.write_i32(location.y);
        }
        stream.write_fixed(self.real_position.x);
        stream.write_fixed(self.real_position.y);
        stream.write_fixed(self.health);
        stream.write_u8(self.angle);
        stream.write_i8(self.tile_position.map_or(-1, |slot| slot as i8));
    }

    /// Read an object written by [`GameObject::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let id = ObjectId::from_raw(stream.read_u32()?)
            .ok_or_else(|| GameError::CorruptSave("object with id 0".to_string()))?;
        let item = ItemId::from_u32(stream.read_u32()?)?;
        let owner = HouseId::from_u32(stream.read_u32()?)?;
        let location = if stream.read_bool()? {
            Some(Coord::new(stream.read_i32()?, stream.read_i32()?))
        } else {
            None
        };
        let real_position = Vec2Fixed::new(stream.read_fixed()?, stream.read_fixed()?);
        let health = stream.read_fixed()?;
        let angle = stream.read_u8()?;
        let tile_position = u8::try_from(stream.read_i8()?).ok();

        Ok(Self {
            id,
            item,
            owner,
            location,
            real_position,
            health,
            angle,
            tile_position,
        })
    }
}

/// Central registry of all live objects.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys when the simulation walks every object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectManager {
    objects: HashMap<ObjectId, GameObject>,
    next_id: u32,
}

impl ObjectManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new object and return its freshly allocated id.
    pub fn insert(&mut self, mut object: GameObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        object.id = id;
        self.objects.insert(id, object);
        id
    }

    /// Remove an object by id.
    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Get an object by id.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Get a mutable reference to an object by id.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Check if an object exists.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Get the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Id the next insert will receive.
    #[must_use]
    pub const fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Get sorted object ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.objects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate objects in id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &GameObject> + '_ {
        self.sorted_ids()
            .into_iter()
            .filter_map(move |id| self.objects.get(&id))
    }

    /// Write all objects in id order.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.next_id);
        stream.write_u32(self.objects.len() as u32);
        for object in self.iter_sorted() {
            object.save(stream);
        }
    }

    /// Read a registry written by [`ObjectManager::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let next_id = stream.read_u32()?;
        let count = stream.read_count(8)?;
        let mut objects = HashMap::with_capacity(count);
        for _ in 0..count {
            let object = GameObject::load(stream)?;
            if object.id.raw() >= next_id {
                return Err(GameError::CorruptSave(format!(
                    "object {} not below next id {next_id}",
                    object.id
                )));
            }
            if objects.insert(object.id, object).is_some() {
                return Err(GameError::CorruptSave("duplicate object id".to_string()));
            }
        }
        Ok(Self { objects, next_id })
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut objects = ObjectManager::new();
        let a = objects.insert(GameObject::new(ItemId::Trike, HouseId::Atreides));
        assert!(objects.remove(a).is_some());
        let b = objects.insert(GameObject::new(ItemId::Trike, HouseId::Atreides));
        assert_ne!(a, b);
        assert!(objects.get(a).is_none());
    }

    #[test]
    fn test_structure_footprint() {
        let mut object = GameObject::new(ItemId::Refinery, HouseId::Ordos);
        assert!(object.footprint().is_empty());
        object.set_location(Coord::new(4, 5));
        let footprint = object.footprint();
        assert_eq!(footprint.len(), 6);
        assert!(footprint.contains(&Coord::new(6, 6)));
        assert_eq!(object.real_position().round(), Coord::new(4 * 64 + 96, 5 * 64 + 64));
    }

    #[test]
    fn test_closest_point_on_structure() {
        let mut silo = GameObject::new(ItemId::Silo, HouseId::Ordos);
        silo.set_location(Coord::new(1, 1));
        assert_eq!(silo.closest_point(Coord::new(0, 0)), Coord::new(64, 64));
        assert_eq!(silo.closest_point(Coord::new(100, 100)), Coord::new(100, 100));
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut trike = GameObject::new(ItemId::Trike, HouseId::Harkonnen);
        assert!(!trike.apply_damage(Fixed::from_num(50)));
        assert!(trike.apply_damage(Fixed::from_num(500)));
        assert_eq!(trike.health(), Fixed::ZERO);
    }

    #[test]
    fn test_registry_save_load() {
        let mut objects = ObjectManager::new();
        let mut tank = GameObject::new(ItemId::Tank, HouseId::Harkonnen);
        tank.set_location(Coord::new(3, 3));
        tank.set_angle(5);
        objects.insert(tank);
        let mut soldier = GameObject::new(ItemId::Soldier, HouseId::Atreides);
        soldier.set_tile_position(Some(2));
        objects.insert(soldier);

        let mut out = OutputStream::new();
        objects.save(&mut out);
        let bytes = out.into_bytes();
        let restored = ObjectManager::load(&mut InputStream::new(&bytes)).unwrap();
        assert_eq!(restored, objects);
    }
}
