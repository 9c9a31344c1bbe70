//! Scheduled scenario events: reinforcements and the mission timeout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::math::Coord;
use crate::simulation::{GameOutcome, Simulation};
use crate::stream::{InputStream, OutputStream};

/// Where reinforcements arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropLocation {
    /// Random tile on the top edge.
    North,
    /// Random tile on the right edge.
    East,
    /// Random tile on the bottom edge.
    South,
    /// Random tile on the left edge.
    West,
    /// Anywhere on the map.
    Air,
    /// Where the player is looking.
    Visible,
    /// Near an enemy base.
    Enemybase,
    /// Near the house's own base.
    Homebase,
}

impl DropLocation {
    fn from_u8(id: u8) -> Result<Self> {
        Ok(match id {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            3 => Self::West,
            4 => Self::Air,
            5 => Self::Visible,
            6 => Self::Enemybase,
            7 => Self::Homebase,
            other => return Err(GameError::CorruptSave(format!("invalid drop location {other}"))),
        })
    }
}

/// A batch of units delivered to a house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reinforcement {
    /// Receiving house.
    pub house: HouseId,
    /// Units in the batch.
    pub units: Vec<ItemId>,
    /// Arrival zone.
    pub drop_location: DropLocation,
    /// Whether the batch comes again after `interval` cycles.
    pub repeat: bool,
    /// Cycles between repeats.
    pub interval: u32,
}

/// Something that happens at a given cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Units arrive.
    Reinforcement(Reinforcement),
    /// The mission time is up.
    Timeout,
}

const KIND_REINFORCEMENT: u8 = 0;
const KIND_TIMEOUT: u8 = 1;

/// Pending triggers ordered by cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerManager {
    queue: BTreeMap<u32, Vec<Trigger>>,
}

impl TriggerManager {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `trigger` for `cycle`.
    pub fn add_trigger(&mut self, cycle: u32, trigger: Trigger) {
        self.queue.entry(cycle).or_default().push(trigger);
    }

    /// Schedule one reinforcement unit.
    ///
    /// Requests for the same cycle, house, drop location and repeat flag
    /// are merged into one delivery. Repeating deliveries come back every
    /// `cycle` cycles.
    pub fn add_reinforcement(
        &mut self,
        house: HouseId,
        item: ItemId,
        drop_location: DropLocation,
        cycle: u32,
        repeat: bool,
    ) {
        let pending = self.queue.entry(cycle).or_default();
        let existing = pending.iter_mut().find_map(|trigger| match trigger {
            Trigger::Reinforcement(reinforcement)
                if reinforcement.house == house
                    && reinforcement.repeat == repeat
                    && reinforcement.drop_location == drop_location =>
            {
                Some(reinforcement)
            }
            _ => None,
        });
        match existing {
            Some(reinforcement) => reinforcement.units.push(item),
            None => pending.push(Trigger::Reinforcement(Reinforcement {
                house,
                units: vec![item],
                drop_location,
                repeat,
                interval: cycle,
            })),
        }
    }

    /// Remove and return the triggers due at `cycle`.
    ///
    /// Triggers scheduled for earlier cycles were missed and are dropped.
    pub fn fire(&mut self, cycle: u32) -> Vec<Trigger> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let scheduled = *entry.key();
            if scheduled > cycle {
                break;
            }
            let triggers = entry.remove();
            if scheduled == cycle {
                due = triggers;
            } else {
                tracing::trace!(scheduled, cycle, dropped = triggers.len(), "Dropped late triggers");
            }
        }
        due
    }

    /// Forget every reinforcement for `house`.
    pub fn remove_house_triggers(&mut self, house: HouseId) {
        for pending in self.queue.values_mut() {
            pending.retain(|trigger| !matches!(trigger, Trigger::Reinforcement(r) if r.house == house));
        }
        self.queue.retain(|_, pending| !pending.is_empty());
    }

    /// Forget every trigger.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Number of pending triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pending triggers in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Trigger)> + '_ {
        self.queue
            .iter()
            .flat_map(|(cycle, pending)| pending.iter().map(move |trigger| (*cycle, trigger)))
    }

    /// Write the queue.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.len() as u32);
        for (cycle, trigger) in self.iter() {
            stream.write_u32(cycle);
            match trigger {
                Trigger::Reinforcement(reinforcement) => {
                    stream.write_u8(KIND_REINFORCEMENT);
                    stream.write_u32(reinforcement.house as u32);
                    stream.write_u8(reinforcement.drop_location as u8);
                    stream.write_bool(reinforcement.repeat);
                    stream.write_u32(reinforcement.interval);
                    let units: Vec<u32> = reinforcement.units.iter().map(|item| *item as u32).collect();
                    stream.write_u32_vec(&units);
                }
                Trigger::Timeout => stream.write_u8(KIND_TIMEOUT),
            }
        }
    }

    /// Read a queue written by [`TriggerManager::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let count = stream.read_count(5)?;
        let mut manager = Self::new();
        for _ in 0..count {
            let cycle = stream.read_u32()?;
            let trigger = match stream.read_u8()? {
                KIND_REINFORCEMENT => {
                    let house = HouseId::from_u32(stream.read_u32()?)?;
                    let drop_location = DropLocation::from_u8(stream.read_u8()?)?;
                    let repeat = stream.read_bool()?;
                    let interval = stream.read_u32()?;
                    let units = stream
                        .read_u32_vec()?
                        .into_iter()
                        .map(ItemId::from_u32)
                        .collect::<Result<Vec<_>>>()?;
                    Trigger::Reinforcement(Reinforcement {
                        house,
                        units,
                        drop_location,
                        repeat,
                        interval,
                    })
                }
                KIND_TIMEOUT => Trigger::Timeout,
                other => return Err(GameError::InvalidTriggerKind(u32::from(other))),
            };
            manager.add_trigger(cycle, trigger);
        }
        Ok(manager)
    }
}

impl Simulation {
    /// Pending triggers.
    #[must_use]
    pub const fn triggers(&self) -> &TriggerManager {
        &self.triggers
    }

    /// Mutable pending triggers, for scenario setup.
    pub fn triggers_mut(&mut self) -> &mut TriggerManager {
        &mut self.triggers
    }

    pub(crate) fn run_triggers(&mut self) {
        for trigger in self.triggers.fire(self.cycle) {
            match trigger {
                Trigger::Reinforcement(reinforcement) => self.deliver_reinforcement(reinforcement),
                Trigger::Timeout => {
                    tracing::info!(cycle = self.cycle, "Mission time is up");
                    self.finish(GameOutcome::TimedOut);
                }
            }
        }
    }

    fn deliver_reinforcement(&mut self, reinforcement: Reinforcement) {
        if self.house(reinforcement.house).is_none() {
            tracing::warn!(house = reinforcement.house.name(), "Reinforcement for a house not in play");
            return;
        }
        let location = self.resolve_drop_location(reinforcement.house, reinforcement.drop_location);
        tracing::debug!(
            house = reinforcement.house.name(),
            units = reinforcement.units.len(),
            x = location.x,
            y = location.y,
            "Reinforcements arrived"
        );
        self.deliver_units(reinforcement.house, &reinforcement.units, location);

        if reinforcement.repeat && reinforcement.interval > 0 {
            let next = self.cycle + reinforcement.interval;
            self.triggers.add_trigger(next, Trigger::Reinforcement(reinforcement));
        }
    }

    /// Tile where a delivery for `house` lands.
    pub fn resolve_drop_location(&mut self, house: HouseId, drop_location: DropLocation) -> Coord {
        let (width, height) = (self.map.width(), self.map.height());
        match drop_location {
            DropLocation::North => Coord::new(self.rng.rand(0, width - 1), 0),
            DropLocation::South => Coord::new(self.rng.rand(0, width - 1), height - 1),
            DropLocation::West => Coord::new(0, self.rng.rand(0, height - 1)),
            DropLocation::East => Coord::new(width - 1, self.rng.rand(0, height - 1)),
            DropLocation::Air => Coord::new(self.rng.rand(0, width - 1), self.rng.rand(0, height - 1)),
            DropLocation::Visible => self.map.center(),
            DropLocation::Homebase => self.base_center(house).unwrap_or_else(|| self.map.center()),
            DropLocation::Enemybase => {
                let team = self.house(house).map_or(0, crate::house::House::team);
                let enemies: Vec<HouseId> = self
                    .houses()
                    .filter(|other| other.id() != house && (team == 0 || other.team() != team))
                    .map(crate::house::House::id)
                    .collect();
                enemies
                    .into_iter()
                    .find_map(|enemy| self.base_center(enemy))
                    .unwrap_or_else(|| self.map.center())
            }
        }
    }

    fn base_center(&self, house: HouseId) -> Option<Coord> {
        let (mut sum_x, mut sum_y, mut count) = (0i64, 0i64, 0i64);
        for object in self.objects.iter_sorted() {
            if object.owner() != house || !object.is_structure() {
                continue;
            }
            if let Some(location) = object.location() {
                sum_x += i64::from(location.x);
                sum_y += i64::from(location.y);
                count += 1;
            }
        }
        (count > 0).then(|| Coord::new((sum_x / count) as i32, (sum_y / count) as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameOptions;
    use crate::simulation::GameEvent;
    use crate::tile::TerrainType;

    #[test]
    fn test_identical_requests_merge() {
        let mut triggers = TriggerManager::new();
        triggers.add_reinforcement(HouseId::Atreides, ItemId::Trike, DropLocation::North, 100, false);
        triggers.add_reinforcement(HouseId::Atreides, ItemId::Trike, DropLocation::North, 100, false);
        assert_eq!(triggers.len(), 1);
        let (_, Trigger::Reinforcement(reinforcement)) = triggers.iter().next().unwrap() else {
            panic!("expected a reinforcement");
        };
        assert_eq!(reinforcement.units, vec![ItemId::Trike, ItemId::Trike]);

        triggers.add_reinforcement(HouseId::Atreides, ItemId::Quad, DropLocation::North, 100, true);
        triggers.add_reinforcement(HouseId::Atreides, ItemId::Quad, DropLocation::South, 100, false);
        triggers.add_reinforcement(HouseId::Ordos, ItemId::Quad, DropLocation::North, 100, false);
        triggers.add_reinforcement(HouseId::Atreides, ItemId::Quad, DropLocation::North, 101, false);
        assert_eq!(triggers.len(), 5);
    }

    #[test]
    fn test_fire_drops_late_triggers() {
        let mut triggers = TriggerManager::new();
        triggers.add_trigger(5, Trigger::Timeout);
        triggers.add_trigger(10, Trigger::Timeout);
        triggers.add_trigger(20, Trigger::Timeout);

        assert_eq!(triggers.fire(10).len(), 1);
        assert_eq!(triggers.len(), 1);
        assert!(triggers.fire(19).is_empty());
        assert_eq!(triggers.fire(20), vec![Trigger::Timeout]);
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_remove_house_triggers() {
        let mut triggers = TriggerManager::new();
        triggers.add_reinforcement(HouseId::Ordos, ItemId::Trike, DropLocation::Air, 3, false);
        triggers.add_reinforcement(HouseId::Atreides, ItemId::Trike, DropLocation::Air, 3, false);
        triggers.add_trigger(3, Trigger::Timeout);
        triggers.remove_house_triggers(HouseId::Ordos);
        assert_eq!(triggers.len(), 2);
        triggers.clear();
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let mut triggers = TriggerManager::new();
        triggers.add_reinforcement(HouseId::Fremen, ItemId::Trooper, DropLocation::Enemybase, 900, true);
        triggers.add_reinforcement(HouseId::Fremen, ItemId::Trooper, DropLocation::Enemybase, 900, true);
        triggers.add_trigger(5000, Trigger::Timeout);
        let mut out = OutputStream::new();
        triggers.save(&mut out);
        let bytes = out.into_bytes();
        assert_eq!(TriggerManager::load(&mut InputStream::new(&bytes)).unwrap(), triggers);
    }

    #[test]
    fn test_load_rejects_unknown_kind() {
        let mut out = OutputStream::new();
        out.write_u32(1);
        out.write_u32(7);
        out.write_u8(9);
        let bytes = out.into_bytes();
        assert_eq!(
            TriggerManager::load(&mut InputStream::new(&bytes)),
            Err(GameError::InvalidTriggerKind(9))
        );
    }

    #[test]
    fn test_repeating_reinforcement_rearms() {
        let mut sim = Simulation::new(16, 16, GameOptions::default(), 9).unwrap();
        sim.get_or_create_house(HouseId::Ordos);
        sim.triggers_mut()
            .add_reinforcement(HouseId::Ordos, ItemId::Quad, DropLocation::Visible, 3, true);

        for _ in 0..4 {
            sim.tick();
        }
        assert_eq!(sim.house(HouseId::Ordos).unwrap().num_items(ItemId::Quad), 1);
        assert_eq!(sim.triggers().iter().next().map(|(cycle, _)| cycle), Some(6));

        for _ in 0..3 {
            sim.tick();
        }
        assert_eq!(sim.house(HouseId::Ordos).unwrap().num_items(ItemId::Quad), 2);
    }

    #[test]
    fn test_timeout_ends_game() {
        let mut sim = Simulation::new(8, 8, GameOptions::default(), 1).unwrap();
        sim.triggers_mut().add_trigger(2, Trigger::Timeout);
        let events: Vec<GameEvent> = (0..5).flat_map(|_| sim.tick()).collect();
        assert_eq!(sim.outcome(), Some(GameOutcome::TimedOut));
        assert_eq!(sim.cycle(), 3);
        assert!(events.contains(&GameEvent::ScenarioEnded { outcome: GameOutcome::TimedOut }));
    }

    #[test]
    fn test_drop_locations() {
        let mut sim = Simulation::new(10, 6, GameOptions::default(), 4).unwrap();
        sim.get_or_create_house(HouseId::Atreides);
        let north = sim.resolve_drop_location(HouseId::Atreides, DropLocation::North);
        assert_eq!(north.y, 0);
        let east = sim.resolve_drop_location(HouseId::Atreides, DropLocation::East);
        assert_eq!(east.x, 9);
        assert_eq!(
            sim.resolve_drop_location(HouseId::Atreides, DropLocation::Homebase),
            sim.map.center()
        );

        for y in 0..4 {
            for x in 0..4 {
                sim.set_terrain_type(Coord::new(x, y), TerrainType::Rock);
            }
        }
        sim.place_structure(HouseId::Atreides, None, ItemId::Silo, 0, 0, false).unwrap();
        sim.place_structure(HouseId::Atreides, None, ItemId::Silo, 2, 2, false).unwrap();
        assert_eq!(
            sim.resolve_drop_location(HouseId::Atreides, DropLocation::Homebase),
            Coord::new(1, 1)
        );
    }
}
