//! Houses: the per-faction economy and bookkeeping.
//!
//! A [`House`] never holds objects. Its per-item counters mirror the object
//! registry and are rebuilt from it when a game is loaded, so only the
//! economy, statistics and players are persisted.

use serde::{Deserialize, Serialize};

use crate::choam::Choam;
use crate::data::{HouseId, ItemId, DEFAULT_MAX_UNITS, NUM_ITEM_IDS, POWER_BILLING_INTERVAL};
use crate::error::{GameError, Result};
use crate::math::{lround, Coord, Fixed};
use crate::objects::{GameObject, ObjectId};
use crate::random::GameRng;
use crate::simulation::{GameEvent, GameOutcome, Simulation};
use crate::stream::{InputStream, OutputStream};

/// Who controls a player slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    /// A human at a keyboard.
    Human,
    /// A computer player of the named class.
    Ai(String),
}

/// A controller of a house. Several players may share one house.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Display name.
    pub name: String,
    /// Controller kind.
    pub kind: PlayerKind,
}

/// Last damage a house's object took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageNote {
    /// Object that was hit.
    pub object: ObjectId,
    /// Tile it was standing on.
    pub location: Coord,
    /// Damage taken.
    pub damage: i32,
    /// Shooter, if known.
    pub damager: Option<ObjectId>,
}

/// End-of-game statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HouseStats {
    /// Price of all units built.
    pub unit_built_value: i32,
    /// Price of all structures built.
    pub structure_built_value: i32,
    /// Price of enemy objects killed.
    pub kill_value: i32,
    /// Price of own objects lost.
    pub loss_value: i32,
    /// Units built.
    pub num_built_units: i32,
    /// Structures built.
    pub num_built_structures: i32,
    /// Score for destroyed enemy objects.
    pub destroyed_value: i32,
    /// Enemy units destroyed.
    pub num_destroyed_units: i32,
    /// Enemy structures destroyed.
    pub num_destroyed_structures: i32,
    /// Spice refined into credits.
    pub harvested_spice: Fixed,
}

/// One faction's economy and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct House {
    id: HouseId,
    team: u8,
    ai: bool,
    players: Vec<Player>,

    // Mirrors of the object registry; rebuilt on load.
    num_structures: i32,
    num_units: i32,
    num_item: [i32; NUM_ITEM_IDS],
    capacity: i32,
    produced_power: i32,
    power_requirement: i32,
    military_value: i32,

    num_item_built: [i32; NUM_ITEM_IDS],
    num_item_kills: [i32; NUM_ITEM_IDS],
    num_item_losses: [i32; NUM_ITEM_IDS],
    num_item_damage_inflicted: [i32; NUM_ITEM_IDS],

    stored_credits: Fixed,
    starting_credits: Fixed,
    old_credits: i32,

    max_units: i32,
    quota: i32,
    choam: Choam,
    power_usage_timer: i32,
    stats: HouseStats,
    last_damage: Option<DamageNote>,
    defeated: bool,
}

impl House {
    /// A house with `credits` starting credits.
    #[must_use]
    pub fn new(id: HouseId, credits: i32, max_units: i32, team: u8, quota: i32) -> Self {
        Self {
            id,
            team,
            ai: true,
            players: Vec::new(),
            num_structures: 0,
            num_units: 0,
            num_item: [0; NUM_ITEM_IDS],
            capacity: 0,
            produced_power: 0,
            power_requirement: 0,
            military_value: 0,
            num_item_built: [0; NUM_ITEM_IDS],
            num_item_kills: [0; NUM_ITEM_IDS],
            num_item_losses: [0; NUM_ITEM_IDS],
            num_item_damage_inflicted: [0; NUM_ITEM_IDS],
            stored_credits: Fixed::ZERO,
            starting_credits: Fixed::from_num(credits),
            old_credits: credits,
            max_units,
            quota,
            choam: Choam::new(),
            power_usage_timer: 0,
            stats: HouseStats::default(),
            last_damage: None,
            defeated: false,
        }
    }

    /// House id.
    #[must_use]
    pub const fn id(&self) -> HouseId {
        self.id
    }

    /// Team number; houses on the same non-zero team are allies.
    #[must_use]
    pub const fn team(&self) -> u8 {
        self.team
    }

    /// Whether no human controls this house.
    #[must_use]
    pub const fn is_ai(&self) -> bool {
        self.ai
    }

    /// Attach a controller. A human controller makes the house non-AI.
    pub fn add_player(&mut self, player: Player) {
        if player.kind == PlayerKind::Human {
            self.ai = false;
        }
        self.players.push(player);
    }

    /// Controllers of this house.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Whether the house is still in the game.
    ///
    /// Team 0 houses are never eliminated. Otherwise a house dies once it
    /// has no structures besides walls and no units besides carryalls,
    /// harvesters, frigates and sandworms.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let structures = self.num_structures - self.count(ItemId::Wall);
        let units = self.num_units
            - self.count(ItemId::Carryall)
            - self.count(ItemId::Harvester)
            - self.count(ItemId::Frigate)
            - self.count(ItemId::Sandworm);
        self.team == 0 || !(structures <= 0 && units <= 0)
    }

    /// Whether the house has been defeated.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.defeated
    }

    fn count(&self, item: ItemId) -> i32 {
        self.num_item[item.index()]
    }

    /// Owns at least one carryall.
    #[must_use]
    pub fn has_carryalls(&self) -> bool {
        self.count(ItemId::Carryall) > 0
    }

    /// Owns a barracks.
    #[must_use]
    pub fn has_barracks(&self) -> bool {
        self.count(ItemId::Barracks) > 0
    }

    /// Owns an IX research centre.
    #[must_use]
    pub fn has_ix(&self) -> bool {
        self.count(ItemId::IX) > 0
    }

    /// Owns a light factory.
    #[must_use]
    pub fn has_light_factory(&self) -> bool {
        self.count(ItemId::LightFactory) > 0
    }

    /// Owns a heavy factory.
    #[must_use]
    pub fn has_heavy_factory(&self) -> bool {
        self.count(ItemId::HeavyFactory) > 0
    }

    /// Owns a refinery.
    #[must_use]
    pub fn has_refinery(&self) -> bool {
        self.count(ItemId::Refinery) > 0
    }

    /// Owns a repair yard.
    #[must_use]
    pub fn has_repair_yard(&self) -> bool {
        self.count(ItemId::RepairYard) > 0
    }

    /// Owns a star port.
    #[must_use]
    pub fn has_star_port(&self) -> bool {
        self.count(ItemId::StarPort) > 0
    }

    /// Owns a wind trap.
    #[must_use]
    pub fn has_wind_trap(&self) -> bool {
        self.count(ItemId::WindTrap) > 0
    }

    /// Owns a sandworm.
    #[must_use]
    pub fn has_sandworm(&self) -> bool {
        self.count(ItemId::Sandworm) > 0
    }

    /// Owns a radar outpost.
    #[must_use]
    pub fn has_radar(&self) -> bool {
        self.count(ItemId::Radar) > 0
    }

    /// Radar outpost present and powered.
    #[must_use]
    pub fn has_radar_on(&self) -> bool {
        self.has_radar() && self.has_power()
    }

    /// Produced power covers the requirement.
    #[must_use]
    pub const fn has_power(&self) -> bool {
        self.produced_power >= self.power_requirement
    }

    /// Structures owned.
    #[must_use]
    pub const fn num_structures(&self) -> i32 {
        self.num_structures
    }

    /// Units owned.
    #[must_use]
    pub const fn num_units(&self) -> i32 {
        self.num_units
    }

    /// Objects of one type owned.
    #[must_use]
    pub fn num_items(&self, item: ItemId) -> i32 {
        if item.is_structure() || item.is_unit() {
            self.count(item)
        } else {
            0
        }
    }

    /// Spice storage capacity.
    #[must_use]
    pub const fn capacity(&self) -> i32 {
        self.capacity
    }

    /// Power produced by wind traps.
    #[must_use]
    pub const fn produced_power(&self) -> i32 {
        self.produced_power
    }

    /// Power drawn by structures.
    #[must_use]
    pub const fn power_requirement(&self) -> i32 {
        self.power_requirement
    }

    /// Price of the armed units currently owned.
    #[must_use]
    pub const fn military_value(&self) -> i32 {
        self.military_value
    }

    /// Statistics.
    #[must_use]
    pub const fn stats(&self) -> &HouseStats {
        &self.stats
    }

    /// Units and structures of one type built.
    #[must_use]
    pub fn num_built_items(&self, item: ItemId) -> i32 {
        self.num_item_built[item.index()]
    }

    /// Enemy objects of one type killed.
    #[must_use]
    pub fn num_killed_items(&self, item: ItemId) -> i32 {
        self.num_item_kills[item.index()]
    }

    /// Own objects of one type lost.
    #[must_use]
    pub fn num_lost_items(&self, item: ItemId) -> i32 {
        self.num_item_losses[item.index()]
    }

    /// Damage dealt by objects of one type.
    #[must_use]
    pub fn num_item_damage_inflicted(&self, item: ItemId) -> i32 {
        self.num_item_damage_inflicted[item.index()]
    }

    /// Credits needed to win, 0 for none.
    #[must_use]
    pub const fn quota(&self) -> i32 {
        self.quota
    }

    /// Unit cap.
    #[must_use]
    pub const fn max_units(&self) -> i32 {
        self.max_units
    }

    /// Ground unit cap reached; infantry counts a third, rounded up.
    #[must_use]
    pub fn is_ground_unit_limit_reached(&self) -> bool {
        let soldiers = self.count(ItemId::Soldier);
        let troopers = self.count(ItemId::Trooper);
        self.num_non_infantry_ground_units() + (soldiers + 2) / 3 + (troopers + 2) / 3
            >= self.max_units
    }

    /// Infantry cap reached; infantry counts a third, rounded down.
    #[must_use]
    pub fn is_infantry_unit_limit_reached(&self) -> bool {
        let soldiers = self.count(ItemId::Soldier);
        let troopers = self.count(ItemId::Trooper);
        self.num_non_infantry_ground_units() + soldiers / 3 + troopers / 3 >= self.max_units
    }

    /// Air unit cap reached.
    #[must_use]
    pub fn is_air_unit_limit_reached(&self) -> bool {
        self.count(ItemId::Carryall) + self.count(ItemId::Ornithopter)
            >= 11 * self.max_units.max(DEFAULT_MAX_UNITS) / 25
    }

    fn num_non_infantry_ground_units(&self) -> i32 {
        self.num_units
            - self.count(ItemId::Soldier)
            - self.count(ItemId::Trooper)
            - self.count(ItemId::Carryall)
            - self.count(ItemId::Ornithopter)
    }

    /// Star port ledger.
    #[must_use]
    pub const fn choam(&self) -> &Choam {
        &self.choam
    }

    /// Mutable star port ledger.
    pub fn choam_mut(&mut self) -> &mut Choam {
        &mut self.choam
    }

    /// Credits left from the scenario start.
    #[must_use]
    pub const fn starting_credits(&self) -> Fixed {
        self.starting_credits
    }

    /// Credits stored in refineries and silos.
    #[must_use]
    pub const fn stored_credits(&self) -> Fixed {
        self.stored_credits
    }

    /// Total credits, rounded.
    #[must_use]
    pub fn credits(&self) -> i32 {
        lround(self.stored_credits + self.starting_credits)
    }

    /// Add credits to storage. Refined credits count as harvested spice.
    pub fn add_credits(&mut self, amount: Fixed, was_refined: bool) {
        if amount <= Fixed::ZERO {
            return;
        }
        if was_refined {
            self.stats.harvested_spice += amount;
        }
        self.stored_credits += amount;
    }

    /// Give back credits taken earlier.
    ///
    /// Storage is refilled up to capacity; the rest goes to the starting
    /// credits so nothing is lost.
    pub fn return_credits(&mut self, amount: Fixed) {
        if amount <= Fixed::ZERO {
            return;
        }
        let left_capacity = (Fixed::from_num(self.capacity) - self.stored_credits).max(Fixed::ZERO);
        if amount <= left_capacity {
            self.add_credits(amount, false);
        } else {
            self.add_credits(left_capacity, false);
            self.starting_credits += amount - left_capacity;
        }
    }

    /// Take up to `amount` credits, stored credits first.
    ///
    /// Returns what was actually taken, which is less than `amount` when
    /// the house cannot pay in full.
    pub fn take_credits(&mut self, amount: Fixed) -> Fixed {
        if self.credits() < 1 {
            return Fixed::ZERO;
        }
        if self.stored_credits > amount {
            self.stored_credits -= amount;
            amount
        } else if self.stored_credits + self.starting_credits > amount {
            self.starting_credits = self.stored_credits + self.starting_credits - amount;
            self.stored_credits = Fixed::ZERO;
            amount
        } else {
            let taken = self.stored_credits + self.starting_credits;
            self.stored_credits = Fixed::ZERO;
            self.starting_credits = Fixed::ZERO;
            taken
        }
    }

    /// Account for a new unit.
    pub fn increment_units(&mut self, item: ItemId) {
        self.num_item[item.index()] += 1;
        self.num_units += 1;
        if item.data().weapon_damage > 0 {
            self.military_value += item.data().price;
        }
    }

    /// Account for a lost unit.
    pub fn decrement_units(&mut self, item: ItemId) {
        self.num_item[item.index()] -= 1;
        self.num_units -= 1;
        if item.data().weapon_damage > 0 {
            self.military_value -= item.data().price;
        }
    }

    /// Account for a new structure's power and storage.
    pub fn increment_structures(&mut self, item: ItemId) {
        self.num_item[item.index()] += 1;
        self.num_structures += 1;
        self.apply_structure(item, 1);
    }

    /// Account for a lost structure.
    pub fn decrement_structures(&mut self, item: ItemId) {
        self.num_item[item.index()] -= 1;
        self.num_structures -= 1;
        self.apply_structure(item, -1);
    }

    fn apply_structure(&mut self, item: ItemId, sign: i32) {
        let data = item.data();
        if data.power >= 0 {
            self.power_requirement += sign * data.power;
        } else {
            self.produced_power -= sign * data.power;
        }
        self.capacity += sign * data.capacity;
    }

    /// Per-cycle economy.
    ///
    /// Returns `true` when stored spice above capacity was lost this cycle.
    pub fn update(&mut self, cycle: u32, rng: &mut GameRng) -> bool {
        let capacity = Fixed::from_num(self.capacity);
        let spice_lost = self.stored_credits > capacity;
        if spice_lost {
            self.stored_credits = (self.stored_credits - Fixed::ONE).max(capacity);
        }

        self.old_credits = self.credits();

        self.power_usage_timer -= 1;
        if self.power_usage_timer <= 0 {
            self.power_usage_timer = POWER_BILLING_INTERVAL;
            self.take_credits(Fixed::from_num(self.power_requirement) / 32);
        }

        self.choam.update(cycle, rng);
        spice_lost
    }

    /// Credits at the end of the previous update.
    #[must_use]
    pub const fn old_credits(&self) -> i32 {
        self.old_credits
    }

    /// Remember where this house was last hit.
    pub fn note_damage_location(&mut self, note: DamageNote) {
        self.last_damage = Some(note);
    }

    /// Where this house was last hit.
    #[must_use]
    pub const fn last_damage(&self) -> Option<DamageNote> {
        self.last_damage
    }

    /// Count a newly built object.
    pub fn inform_was_built(&mut self, item: ItemId) {
        let price = item.data().price;
        if item.is_structure() {
            self.stats.structure_built_value += price;
            self.stats.num_built_structures += 1;
        } else {
            self.stats.unit_built_value += price;
            self.stats.num_built_units += 1;
        }
        self.num_item_built[item.index()] += 1;
    }

    /// Count an enemy object destroyed by this house.
    pub fn inform_has_killed(&mut self, item: ItemId) {
        let price = item.data().price;
        self.stats.destroyed_value += (price / 100).max(1);
        self.stats.kill_value += price;
        if item.is_structure() {
            self.stats.num_destroyed_structures += 1;
        } else {
            self.stats.num_destroyed_units += 1;
        }
        self.num_item_kills[item.index()] += 1;
    }

    /// Count damage dealt by an object of type `item`.
    pub fn inform_has_damaged(&mut self, item: ItemId, damage: i32) {
        self.num_item_damage_inflicted[item.index()] += damage;
    }

    /// Count an own object destroyed.
    pub fn inform_has_lost(&mut self, item: ItemId) {
        self.stats.loss_value += item.data().price;
        self.num_item_losses[item.index()] += 1;
    }

    /// Add harvested spice to the statistics.
    pub fn add_harvested_spice(&mut self, amount: Fixed) {
        self.stats.harvested_spice += amount;
    }

    pub(crate) fn set_defeated(&mut self) {
        self.defeated = true;
    }

    /// Write the house. Object counters are not written.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.id as u32);
        stream.write_u8(self.team);
        stream.write_bools(&[self.ai, self.defeated, self.last_damage.is_some()]);

        for counters in [
            &self.num_item_built,
            &self.num_item_kills,
            &self.num_item_losses,
            &self.num_item_damage_inflicted,
        ] {
            for &value in counters {
                stream.write_i32(value);
            }
        }

        stream.write_fixed(self.stored_credits);
        stream.write_fixed(self.starting_credits);
        stream.write_i32(self.old_credits);
        stream.write_i32(self.max_units);
        stream.write_i32(self.quota);
        self.choam.save(stream);
        stream.write_i32(self.power_usage_timer);

        let stats = &self.stats;
        for value in [
            stats.unit_built_value,
            stats.structure_built_value,
            stats.kill_value,
            stats.loss_value,
            stats.num_built_units,
            stats.num_built_structures,
            stats.destroyed_value,
            stats.num_destroyed_units,
            stats.num_destroyed_structures,
        ] {
            stream.write_i32(value);
        }
        stream.write_fixed(stats.harvested_spice);

        if let Some(note) = self.last_damage {
            stream.write_u32(note.object.raw());
            stream.write_i32(note.location.x);
            stream.write_i32(note.location.y);
            stream.write_i32(note.damage);
            stream.write_u32(ObjectId::to_raw(note.damager));
        }

        stream.write_u32(self.players.len() as u32);
        for player in &self.players {
            stream.write_string(&player.name);
            match &player.kind {
                PlayerKind::Human => stream.write_u8(0),
                PlayerKind::Ai(class) => {
                    stream.write_u8(1);
                    stream.write_string(class);
                }
            }
        }
    }

    /// Read a house written by [`House::save`].
    ///
    /// Object counters start at zero and are rebuilt by the caller.
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let id = HouseId::from_u32(stream.read_u32()?)?;
        let team = stream.read_u8()?;
        let [ai, defeated, has_last_damage] = stream.read_bools::<3>()?;

        let mut house = Self::new(id, 0, 0, team, 0);
        house.ai = ai;
        house.defeated = defeated;

        for counters in [
            &mut house.num_item_built,
            &mut house.num_item_kills,
            &mut house.num_item_losses,
            &mut house.num_item_damage_inflicted,
        ] {
            for value in counters.iter_mut() {
                *value = stream.read_i32()?;
            }
        }

        house.stored_credits = stream.read_fixed()?;
        house.starting_credits = stream.read_fixed()?;
        house.old_credits = stream.read_i32()?;
        house.max_units = stream.read_i32()?;
        house.quota = stream.read_i32()?;
        house.choam = Choam::load(stream)?;
        house.power_usage_timer = stream.read_i32()?;

        let stats = &mut house.stats;
        for value in [
            &mut stats.unit_built_value,
            &mut stats.structure_built_value,
            &mut stats.kill_value,
            &mut stats.loss_value,
            &mut stats.num_built_units,
            &mut stats.num_built_structures,
            &mut stats.destroyed_value,
            &mut stats.num_destroyed_units,
            &mut stats.num_destroyed_structures,
        ] {
            *value = stream.read_i32()?;
        }
        stats.harvested_spice = stream.read_fixed()?;

        if has_last_damage {
            let object = ObjectId::from_raw(stream.read_u32()?)
                .ok_or_else(|| GameError::CorruptSave("damage note without object".to_string()))?;
            let location = Coord::new(stream.read_i32()?, stream.read_i32()?);
            let damage = stream.read_i32()?;
            let damager = ObjectId::from_raw(stream.read_u32()?);
            house.last_damage = Some(DamageNote {
                object,
                location,
                damage,
                damager,
            });
        }

        let num_players = stream.read_count(5)?;
        for _ in 0..num_players {
            let name = stream.read_string()?;
            let kind = match stream.read_u8()? {
                0 => PlayerKind::Human,
                1 => PlayerKind::Ai(stream.read_string()?),
                other => {
                    return Err(GameError::CorruptSave(format!("invalid player kind {other}")))
                }
            };
            house.players.push(Player { name, kind });
        }

        Ok(house)
    }
}

impl Simulation {
    /// The house with `id`, created with default settings if absent.
    ///
    /// New houses get no credits, the map's default unit cap and a team
    /// derived from the game type.
    pub fn get_or_create_house(&mut self, id: HouseId) -> &mut House {
        let max_units = self
            .options
            .max_units_override
            .unwrap_or_else(|| crate::map::default_max_units(&self.map));
        let team = self.options.game_type.unbound_house_team();
        if self.houses[id.index()].is_none() && self.options.start_explored {
            self.explore_all(id);
        }
        self.houses[id.index()].get_or_insert_with(|| House::new(id, 0, max_units, team, 0))
    }

    /// Create a unit in the registry without placing it on the map.
    ///
    /// Scenario-created units do not count as built.
    pub fn create_unit(&mut self, house: HouseId, item: ItemId, by_scenario: bool) -> Result<ObjectId> {
        let item = item.resolve_special(house);
        if !item.is_unit() {
            return Err(GameError::InvalidItemId(item as u32));
        }
        let owner = self.get_or_create_house(house);
        owner.increment_units(item);
        if !by_scenario {
            owner.inform_was_built(item);
        }
        Ok(self.objects.insert(GameObject::new(item, house)))
    }

    /// Put an existing, undeployed unit onto `location`.
    ///
    /// Returns `false` and leaves the unit off the map if the tile cannot
    /// take it.
    pub fn deploy_unit(&mut self, id: ObjectId, location: Coord) -> bool {
        let Some(object) = self.objects.get(id) else {
            return false;
        };
        let (item, owner, slot) = (object.item(), object.owner(), object.tile_position());
        if object.location().is_some() || !self.map.can_pass(item, location) {
            return false;
        }
        let Some(tile) = self.map.tile_at_mut(location) else {
            return false;
        };

        let slot = if item.is_infantry() {
            match tile.assign_infantry(id, slot, &self.objects) {
                Some(slot) => Some(slot),
                None => return false,
            }
        } else {
            if item.is_air_unit() {
                tile.assign_air_unit(id);
            } else if item.is_underground_unit() {
                tile.assign_underground_unit(id);
            } else {
                tile.assign_non_infantry_ground_object(id);
            }
            None
        };

        if let Some(object) = self.objects.get_mut(id) {
            object.set_location(location);
            object.set_tile_position(slot);
        }
        self.events.push(GameEvent::Deployed {
            id,
            item,
            house: owner,
            location,
        });
        self.view_map_for_team(owner, location, item.data().view_range);
        true
    }

    /// Create a unit and deploy it on exactly `(x, y)`.
    ///
    /// Returns `Ok(None)` and discards the unit if the tile cannot take it.
    pub fn place_unit(&mut self, house: HouseId, item: ItemId, x: i32, y: i32) -> Result<Option<ObjectId>> {
        let id = self.create_unit(house, item, true)?;
        if self.deploy_unit(id, Coord::new(x, y)) {
            Ok(Some(id))
        } else {
            self.remove_object(id);
            Ok(None)
        }
    }

    /// Create units for `house` and deploy each near `origin`.
    ///
    /// Units that find no free spot are discarded. Returns the deployed ids.
    pub fn deliver_units(&mut self, house: HouseId, items: &[ItemId], origin: Coord) -> Vec<ObjectId> {
        let mut delivered = Vec::new();
        for &item in items {
            let id = match self.create_unit(house, item, true) {
                Ok(id) => id,
                Err(error) => {
                    tracing::warn!(%error, "Cannot deliver unit");
                    continue;
                }
            };
            let item = self.objects.get(id).map_or(item, GameObject::item);
            let spot = self.map.find_deploy_spot(item, origin, &mut self.rng);
            match spot {
                Some(spot) if self.deploy_unit(id, spot) => delivered.push(id),
                _ => {
                    tracing::warn!(house = house.name(), ?item, "No deploy spot for unit");
                    self.remove_object(id);
                }
            }
        }
        delivered
    }

    /// Place a structure with its top-left tile at `(x, y)`.
    ///
    /// Concrete slabs convert terrain and return `Ok(None)`. Other
    /// structures need every footprint tile on the map and free of ground
    /// objects, and unless `force` is set, on buildable rock. A structure
    /// with a `builder` counts as built; a built refinery comes with a
    /// free harvester.
    pub fn place_structure(
        &mut self,
        house: HouseId,
        builder: Option<ObjectId>,
        item: ItemId,
        x: i32,
        y: i32,
        force: bool,
    ) -> Result<Option<ObjectId>> {
        if !item.is_structure() {
            return Err(GameError::InvalidItemId(item as u32));
        }
        self.get_or_create_house(house);
        let origin = Coord::new(x, y);

        match item {
            ItemId::Slab1 => {
                if self.map.tile_exists(x, y) {
                    self.lay_slab(house, origin);
                }
                return Ok(None);
            }
            ItemId::Slab4 => {
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let spot = Coord::new(x + dx, y + dy);
                    let buildable = self.map.tile_at(spot).is_some_and(|tile| {
                        tile.is_rock() && !tile.is_mountain() && !tile.has_ground_object()
                    });
                    if buildable {
                        self.lay_slab(house, spot);
                    }
                }
                return Ok(None);
            }
            _ => {}
        }

        let mut object = GameObject::new(item, house);
        object.set_location(origin);
        let footprint = object.footprint();
        let fits = footprint.iter().all(|spot| {
            self.map.tile_at(*spot).is_some_and(|tile| {
                !tile.has_ground_object() && (force || (tile.is_rock() && !tile.is_mountain()))
            })
        });
        if !fits {
            return Ok(None);
        }

        let id = self.objects.insert(object);
        for spot in &footprint {
            if let Some(tile) = self.map.tile_at_mut(*spot) {
                tile.assign_non_infantry_ground_object(id);
                tile.set_owner(Some(house));
                tile.set_destroyed_structure_tile(None);
            }
        }

        let owner = self.get_or_create_house(house);
        owner.increment_structures(item);
        if builder.is_some() {
            owner.inform_was_built(item);
        }

        self.events.push(GameEvent::Deployed {
            id,
            item,
            house,
            location: origin,
        });
        let (width, height) = item.data().size;
        let center = Coord::new(x + width / 2, y + height / 2);
        self.view_map_for_team(house, center, item.data().view_range);

        if item == ItemId::Refinery && builder.is_some() {
            self.deliver_units(house, &[ItemId::Harvester], origin);
        }
        Ok(Some(id))
    }

    fn lay_slab(&mut self, house: HouseId, location: Coord) {
        self.set_terrain_type(location, crate::tile::TerrainType::Slab);
        if let Some(tile) = self.map.tile_at_mut(location) {
            tile.set_owner(Some(house));
        }
        self.view_map_for_team(house, location, 1);
    }

    /// Mark `house` as defeated and end the game if one team is left.
    ///
    /// Calling this again for a defeated house does nothing.
    pub fn lose_house(&mut self, id: HouseId) {
        let Some(house) = self.house_mut(id) else {
            return;
        };
        if house.is_defeated() {
            return;
        }
        house.set_defeated();
        tracing::info!(house = id.name(), cycle = self.cycle, "House defeated");
        self.events.push(GameEvent::HouseDefeated { house: id });

        let mut teams: Vec<(u8, HouseId)> = self
            .houses()
            .filter(|house| !house.is_defeated() && house.is_alive())
            .map(|house| (house.team(), house.id()))
            .collect();
        teams.sort_unstable();
        teams.dedup_by_key(|(team, _)| *team);
        match teams.as_slice() {
            [(_, winner)] => self.win_house(*winner),
            [] => self.finish(GameOutcome::Draw),
            _ => {}
        }
    }

    /// Declare `house`'s team the winner. Only the first outcome counts.
    pub fn win_house(&mut self, id: HouseId) {
        let Some(team) = self.house(id).map(House::team) else {
            return;
        };
        self.finish(GameOutcome::Victory { team, house: id });
    }
}
