//! Area damage, object destruction and saboteur attacks.

use crate::bullet::BulletType;
use crate::data::{HouseId, ItemId, DEAD_UNIT_TIME};
use crate::house::DamageNote;
use crate::map::world_distance;
use crate::math::{block_distance, lround, Coord, Fixed};
use crate::objects::{GameObject, ObjectId};
use crate::simulation::{ExplosionKind, GameEvent, Simulation};
use crate::tile::{DamageDecal, DeadUnit, DeadUnitKind, DecalKind};

/// Tiles searched around the impact point, in each direction.
const DAMAGE_SEARCH_RADIUS: i32 = 2;

/// Furthest a saboteur may stand from its target, in tiles.
const SABOTEUR_REACH: f64 = 1.5;

/// Who caused a hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageSource {
    /// Object that fired, if it still matters.
    pub shooter: Option<ObjectId>,
    /// House credited with the damage.
    pub owner: Option<HouseId>,
    /// Projectile that hit, `None` for direct damage.
    pub bullet: Option<BulletType>,
}

impl Simulation {
    /// Deal area damage around the world point `position`.
    ///
    /// Every object within `radius` world units takes
    /// `amount * (radius - d) / radius`, where `d` is measured to a
    /// structure's nearest footprint point. Air attacks only hit air units;
    /// ground attacks hit everything else and mark the ground.
    pub fn damage(&mut self, source: DamageSource, position: Coord, amount: Fixed, radius: i32, air: bool) {
        let center = position.world_to_tile();
        let mut targets = Vec::new();
        for y in center.y - DAMAGE_SEARCH_RADIUS..=center.y + DAMAGE_SEARCH_RADIUS {
            for x in center.x - DAMAGE_SEARCH_RADIUS..=center.x + DAMAGE_SEARCH_RADIUS {
                let Some(tile) = self.map.tile(x, y) else {
                    continue;
                };
                if air {
                    targets.extend_from_slice(tile.air_units());
                } else {
                    targets.extend_from_slice(tile.infantry());
                    targets.extend_from_slice(tile.non_infantry_ground_objects());
                    targets.extend_from_slice(tile.underground_units());
                }
            }
        }
        targets.sort_unstable();
        targets.dedup();

        if radius > 0 {
            let radius = Fixed::from_num(radius);
            for id in targets {
                let Some(object) = self.objects.get(id) else {
                    continue;
                };
                let distance = world_distance(object.closest_point(position), position);
                if distance >= radius {
                    continue;
                }
                let dealt = amount * (radius - distance) / radius;
                self.handle_damage(id, dealt, source);
            }
        }

        if !air {
            self.mark_ground(source, center, position);
        }
    }

    fn mark_ground(&mut self, source: DamageSource, location: Coord, position: Coord) {
        let Some(tile) = self.map.tile_at(location) else {
            return;
        };

        if tile.is_spice_bloom() {
            self.trigger_spice_bloom(location, source.owner);
            return;
        }
        if tile.is_special_bloom() {
            if let Some(owner) = source.owner {
                self.trigger_special_bloom(location, owner);
            }
            return;
        }
        if source.bullet == Some(BulletType::Sonic) {
            return;
        }

        let on_structure = tile
            .ground_object()
            .and_then(|id| self.objects.get(id))
            .is_some_and(GameObject::is_structure);
        let kind = if tile.is_rock() && !tile.is_mountain() && !on_structure {
            DecalKind::RockDamage
        } else if tile.terrain().keeps_tracks() {
            DecalKind::SandDamage
        } else {
            return;
        };
        let variant = match kind {
            DecalKind::RockDamage => self.rng.rand(0, 1),
            DecalKind::SandDamage => self.rng.rand(0, 3),
        };
        if let Some(tile) = self.map.tile_at_mut(location) {
            tile.add_damage(DamageDecal {
                kind,
                tile: variant,
                real_pos: position,
            });
        }
    }

    /// Apply `amount` damage to one object, updating statistics and
    /// destroying it when its health reaches zero.
    pub fn handle_damage(&mut self, id: ObjectId, amount: Fixed, source: DamageSource) {
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        let (item, victim, location) = (object.item(), object.owner(), object.location());
        let before = object.health();
        let killed = object.apply_damage(amount);
        let dealt = lround(before - object.health());

        if let (Some(location), Some(house)) = (location, self.house_mut(victim)) {
            house.note_damage_location(DamageNote {
                object: id,
                location,
                damage: dealt,
                damager: source.shooter,
            });
        }

        let shooter_item = source
            .shooter
            .and_then(|shooter| self.objects.get(shooter))
            .map(GameObject::item);
        if let (Some(shooter_item), Some(owner)) = (shooter_item, source.owner) {
            if let Some(house) = self.house_mut(owner) {
                house.inform_has_damaged(shooter_item, dealt);
            }
        }

        if killed {
            self.kill_object(id, source.owner);
        }
    }

    /// Destroy an object, crediting `killer` with the kill.
    pub fn kill_object(&mut self, id: ObjectId, killer: Option<HouseId>) {
        let Some((item, victim)) = self.objects.get(id).map(|object| (object.item(), object.owner())) else {
            return;
        };
        if let Some(house) = killer.and_then(|killer| self.house_mut(killer)) {
            house.inform_has_killed(item);
        }
        if let Some(house) = self.house_mut(victim) {
            house.inform_has_lost(item);
        }
        self.destroy_object(id);
    }

    /// Remove an object from the game.
    ///
    /// Frees its tiles (structures leave rubble and redraw the sand
    /// regions), updates the owner's counters, leaves a remnant for
    /// infantry and crashed aircraft, and defeats the owner when it has
    /// nothing left.
    pub fn destroy_object(&mut self, id: ObjectId) {
        let Some(object) = self.unregister_object(id) else {
            return;
        };
        let (item, owner) = (object.item(), object.owner());
        let position = object.real_position().round();

        if let Some(kind) = remnant_kind(item) {
            if let Some(tile) = object.location().and_then(|location| self.map.tile_at_mut(location)) {
                let on_sand = !tile.is_rock();
                tile.add_dead_unit(DeadUnit {
                    kind,
                    house: owner,
                    on_sand,
                    real_pos: position,
                    timer: DEAD_UNIT_TIME,
                });
            }
        }
        if object.is_structure() {
            self.map.create_sand_regions();
        }

        self.events.push(GameEvent::Destroyed {
            id,
            item,
            house: owner,
            position,
        });

        if self.house(owner).is_some_and(|house| !house.is_alive()) {
            self.lose_house(owner);
        }
    }

    /// Silently drop an object that never took part in the game.
    pub(crate) fn remove_object(&mut self, id: ObjectId) {
        self.unregister_object(id);
    }

    fn unregister_object(&mut self, id: ObjectId) -> Option<GameObject> {
        let object = self.objects.remove(id)?;
        for (index, spot) in object.footprint().into_iter().enumerate() {
            let Some(tile) = self.map.tile_at_mut(spot) else {
                continue;
            };
            tile.unassign_object(id);
            if object.is_structure() {
                tile.set_owner(None);
                tile.set_destroyed_structure_tile(Some(index as i32));
            }
        }
        if let Some(house) = self.house_mut(object.owner()) {
            if object.is_structure() {
                house.decrement_structures(object.item());
            } else {
                house.decrement_units(object.item());
            }
        }
        Some(object)
    }

    /// Whether `saboteur` may blow up `target`.
    ///
    /// Targets are structures and ground vehicles other than sandworms, on
    /// another team, standing on a tile the saboteur's house can see.
    #[must_use]
    pub fn saboteur_can_attack(&self, saboteur: ObjectId, target: ObjectId) -> bool {
        let (Some(saboteur), Some(target)) = (self.objects.get(saboteur), self.objects.get(target)) else {
            return false;
        };
        let kind_ok = target.is_structure()
            || (target.is_ground_unit() && !target.is_infantry() && target.item() != ItemId::Sandworm);
        if !kind_ok {
            return false;
        }

        let team_of = |house| self.house(house).map_or(0, crate::house::House::team);
        if team_of(saboteur.owner()) == team_of(target.owner()) {
            return false;
        }

        target
            .location()
            .and_then(|location| self.map.tile_at(location))
            .is_some_and(|tile| {
                tile.is_explored(saboteur.owner(), &self.options)
                    && !tile.is_fogged(saboteur.owner(), self.cycle, &self.options)
            })
    }

    /// Detonate `saboteur` next to `target`, destroying both.
    ///
    /// Returns `false` and does nothing when the attack is not allowed or
    /// the saboteur is out of reach.
    pub fn saboteur_detonate(&mut self, saboteur: ObjectId, target: ObjectId) -> bool {
        if !self.saboteur_can_attack(saboteur, target) {
            return false;
        }
        let Some(from) = self.objects.get(saboteur).and_then(GameObject::location) else {
            return false;
        };
        let Some(target_object) = self.objects.get(target) else {
            return false;
        };
        let reach = target_object
            .footprint()
            .into_iter()
            .map(|spot| block_distance(from, spot))
            .min();
        if reach.map_or(true, |reach| reach > Fixed::from_num(SABOTEUR_REACH)) {
            return false;
        }
        let position = target_object.real_position().round();

        let owner = self.objects.get(saboteur).map(GameObject::owner);
        tracing::debug!(%saboteur, %target, "Saboteur detonated");

        self.kill_object(target, owner);
        self.destroy_object(saboteur);
        self.events.push(GameEvent::Explosion {
            kind: ExplosionKind::Medium1,
            position,
            house: owner,
        });
        true
    }
}

fn remnant_kind(item: ItemId) -> Option<DeadUnitKind> {
    match item {
        ItemId::Soldier | ItemId::Trooper | ItemId::Saboteur => Some(DeadUnitKind::Infantry),
        ItemId::Carryall => Some(DeadUnitKind::Carryall),
        ItemId::Ornithopter => Some(DeadUnitKind::Ornithopter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameOptions;
    use crate::data::TILESIZE;
    use crate::tile::TerrainType;

    fn sandbox() -> Simulation {
        let mut sim = Simulation::new(16, 16, GameOptions::default(), 3).unwrap();
        sim.get_or_create_house(HouseId::Atreides);
        sim.get_or_create_house(HouseId::Harkonnen);
        sim
    }

    fn rock(sim: &mut Simulation, from: Coord, to: Coord) {
        for y in from.y..=to.y {
            for x in from.x..=to.x {
                sim.set_terrain_type(Coord::new(x, y), TerrainType::Rock);
            }
        }
    }

    #[test]
    fn test_damage_falloff_is_zero_at_radius() {
        let mut sim = sandbox();
        let tank = sim.place_unit(HouseId::Atreides, ItemId::Tank, 4, 4).unwrap().unwrap();
        let center = Coord::new(4, 4).tile_center();
        let full = sim.objects.get(tank).unwrap().max_health();

        let at_radius = Coord::new(center.x + 32, center.y);
        sim.damage(DamageSource::default(), at_radius, Fixed::from_num(100), 32, false);
        assert_eq!(sim.objects.get(tank).unwrap().health(), full);

        sim.damage(DamageSource::default(), center, Fixed::from_num(100), 32, false);
        assert_eq!(sim.objects.get(tank).unwrap().health(), full - Fixed::from_num(100));

        let halfway = Coord::new(center.x + 16, center.y);
        sim.damage(DamageSource::default(), halfway, Fixed::from_num(100), 32, false);
        assert_eq!(sim.objects.get(tank).unwrap().health(), full - Fixed::from_num(150));
    }

    #[test]
    fn test_air_damage_only_hits_air() {
        let mut sim = sandbox();
        let tank = sim.place_unit(HouseId::Atreides, ItemId::Tank, 4, 4).unwrap().unwrap();
        let orni = sim.place_unit(HouseId::Atreides, ItemId::Ornithopter, 4, 4).unwrap().unwrap();
        let center = Coord::new(4, 4).tile_center();

        sim.damage(DamageSource::default(), center, Fixed::from_num(50), 64, true);
        let tank_health = sim.objects.get(tank).unwrap().health();
        let orni_health = sim.objects.get(orni).unwrap().health();
        assert_eq!(tank_health, Fixed::from_num(ItemId::Tank.data().hitpoints));
        assert_eq!(orni_health, Fixed::from_num(ItemId::Ornithopter.data().hitpoints - 50));
        assert!(sim.map.tile(4, 4).unwrap().damage().is_empty());
    }

    #[test]
    fn test_structure_measures_to_footprint() {
        let mut sim = sandbox();
        rock(&mut sim, Coord::new(2, 2), Coord::new(6, 6));
        let silo = sim
            .place_structure(HouseId::Harkonnen, None, ItemId::Silo, 3, 3, false)
            .unwrap()
            .unwrap();
        // Just outside the right edge of the 2x2 footprint.
        let position = Coord::new(5 * TILESIZE + 8, 3 * TILESIZE + 10);
        sim.damage(DamageSource::default(), position, Fixed::from_num(90), 32, false);
        let health = sim.objects.get(silo).unwrap().health();
        assert!(health < Fixed::from_num(ItemId::Silo.data().hitpoints));
    }

    #[test]
    fn test_kill_updates_stats_and_defeats_house() {
        let mut sim = sandbox();
        let shooter = sim.place_unit(HouseId::Atreides, ItemId::Tank, 1, 1).unwrap().unwrap();
        let victim = sim.place_unit(HouseId::Harkonnen, ItemId::Trike, 8, 8).unwrap().unwrap();
        let source = DamageSource {
            shooter: Some(shooter),
            owner: Some(HouseId::Atreides),
            bullet: Some(BulletType::ShellMedium),
        };
        sim.damage(source, Coord::new(8, 8).tile_center(), Fixed::from_num(1000), 32, false);

        assert!(!sim.objects.contains(victim));
        let atreides = sim.house(HouseId::Atreides).unwrap();
        assert_eq!(atreides.num_killed_items(ItemId::Trike), 1);
        assert_eq!(atreides.num_item_damage_inflicted(ItemId::Tank), ItemId::Trike.data().hitpoints);
        let harkonnen = sim.house(HouseId::Harkonnen).unwrap();
        assert_eq!(harkonnen.num_lost_items(ItemId::Trike), 1);
        assert!(harkonnen.is_defeated());
        assert!(sim.is_finished());
        assert_eq!(sim.map.tile(8, 8).unwrap().damage().len(), 1);
    }

    #[test]
    fn test_dead_infantry_leaves_remnant() {
        let mut sim = sandbox();
        sim.place_unit(HouseId::Atreides, ItemId::Tank, 1, 1).unwrap();
        let soldier = sim.place_unit(HouseId::Atreides, ItemId::Soldier, 5, 5).unwrap().unwrap();
        sim.handle_damage(soldier, Fixed::from_num(500), DamageSource::default());
        let tile = sim.map.tile(5, 5).unwrap();
        assert_eq!(tile.dead_units().len(), 1);
        assert!(tile.infantry().is_empty());
        assert!(tile.dead_units()[0].on_sand);
    }

    #[test]
    fn test_destroyed_structure_leaves_rubble() {
        let mut sim = sandbox();
        rock(&mut sim, Coord::new(2, 2), Coord::new(5, 5));
        sim.place_unit(HouseId::Harkonnen, ItemId::Tank, 10, 10).unwrap();
        let silo = sim
            .place_structure(HouseId::Harkonnen, None, ItemId::Silo, 2, 2, false)
            .unwrap()
            .unwrap();
        assert_eq!(sim.map.tile(3, 3).unwrap().owner(), Some(HouseId::Harkonnen));
        sim.destroy_object(silo);
        let tile = sim.map.tile(3, 3).unwrap();
        assert_eq!(tile.owner(), None);
        assert_eq!(tile.destroyed_structure_tile(), Some(3));
        assert!(!tile.has_ground_object());
        assert_eq!(sim.house(HouseId::Harkonnen).unwrap().num_structures(), 0);
    }

    #[test]
    fn test_saboteur_needs_visible_enemy_in_reach() {
        let options = GameOptions {
            game_type: crate::config::GameType::Custom,
            ..GameOptions::default()
        };
        let mut sim = Simulation::new(16, 16, options, 1).unwrap();
        for (house, team) in [(HouseId::Ordos, 1), (HouseId::Harkonnen, 2)] {
            sim.insert_house(crate::house::House::new(house, 0, 25, team, 0));
        }
        sim.place_unit(HouseId::Harkonnen, ItemId::Tank, 12, 12).unwrap();
        let tank = sim.place_unit(HouseId::Harkonnen, ItemId::Tank, 6, 5).unwrap().unwrap();
        let far = sim.place_unit(HouseId::Harkonnen, ItemId::Quad, 10, 5).unwrap().unwrap();
        let saboteur = sim.place_unit(HouseId::Ordos, ItemId::Saboteur, 5, 5).unwrap().unwrap();

        assert!(sim.saboteur_can_attack(saboteur, tank));
        assert!(!sim.saboteur_can_attack(saboteur, saboteur));
        assert!(!sim.saboteur_detonate(saboteur, far));
        assert!(sim.saboteur_detonate(saboteur, tank));
        assert!(!sim.objects.contains(tank));
        assert!(!sim.objects.contains(saboteur));
        assert_eq!(sim.house(HouseId::Ordos).unwrap().num_killed_items(ItemId::Tank), 1);
    }

    #[test]
    fn test_saboteur_ignores_allies() {
        let mut sim = sandbox();
        let saboteur = sim.place_unit(HouseId::Atreides, ItemId::Saboteur, 0, 0).unwrap().unwrap();
        let tank = sim.place_unit(HouseId::Harkonnen, ItemId::Tank, 15, 15).unwrap().unwrap();
        // Unbound campaign houses share team 2.
        assert!(!sim.saboteur_can_attack(saboteur, tank));
    }
}
