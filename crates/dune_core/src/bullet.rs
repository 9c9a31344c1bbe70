//! Projectiles in flight.
//!
//! A [`Bullet`] only knows how to move itself. It reports what happened in
//! a [`BulletStep`] and the simulation applies the damage, so bullets never
//! hold references into the world.

use serde::{Deserialize, Serialize};

use crate::combat::DamageSource;
use crate::data::{HouseId, ItemId, TILESIZE};
use crate::error::{GameError, Result};
use crate::map::Map;
use crate::math::{
    deg256_to_rad, destination_angle_rad, distance_from, fixed_cos, fixed_ratio, fixed_sin,
    fixed_sqrt, lround, rad_to_deg256, Coord, Fixed, Vec2Fixed, FIXED_TWO_PI,
};
use crate::objects::{GameObject, ObjectId, ObjectManager};
use crate::random::GameRng;
use crate::simulation::{ExplosionKind, GameEvent, Simulation};
use crate::stream::{InputStream, OutputStream};

/// Largest heading change of a homing rocket per cycle, in deg256.
const TURN_SPEED: Fixed = fixed_ratio(9, 2);

/// Scales the sonic tank's weapon damage down to per-pulse damage.
const SONIC_DAMAGE_DIVISOR: Fixed = fixed_ratio(9, 2);

/// Tiles a bullet may leave the map by before it is dropped.
const MAP_MARGIN: i32 = 5;

/// Distance to the destination that counts as arrived.
const ARRIVAL_DISTANCE: i32 = 4;

/// Projectile kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletType {
    /// Deviator gas rocket.
    DRocket = 0,
    /// Death hand missile.
    LargeRocket = 1,
    /// Launcher rocket.
    Rocket = 2,
    /// Rocket turret rocket.
    TurretRocket = 3,
    /// Light cannon shell.
    ShellSmall = 4,
    /// Tank shell.
    ShellMedium = 5,
    /// Heavy tank shell.
    ShellLarge = 6,
    /// Gun turret shell.
    ShellTurret = 7,
    /// Ornithopter rocket.
    SmallRocket = 8,
    /// Sonic tank wave.
    Sonic = 9,
}

/// Flight constants of a projectile kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletData {
    /// Damage radius in world units.
    pub radius: i32,
    /// World units per cycle.
    pub speed: Fixed,
    /// Initial detonation timer, -1 for none.
    pub timer: i8,
    /// Explodes when passing over a structure.
    pub explodes_at_ground_objects: bool,
    /// Rotation frames of the sprite.
    pub frames: i32,
}

const fn bullet(radius: i32, speed: Fixed, timer: i8, frames: i32) -> BulletData {
    BulletData {
        radius,
        speed,
        timer,
        explodes_at_ground_objects: false,
        frames,
    }
}

const SHELL: BulletData = BulletData {
    explodes_at_ground_objects: true,
    ..bullet(TILESIZE / 2, fixed_ratio(20, 1), -1, 1)
};

impl BulletType {
    /// Look up a projectile kind by id.
    ///
    /// Id 10 is a sandworm's bite, which never flies and is rejected.
    pub fn from_u32(id: u32) -> Result<Self> {
        Ok(match id {
            0 => Self::DRocket,
            1 => Self::LargeRocket,
            2 => Self::Rocket,
            3 => Self::TurretRocket,
            4 => Self::ShellSmall,
            5 => Self::ShellMedium,
            6 => Self::ShellLarge,
            7 => Self::ShellTurret,
            8 => Self::SmallRocket,
            9 => Self::Sonic,
            _ => return Err(GameError::InvalidBulletType(id)),
        })
    }

    /// Flight constants.
    #[must_use]
    pub const fn data(self) -> BulletData {
        match self {
            Self::DRocket => bullet(TILESIZE / 2, fixed_ratio(20, 1), 19, 16),
            Self::LargeRocket => bullet(TILESIZE, fixed_ratio(20, 1), -1, 16),
            Self::Rocket => bullet(TILESIZE / 2, fixed_ratio(35, 2), 22, 16),
            Self::TurretRocket => bullet(TILESIZE / 2, fixed_ratio(20, 1), -1, 16),
            Self::ShellSmall | Self::ShellMedium | Self::ShellLarge | Self::ShellTurret => SHELL,
            Self::SmallRocket => bullet(TILESIZE / 2, fixed_ratio(20, 1), 7, 16),
            Self::Sonic => bullet(TILESIZE * 3 / 4, fixed_ratio(6, 1), 45, 1),
        }
    }

    const fn is_homing(self) -> bool {
        matches!(self, Self::Rocket | Self::DRocket)
    }
}

/// Outcome of one bullet update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BulletStep {
    /// Still in flight.
    Flying,
    /// A sonic wave hit two points this cycle.
    SonicPulse {
        /// World points hit.
        hits: [Coord; 2],
        /// Damage at each point.
        damage: Fixed,
    },
    /// Flew off the map; drop it.
    LeftMap,
    /// Reached its target; resolve and drop it.
    Detonate,
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bullet {
    bullet_type: BulletType,
    air: bool,
    damage: i32,
    shooter: Option<ObjectId>,
    owner: Option<HouseId>,
    source: Coord,
    destination: Coord,
    location: Coord,
    real: Vec2Fixed,
    speed: Vec2Fixed,
    drawn_angle: i8,
    angle: Fixed,
    timer: i8,
}

impl Bullet {
    /// Fire a bullet from world point `source` at `destination`.
    ///
    /// Sonic waves always travel the sonic tank's full range along the aim.
    /// Rockets scatter around the target, more so at long range. The
    /// heading is taken from the unscattered aim.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shooter: Option<ObjectId>,
        owner: Option<HouseId>,
        source: Coord,
        destination: Coord,
        bullet_type: BulletType,
        damage: i32,
        air: bool,
        rng: &mut GameRng,
    ) -> Self {
        let data = bullet_type.data();
        let mut target = destination;

        match bullet_type {
            BulletType::Sonic => {
                let range = Fixed::from_num(ItemId::SonicTank.data().weapon_range * TILESIZE);
                let diff_x = Fixed::from_num(destination.x - source.x);
                let mut diff_y = Fixed::from_num(destination.y - source.y);
                if diff_x == Fixed::ZERO && diff_y == Fixed::ZERO {
                    diff_y = -range;
                }
                let ratio = range / fixed_sqrt(diff_x * diff_x + diff_y * diff_y);
                target = Coord::new(
                    source.x + (diff_x * ratio).floor().to_num::<i32>(),
                    source.y + (diff_y * ratio).floor().to_num::<i32>(),
                );
            }
            BulletType::Rocket | BulletType::DRocket => {
                let distance = distance_from(Vec2Fixed::from_coord(source), Vec2Fixed::from_coord(destination));
                let scatter_angle = FIXED_TWO_PI * rng.rand_fixed();
                let max_scatter = lround(Fixed::from_num(TILESIZE / 2) + distance / i64::from(TILESIZE));
                let radius = Fixed::from_num(rng.rand(0, max_scatter));
                target.x += lround(fixed_cos(scatter_angle) * radius);
                target.y -= lround(fixed_sin(scatter_angle) * radius);
            }
            _ => {}
        }

        let angle_rad = destination_angle_rad(Vec2Fixed::from_coord(source), Vec2Fixed::from_coord(destination));
        let angle = rad_to_deg256(angle_rad);

        let bullet = Self {
            bullet_type,
            air,
            damage,
            shooter,
            owner,
            source,
            destination: target,
            location: source.world_to_tile(),
            real: Vec2Fixed::from_coord(source),
            speed: Vec2Fixed::new(data.speed * fixed_cos(angle_rad), -(data.speed * fixed_sin(angle_rad))),
            drawn_angle: drawn_angle(angle, data.frames),
            angle,
            timer: data.timer,
        };
        tracing::trace!(?bullet_type, ?source, destination = ?bullet.destination, "Bullet fired");
        bullet
    }

    /// Projectile kind.
    #[must_use]
    pub const fn bullet_type(&self) -> BulletType {
        self.bullet_type
    }

    /// Shooter, if known.
    #[must_use]
    pub const fn shooter(&self) -> Option<ObjectId> {
        self.shooter
    }

    /// House credited with hits.
    #[must_use]
    pub const fn owner(&self) -> Option<HouseId> {
        self.owner
    }

    /// Aim point after scatter.
    #[must_use]
    pub const fn destination(&self) -> Coord {
        self.destination
    }

    /// Current tile.
    #[must_use]
    pub const fn location(&self) -> Coord {
        self.location
    }

    /// Current world position.
    #[must_use]
    pub const fn real_position(&self) -> Vec2Fixed {
        self.real
    }

    /// Heading in deg256.
    #[must_use]
    pub const fn angle(&self) -> Fixed {
        self.angle
    }

    /// Sprite frame matching the heading.
    #[must_use]
    pub const fn drawn_angle(&self) -> i8 {
        self.drawn_angle
    }

    /// Cycles until a timed bullet may detonate, -1 for none.
    #[must_use]
    pub const fn timer(&self) -> i8 {
        self.timer
    }

    /// Damage radius; anti-air bullets reach twice as far.
    #[must_use]
    pub const fn damage_radius(&self) -> i32 {
        let radius = self.bullet_type.data().radius;
        if self.air {
            radius * 2
        } else {
            radius
        }
    }

    fn damage_source(&self) -> DamageSource {
        DamageSource {
            shooter: self.shooter,
            owner: self.owner,
            bullet: Some(self.bullet_type),
        }
    }

    /// Advance one cycle.
    pub fn update(&mut self, map: &Map, objects: &ObjectManager) -> BulletStep {
        let data = self.bullet_type.data();

        if self.bullet_type.is_homing() {
            self.steer(data);
        }

        let destination = Vec2Fixed::from_coord(self.destination);
        let old_distance = distance_from(self.real, destination);

        self.real = self.real + self.speed;
        self.location = self.real.to_tile();

        let outside = self.location.x < -MAP_MARGIN
            || self.location.x >= map.width() + MAP_MARGIN
            || self.location.y < -MAP_MARGIN
            || self.location.y >= map.height() + MAP_MARGIN;
        if outside {
            tracing::trace!(location = ?self.location, "Bullet left the map");
            return BulletStep::LeftMap;
        }

        let new_distance = distance_from(self.real, destination);
        if self.timer > 0 {
            self.timer -= 1;
        }

        if self.bullet_type == BulletType::Sonic {
            if self.timer == 0 {
                return BulletStep::Detonate;
            }
            let weapon_damage = Fixed::from_num(ItemId::SonicTank.data().weapon_damage);
            let start = (weapon_damage / 4 + Fixed::ONE) / SONIC_DAMAGE_DIVISOR;
            let end = ((weapon_damage - Fixed::from_num(9)) / 4 + Fixed::ONE) / SONIC_DAMAGE_DIVISOR;
            let decrease = -(start - end) / (Fixed::from_num(45 * 2) * data.speed);
            let travelled = distance_from(Vec2Fixed::from_coord(self.source), self.real);
            let current = travelled * decrease + start;

            let first = self.real.round();
            self.real = self.real + self.speed;
            let second = self.real.round();
            return BulletStep::SonicPulse {
                hits: [first, second],
                damage: current / 2,
            };
        }

        if data.explodes_at_ground_objects && self.hits_structure(map, objects) {
            return BulletStep::Detonate;
        }

        if old_distance < new_distance || new_distance < Fixed::from_num(ARRIVAL_DISTANCE) {
            if self.bullet_type.is_homing() {
                if self.timer == 0 {
                    return BulletStep::Detonate;
                }
            } else {
                self.real = destination;
                return BulletStep::Detonate;
            }
        }
        BulletStep::Flying
    }

    fn steer(&mut self, data: BulletData) {
        let to_destination = rad_to_deg256(destination_angle_rad(
            Vec2Fixed::from_coord(self.real.round()),
            Vec2Fixed::from_coord(self.destination),
        ));
        let full = Fixed::from_num(256);
        let half = Fixed::from_num(128);

        let mut diff = to_destination - self.angle;
        if diff > half {
            diff -= full;
        } else if diff < -half {
            diff += full;
        }
        diff = diff.clamp(-TURN_SPEED, TURN_SPEED);

        self.angle += diff;
        if self.angle < Fixed::ZERO {
            self.angle += full;
        } else if self.angle >= full {
            self.angle -= full;
        }

        let rad = deg256_to_rad(self.angle);
        self.speed = Vec2Fixed::new(data.speed * fixed_cos(rad), -(data.speed * fixed_sin(rad)));
        self.drawn_angle = drawn_angle(self.angle, data.frames);
    }

    fn hits_structure(&self, map: &Map, objects: &ObjectManager) -> bool {
        let Some(structure) = map
            .tile_at(self.location)
            .and_then(crate::tile::Tile::ground_object)
            .and_then(|id| objects.get(id))
            .filter(|object| object.is_structure())
        else {
            return false;
        };
        self.bullet_type != BulletType::ShellTurret || Some(structure.owner()) != self.owner
    }

    /// Write the bullet.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_u32(self.bullet_type as u32);
        stream.write_bool(self.air);
        stream.write_i32(self.damage);
        stream.write_u32(ObjectId::to_raw(self.shooter));
        stream.write_u32(self.owner.map_or(u32::MAX, |house| house as u32));
        for point in [self.source, self.destination, self.location] {
            stream.write_i32(point.x);
            stream.write_i32(point.y);
        }
        stream.write_fixed(self.real.x);
        stream.write_fixed(self.real.y);
        stream.write_fixed(self.speed.x);
        stream.write_fixed(self.speed.y);
        stream.write_i8(self.drawn_angle);
        stream.write_fixed(self.angle);
        stream.write_i8(self.timer);
    }

    /// Read a bullet written by [`Bullet::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let bullet_type = BulletType::from_u32(stream.read_u32()?)?;
        let air = stream.read_bool()?;
        let damage = stream.read_i32()?;
        let shooter = ObjectId::from_raw(stream.read_u32()?);
        let owner = match stream.read_u32()? {
            u32::MAX => None,
            id => Some(HouseId::from_u32(id)?),
        };
        let mut points = [Coord::default(); 3];
        for point in &mut points {
            *point = Coord::new(stream.read_i32()?, stream.read_i32()?);
        }
        let [source, destination, location] = points;
        let real = Vec2Fixed::new(stream.read_fixed()?, stream.read_fixed()?);
        let speed = Vec2Fixed::new(stream.read_fixed()?, stream.read_fixed()?);
        let drawn_angle = stream.read_i8()?;
        let angle = stream.read_fixed()?;
        let timer = stream.read_i8()?;
        Ok(Self {
            bullet_type,
            air,
            damage,
            shooter,
            owner,
            source,
            destination,
            location,
            real,
            speed,
            drawn_angle,
            angle,
            timer,
        })
    }
}

fn drawn_angle(angle: Fixed, frames: i32) -> i8 {
    (lround(Fixed::from_num(frames) * angle / 256) % frames) as i8
}

impl Simulation {
    /// Fire a bullet. Its owner is the shooter's house, if the shooter exists.
    pub fn fire_bullet(
        &mut self,
        shooter: Option<ObjectId>,
        source: Coord,
        destination: Coord,
        bullet_type: BulletType,
        damage: i32,
        air: bool,
    ) {
        let owner = shooter
            .and_then(|id| self.objects.get(id))
            .map(GameObject::owner);
        let bullet = Bullet::new(shooter, owner, source, destination, bullet_type, damage, air, &mut self.rng);
        self.bullets.push(bullet);
    }

    /// Bullets in flight.
    #[must_use]
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub(crate) fn update_bullets(&mut self) {
        let mut in_flight = std::mem::take(&mut self.bullets);
        let mut survivors = Vec::with_capacity(in_flight.len());
        for mut bullet in in_flight.drain(..) {
            match bullet.update(&self.map, &self.objects) {
                BulletStep::Flying => survivors.push(bullet),
                BulletStep::SonicPulse { hits, damage } => {
                    for hit in hits {
                        self.damage(bullet.damage_source(), hit, damage, bullet.damage_radius(), false);
                    }
                    survivors.push(bullet);
                }
                BulletStep::LeftMap => {}
                BulletStep::Detonate => self.detonate_bullet(&bullet),
            }
        }
        survivors.append(&mut self.bullets);
        self.bullets = survivors;
    }

    fn detonate_bullet(&mut self, bullet: &Bullet) {
        let position = bullet.real.round();
        let source = bullet.damage_source();
        let amount = Fixed::from_num(bullet.damage);
        let radius = bullet.damage_radius();
        tracing::trace!(bullet_type = ?bullet.bullet_type, ?position, "Bullet detonated");

        let kind = match bullet.bullet_type {
            BulletType::LargeRocket => {
                for i in 0..5 {
                    for j in 0..5 {
                        let corner = (i == 0 || i == 4) && (j == 0 || j == 4);
                        if corner {
                            continue;
                        }
                        let point = Coord::new(position.x + (i - 2) * TILESIZE, position.y + (j - 2) * TILESIZE);
                        self.damage(source, point, amount, radius, bullet.air);
                        let kind = if self.rng.rand(0, 1) == 0 {
                            ExplosionKind::Large1
                        } else {
                            ExplosionKind::Large2
                        };
                        self.events.push(GameEvent::Explosion {
                            kind,
                            position: point,
                            house: bullet.owner,
                        });
                    }
                }
                return;
            }
            BulletType::Sonic => return,
            BulletType::DRocket => ExplosionKind::Gas,
            BulletType::Rocket | BulletType::TurretRocket | BulletType::SmallRocket => ExplosionKind::Small,
            BulletType::ShellSmall => ExplosionKind::ShellSmall,
            BulletType::ShellMedium | BulletType::ShellTurret => ExplosionKind::ShellMedium,
            BulletType::ShellLarge => ExplosionKind::ShellLarge,
        };
        self.damage(source, position, amount, radius, bullet.air);
        self.events.push(GameEvent::Explosion {
            kind,
            position,
            house: bullet.owner,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameOptions;
    use crate::tile::TerrainType;

    fn fire(bullet_type: BulletType, source: Coord, destination: Coord, seed: u64) -> Bullet {
        let mut rng = GameRng::from_seed(seed);
        Bullet::new(None, Some(HouseId::Ordos), source, destination, bullet_type, 50, false, &mut rng)
    }

    #[test]
    fn test_sandworm_is_not_a_projectile() {
        assert_eq!(BulletType::from_u32(10), Err(GameError::InvalidBulletType(10)));
        assert_eq!(BulletType::from_u32(42), Err(GameError::InvalidBulletType(42)));
        assert_eq!(BulletType::from_u32(9), Ok(BulletType::Sonic));
    }

    #[test]
    fn test_rocket_scatter_is_seeded() {
        let source = Coord::new(100, 100);
        let target = Coord::new(900, 500);
        let a = fire(BulletType::Rocket, source, target, 7);
        let b = fire(BulletType::Rocket, source, target, 7);
        assert_eq!(a.destination(), b.destination());

        let distance = distance_from(Vec2Fixed::from_coord(source), Vec2Fixed::from_coord(target));
        let max = lround(Fixed::from_num(32) + distance / i64::from(TILESIZE)) + 1;
        let dx = a.destination().x - target.x;
        let dy = a.destination().y - target.y;
        assert!(dx * dx + dy * dy <= max * max);
        // Heading ignores the scatter.
        let aim = rad_to_deg256(destination_angle_rad(
            Vec2Fixed::from_coord(source),
            Vec2Fixed::from_coord(target),
        ));
        assert_eq!(a.angle(), aim);
    }

    #[test]
    fn test_shells_fly_straight_to_target() {
        let shell = fire(BulletType::ShellMedium, Coord::new(64, 64), Coord::new(640, 64), 1);
        assert_eq!(shell.destination(), Coord::new(640, 64));
        assert_eq!(shell.timer(), -1);
        assert_eq!(shell.drawn_angle(), 0);
    }

    #[test]
    fn test_sonic_travels_full_range() {
        let range = ItemId::SonicTank.data().weapon_range * TILESIZE;
        let sonic = fire(BulletType::Sonic, Coord::new(1000, 1000), Coord::new(1128, 1000), 1);
        assert_eq!(sonic.destination(), Coord::new(1000 + range, 1000));

        let sonic = fire(BulletType::Sonic, Coord::new(1000, 1000), Coord::new(1000, 1000), 1);
        assert_eq!(sonic.destination(), Coord::new(1000, 1000 - range));
    }

    #[test]
    fn test_air_doubles_radius() {
        let mut rng = GameRng::from_seed(0);
        let bullet = Bullet::new(None, None, Coord::new(0, 0), Coord::new(64, 0), BulletType::SmallRocket, 10, true, &mut rng);
        assert_eq!(bullet.damage_radius(), 64);
    }

    #[test]
    fn test_leaves_map_beyond_margin() {
        let map = Map::new(4, 4).unwrap();
        let objects = ObjectManager::new();
        let mut shell = fire(BulletType::ShellSmall, Coord::new(128, 128), Coord::new(128, -5000), 1);
        let mut steps = 0;
        let outcome = loop {
            steps += 1;
            match shell.update(&map, &objects) {
                BulletStep::Flying => {}
                other => break other,
            }
        };
        assert_eq!(outcome, BulletStep::LeftMap);
        assert!(shell.location().y < -MAP_MARGIN);
        assert!(steps > 1);
    }

    #[test]
    fn test_rocket_waits_for_timer() {
        let map = Map::new(32, 32).unwrap();
        let objects = ObjectManager::new();
        let mut rocket = fire(BulletType::SmallRocket, Coord::new(320, 320), Coord::new(325, 320), 1);
        // Non-homing rockets land as soon as they pass the target.
        assert_eq!(rocket.update(&map, &objects), BulletStep::Detonate);
        assert_eq!(rocket.real_position(), Vec2Fixed::from_coord(Coord::new(325, 320)));

        let mut rocket = fire(BulletType::Rocket, Coord::new(640, 640), Coord::new(645, 640), 1);
        let mut cycles = 0;
        while rocket.update(&map, &objects) != BulletStep::Detonate {
            cycles += 1;
            assert!(cycles < 100);
        }
        assert_eq!(rocket.timer(), 0);
        assert!(cycles >= 21);
    }

    #[test]
    fn test_roundtrip_mid_flight() {
        let map = Map::new(32, 32).unwrap();
        let objects = ObjectManager::new();
        let mut rocket = fire(BulletType::DRocket, Coord::new(100, 100), Coord::new(1500, 900), 3);
        for _ in 0..5 {
            assert_eq!(rocket.update(&map, &objects), BulletStep::Flying);
        }
        assert!(rocket.timer() > 0);

        let mut out = OutputStream::new();
        rocket.save(&mut out);
        let bytes = out.into_bytes();
        let mut input = InputStream::new(&bytes);
        let loaded = Bullet::load(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        assert_eq!(loaded, rocket);
    }

    #[test]
    fn test_sonic_pulses_until_timer() {
        let map = Map::new(64, 64).unwrap();
        let objects = ObjectManager::new();
        let mut sonic = fire(BulletType::Sonic, Coord::new(64, 2000), Coord::new(4000, 2000), 1);
        let mut pulses = 0;
        let mut last_damage = Fixed::MAX;
        loop {
            match sonic.update(&map, &objects) {
                BulletStep::SonicPulse { hits, damage } => {
                    pulses += 1;
                    assert!(damage < last_damage);
                    assert_eq!(hits[1].x - hits[0].x, 6);
                    last_damage = damage;
                }
                BulletStep::Detonate => break,
                other => panic!("unexpected step {other:?}"),
            }
        }
        assert_eq!(pulses, 44);
    }

    fn sandbox() -> Simulation {
        let mut sim = Simulation::new(20, 20, GameOptions::default(), 5).unwrap();
        for y in 8..12 {
            for x in 8..12 {
                sim.set_terrain_type(Coord::new(x, y), TerrainType::Rock);
            }
        }
        sim
    }

    #[test]
    fn test_shell_explodes_on_structure() {
        let mut sim = sandbox();
        sim.place_structure(HouseId::Harkonnen, None, ItemId::Silo, 9, 9, false)
            .unwrap()
            .unwrap();
        let source = Coord::new(2, 9).tile_center();
        let target = Coord::new(16, 9).tile_center();
        sim.fire_bullet(None, source, target, BulletType::ShellSmall, 20, false);
        let events: Vec<GameEvent> = (0..60).flat_map(|_| sim.tick()).collect();
        assert!(sim.bullets().is_empty());
        let exploded_at = events.into_iter().find_map(|event| match event {
            GameEvent::Explosion { kind: ExplosionKind::ShellSmall, position, .. } => Some(position),
            _ => None,
        });
        let position = exploded_at.unwrap();
        assert_eq!(position.world_to_tile().x, 9);
    }

    #[test]
    fn test_turret_shell_passes_own_structure() {
        let mut sim = sandbox();
        sim.place_structure(HouseId::Harkonnen, None, ItemId::Silo, 9, 9, false)
            .unwrap()
            .unwrap();
        let turret = sim
            .place_structure(HouseId::Harkonnen, None, ItemId::GunTurret, 8, 8, false)
            .unwrap()
            .unwrap();
        let source = Coord::new(2, 9).tile_center();
        let target = Coord::new(16, 9).tile_center();
        sim.fire_bullet(Some(turret), source, target, BulletType::ShellTurret, 20, false);
        assert_eq!(sim.bullets()[0].owner(), Some(HouseId::Harkonnen));
        let events: Vec<GameEvent> = (0..60).flat_map(|_| sim.tick()).collect();
        let exploded_at = events.into_iter().find_map(|event| match event {
            GameEvent::Explosion { kind: ExplosionKind::ShellMedium, position, .. } => Some(position),
            _ => None,
        });
        assert_eq!(exploded_at, Some(target));
    }

    #[test]
    fn test_large_rocket_hits_pattern() {
        let mut sim = sandbox();
        let source = Coord::new(2, 2).tile_center();
        let target = Coord::new(10, 2).tile_center();
        sim.fire_bullet(None, source, target, BulletType::LargeRocket, 100, false);
        let events: Vec<GameEvent> = (0..40).flat_map(|_| sim.tick()).collect();
        let explosions = events
            .into_iter()
            .filter(|event| {
                matches!(
                    event,
                    GameEvent::Explosion {
                        kind: ExplosionKind::Large1 | ExplosionKind::Large2,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(explosions, 21);
    }
}
