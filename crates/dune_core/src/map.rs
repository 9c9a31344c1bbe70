//! The tile grid and the terrain operations that need the whole simulation.
//!
//! [`Map`] owns its tiles in row-major order and never clamps coordinates:
//! every accessor returns `None` outside the grid. Operations that also
//! touch houses or objects (blooms, harvesting, radar projection) live in
//! the `impl Simulation` block at the bottom of this module.

use crate::data::{HouseId, ItemId};
use crate::error::{GameError, Result};
use crate::math::{fixed_sqrt, Coord, Fixed};
use crate::objects::ObjectId;
use crate::random::GameRng;
use crate::simulation::{ExplosionKind, GameEvent, Simulation};
use crate::stream::{InputStream, OutputStream};
use crate::tile::{DamageDecal, DecalKind, TerrainType, Tile};

/// Number of credits a special bloom may grant.
const SPECIAL_BLOOM_CREDITS: (i32, i32) = (150, 400);

/// Radius of the spice field a spice bloom creates.
const SPICE_BLOOM_RADIUS: i32 = 5;

/// Rectangular grid of tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl Map {
    /// A map of sand tiles.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(GameError::InvalidMapSize { width, height });
        }
        Ok(Self {
            width,
            height,
            tiles: vec![Tile::new(); (width * height) as usize],
        })
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Centre tile of the map.
    #[must_use]
    pub const fn center(&self) -> Coord {
        Coord::new(self.width / 2, self.height / 2)
    }

    /// Whether `(x, y)` lies on the map.
    #[must_use]
    pub const fn tile_exists(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.tile_exists(x, y).then(|| (y * self.width + x) as usize)
    }

    /// Tile at `(x, y)`.
    #[must_use]
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).and_then(|index| self.tiles.get(index))
    }

    /// Mutable tile at `(x, y)`.
    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).and_then(|index| self.tiles.get_mut(index))
    }

    /// Tile at a tile coordinate.
    #[must_use]
    pub fn tile_at(&self, location: Coord) -> Option<&Tile> {
        self.tile(location.x, location.y)
    }

    /// Mutable tile at a tile coordinate.
    pub fn tile_at_mut(&mut self, location: Coord) -> Option<&mut Tile> {
        self.tile_mut(location.x, location.y)
    }

    /// All tiles with their coordinates, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (Coord, &Tile)> + '_ {
        let width = self.width;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(index, tile)| {
                let index = index as i32;
                (Coord::new(index % width, index / width), tile)
            })
    }

    /// Number of distinct sand regions.
    #[must_use]
    pub fn num_sand_regions(&self) -> usize {
        let mut regions: Vec<u32> = self.tiles.iter().filter_map(Tile::sand_region).collect();
        regions.sort_unstable();
        regions.dedup();
        regions.len()
    }

    /// Partition non-rock tiles into 4-connected regions.
    ///
    /// Regions are numbered from 0 in row-major order of their first tile.
    pub fn create_sand_regions(&mut self) {
        for tile in &mut self.tiles {
            tile.set_sand_region(None);
        }

        let mut next_region = 0u32;
        let mut stack = Vec::new();
        for start in 0..self.tiles.len() {
            let tile = &self.tiles[start];
            if tile.is_rock() || tile.sand_region().is_some() {
                continue;
            }

            self.tiles[start].set_sand_region(Some(next_region));
            stack.push(start);
            while let Some(index) = stack.pop() {
                let x = index as i32 % self.width;
                let y = index as i32 / self.width;
                for (nx, ny) in [(x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y)] {
                    let Some(neighbour) = self.index(nx, ny) else {
                        continue;
                    };
                    let tile = &mut self.tiles[neighbour];
                    if !tile.is_rock() && tile.sand_region().is_none() {
                        tile.set_sand_region(Some(next_region));
                        stack.push(neighbour);
                    }
                }
            }
            next_region += 1;
        }
    }

    /// Spread spice around `center` (tile coordinate).
    ///
    /// Every non-rock tile within `radius` tiles becomes spice, or thick
    /// spice if it already held spice.
    pub fn create_spice_field(
        &mut self,
        center: Coord,
        radius: i32,
        center_is_thick_spice: bool,
        rng: &mut GameRng,
    ) {
        let radius_squared = radius * radius;
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let dx = x - center.x;
                let dy = y - center.y;
                if dx * dx + dy * dy > radius_squared {
                    continue;
                }
                let Some(tile) = self.tile_mut(x, y) else {
                    continue;
                };
                if tile.is_rock() {
                    continue;
                }
                if tile.is_spice() {
                    tile.set_type(TerrainType::ThickSpice, rng);
                } else {
                    tile.set_type(TerrainType::Spice, rng);
                }
            }
        }

        if center_is_thick_spice {
            if let Some(tile) = self.tile_at_mut(center) {
                tile.set_type(TerrainType::ThickSpice, rng);
            }
        }
    }

    /// Change the terrain of one tile and clear remnants in the 4x4 block it anchors.
    ///
    /// Returns the ids the terrain change evicted.
    pub fn set_type(
        &mut self,
        x: i32,
        y: i32,
        terrain: TerrainType,
        rng: &mut GameRng,
    ) -> Vec<ObjectId> {
        let Some(tile) = self.tile_mut(x, y) else {
            return Vec::new();
        };
        let evicted = tile.set_type(terrain, rng);

        for block_y in y..=y + 3 {
            for block_x in x..=x + 3 {
                if let Some(tile) = self.tile_mut(block_x, block_y) {
                    tile.clear_terrain();
                }
            }
        }
        evicted
    }

    /// Whether a unit or structure of type `item` may stand on `location`.
    #[must_use]
    pub fn can_pass(&self, item: ItemId, location: Coord) -> bool {
        let Some(tile) = self.tile_at(location) else {
            return false;
        };
        if item.is_air_unit() {
            true
        } else if item.is_underground_unit() {
            !tile.is_rock() && !tile.has_underground_unit()
        } else if item.is_infantry() {
            !tile.has_non_infantry_ground_object() && tile.infantry_not_full()
        } else if item.is_unit() {
            !tile.is_mountain() && !tile.has_ground_object()
        } else {
            !tile.has_ground_object()
        }
    }

    /// Find a free tile for `item` as close to `origin` as possible.
    ///
    /// Rings of growing radius are searched; the spot is picked uniformly
    /// among the passable tiles of the first ring that has any.
    pub fn find_deploy_spot(
        &self,
        item: ItemId,
        origin: Coord,
        rng: &mut GameRng,
    ) -> Option<Coord> {
        let max_radius = self.width.max(self.height);
        for radius in 0..=max_radius {
            let candidates: Vec<Coord> = ring(origin, radius)
                .filter(|spot| self.can_pass(item, *spot))
                .collect();
            if let Some(spot) = rng.pick(&candidates) {
                return Some(*spot);
            }
        }
        None
    }

    /// Mark every tile within `radius` tiles of `center` as seen by `house`.
    pub fn view_map(&mut self, house: HouseId, center: Coord, radius: i32, cycle: u32) {
        let radius_squared = radius * radius;
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let dx = x - center.x;
                let dy = y - center.y;
                if dx * dx + dy * dy > radius_squared {
                    continue;
                }
                if let Some(tile) = self.tile_mut(x, y) {
                    tile.set_explored(house, cycle);
                }
            }
        }
    }

    /// Decay transient tile state.
    pub fn update(&mut self) {
        for tile in &mut self.tiles {
            tile.update();
        }
    }

    /// Write dimensions and every tile.
    pub fn save(&self, stream: &mut OutputStream, cycle: u32) {
        stream.write_i32(self.width);
        stream.write_i32(self.height);
        for tile in &self.tiles {
            tile.save(stream, cycle);
        }
    }

    /// Read a map written by [`Map::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let width = stream.read_i32()?;
        let height = stream.read_i32()?;
        if width <= 0 || height <= 0 {
            return Err(GameError::InvalidMapSize { width, height });
        }
        let count = (width as usize).saturating_mul(height as usize);
        if count > stream.remaining() {
            return Err(GameError::CorruptSave(format!(
                "map of {width}x{height} tiles exceeds remaining data"
            )));
        }
        let tiles = (0..count)
            .map(|_| Tile::load(stream))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            width,
            height,
            tiles,
        })
    }
}

/// Tiles at exactly Chebyshev distance `radius` from `center`, row by row.
fn ring(center: Coord, radius: i32) -> impl Iterator<Item = Coord> {
    (center.y - radius..=center.y + radius).flat_map(move |y| {
        (center.x - radius..=center.x + radius)
            .filter(move |x| {
                (y - center.y).abs() == radius || (*x - center.x).abs() == radius
            })
            .map(move |x| Coord::new(x, y))
    })
}

impl Simulation {
    /// Change terrain, destroying the objects that cannot stay on it.
    pub fn set_terrain_type(&mut self, location: Coord, terrain: TerrainType) {
        let evicted = self
            .map
            .set_type(location.x, location.y, terrain, &mut self.rng);
        for id in evicted {
            if self.objects.contains(id) {
                self.destroy_object(id);
            }
        }
    }

    /// Harvest one step of spice from `location`, crediting `house` statistics.
    ///
    /// Returns the amount removed; zero off the map or on a dry tile.
    pub fn harvest_spice(&mut self, house: HouseId, location: Coord) -> Fixed {
        let Some(tile) = self.map.tile_at_mut(location) else {
            return Fixed::ZERO;
        };
        let amount = tile.harvest_spice();
        if let Some(house) = self.house_mut(house) {
            house.add_harvested_spice(amount);
        }
        amount
    }

    /// Erupt a spice bloom into a spice field.
    pub fn trigger_spice_bloom(&mut self, location: Coord, trigger_house: Option<HouseId>) {
        let is_bloom = self
            .map
            .tile_at(location)
            .is_some_and(Tile::is_spice_bloom);
        if !is_bloom {
            return;
        }

        self.set_terrain_type(location, TerrainType::Spice);
        self.map
            .create_spice_field(location, SPICE_BLOOM_RADIUS, false, &mut self.rng);

        let center = location.tile_center();
        if let Some(tile) = self.map.tile_at_mut(location) {
            tile.add_damage(DamageDecal {
                kind: DecalKind::SandDamage,
                tile: 0,
                real_pos: center,
            });
        }

        tracing::debug!(x = location.x, y = location.y, "Spice bloom erupted");
        self.events.push(GameEvent::Explosion {
            kind: ExplosionKind::SpiceBloom,
            position: center,
            house: trigger_house,
        });
        self.events.push(GameEvent::SpiceBloom {
            location,
            house: trigger_house,
        });
    }

    /// Consume a special bloom and grant a random reward.
    pub fn trigger_special_bloom(&mut self, location: Coord, trigger_house: HouseId) {
        let is_bloom = self
            .map
            .tile_at(location)
            .is_some_and(Tile::is_special_bloom);
        if !is_bloom {
            return;
        }

        self.set_terrain_type(location, TerrainType::Sand);
        self.events.push(GameEvent::SpecialBloom {
            location,
            house: trigger_house,
        });

        let Some(trigger_team) = self.house(trigger_house).map(crate::house::House::team) else {
            return;
        };

        match self.rng.rand(0, 3) {
            0 => {
                let credits = self.rng.rand(SPECIAL_BLOOM_CREDITS.0, SPECIAL_BLOOM_CREDITS.1);
                if let Some(house) = self.house_mut(trigger_house) {
                    house.add_credits(Fixed::from_num(credits), false);
                }
            }
            1 => {
                self.deliver_units(trigger_house, &[ItemId::Trike], location);
            }
            reward => {
                let rivals: Vec<HouseId> = self
                    .houses()
                    .filter(|house| house.team() != trigger_team && house.num_units() > 0)
                    .map(crate::house::House::id)
                    .collect();
                let Some(&rival) = self.rng.pick(&rivals) else {
                    return;
                };
                if reward == 2 {
                    self.deliver_units(rival, &[ItemId::Trike], location);
                } else {
                    self.deliver_units(rival, &[ItemId::Soldier; 3], location);
                }
            }
        }
    }

    /// Radar pixel colour of a tile as seen by `house` (ARGB).
    ///
    /// Updates the tile's remembered fog colour while it is in view.
    pub fn radar_color(&mut self, house: HouseId, location: Coord, radar: bool) -> u32 {
        const BLACK: u32 = 0xFF_00_00_00;
        const WHITE: u32 = 0xFF_FF_FF_FF;

        let debug = self.options.reveal_map;
        let cycle = self.cycle;
        let viewer_team = self.house(house).map_or(0, crate::house::House::team);

        let Some(tile) = self.map.tile_at(location) else {
            return BLACK;
        };
        if !tile.is_explored(house, &self.options) && !debug {
            return BLACK;
        }
        if radar && tile.is_fogged(house, cycle, &self.options) {
            return tile.fog_color();
        }

        let terrain_color = tile.terrain().color();
        let occupant = tile
            .object()
            .and_then(|id| self.objects.get(id))
            .map(|object| (object.item(), object.owner(), object.is_unit()));

        match occupant {
            Some((item, owner, is_unit)) => {
                let color = if item == ItemId::Sandworm {
                    WHITE
                } else {
                    owner.color()
                };
                let fog_color = if is_unit { terrain_color } else { color };
                if let Some(tile) = self.map.tile_at_mut(location) {
                    tile.set_fog_color(fog_color);
                }
                let owner_team = self.house(owner).map_or(0, crate::house::House::team);
                if !radar && !debug && owner_team != viewer_team {
                    BLACK
                } else {
                    color
                }
            }
            None => {
                if let Some(tile) = self.map.tile_at_mut(location) {
                    tile.set_fog_color(terrain_color);
                }
                if !radar && !debug {
                    BLACK
                } else {
                    terrain_color
                }
            }
        }
    }

    /// Reveal tiles around `center` for every house on `house`'s team.
    pub fn view_map_for_team(&mut self, house: HouseId, center: Coord, radius: i32) {
        let Some(team) = self.house(house).map(crate::house::House::team) else {
            return;
        };
        let allies: Vec<HouseId> = self
            .houses()
            .filter(|other| other.id() == house || (team != 0 && other.team() == team))
            .map(crate::house::House::id)
            .collect();
        for ally in allies {
            self.map.view_map(ally, center, radius, self.cycle);
        }
    }
}

/// Distance in world units between two world points.
pub(crate) fn world_distance(a: Coord, b: Coord) -> Fixed {
    let dx = Fixed::from_num(a.x - b.x);
    let dy = Fixed::from_num(a.y - b.y);
    fixed_sqrt(dx * dx + dy * dy)
}

/// Map-wide default unit cap: at least 25, scaled with map area.
#[must_use]
pub fn default_max_units(map: &Map) -> i32 {
    let scaled = crate::data::DEFAULT_MAX_UNITS * map.width() * map.height() / (64 * 64);
    crate::data::DEFAULT_MAX_UNITS.max(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock_ring_map() -> Map {
        // 5x5 sand with a rock wall down column 2
        let mut map = Map::new(5, 5).unwrap();
        let mut rng = GameRng::from_seed(0);
        for y in 0..5 {
            map.set_type(2, y, TerrainType::Rock, &mut rng);
        }
        map
    }

    #[test]
    fn test_invalid_size() {
        assert_eq!(
            Map::new(0, 4),
            Err(GameError::InvalidMapSize {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn test_bounds_are_not_clamped() {
        let map = Map::new(4, 3).unwrap();
        assert!(map.tile(3, 2).is_some());
        assert!(map.tile(4, 2).is_none());
        assert!(map.tile(-1, 0).is_none());
        assert!(!map.tile_exists(0, 3));
    }

    #[test]
    fn test_sand_regions_split_by_rock() {
        let mut map = rock_ring_map();
        map.create_sand_regions();
        assert_eq!(map.num_sand_regions(), 2);
        assert_eq!(map.tile(0, 0).unwrap().sand_region(), Some(0));
        assert_eq!(map.tile(4, 4).unwrap().sand_region(), Some(1));
        assert_eq!(map.tile(2, 2).unwrap().sand_region(), None);
    }

    #[test]
    fn test_spice_field_skips_rock_and_thickens() {
        let mut map = rock_ring_map();
        let mut rng = GameRng::from_seed(5);
        map.create_spice_field(Coord::new(1, 2), 1, false, &mut rng);
        assert!(map.tile(1, 2).unwrap().is_spice());
        assert!(map.tile(0, 2).unwrap().is_spice());
        assert!(map.tile(2, 2).unwrap().is_rock());
        assert!(!map.tile(0, 0).unwrap().is_spice());

        map.create_spice_field(Coord::new(1, 2), 0, false, &mut rng);
        assert!(map.tile(1, 2).unwrap().is_thick_spice());
    }

    #[test]
    fn test_set_type_clears_block_remnants() {
        let mut map = Map::new(6, 6).unwrap();
        let mut rng = GameRng::from_seed(1);
        let decal = DamageDecal {
            kind: DecalKind::SandDamage,
            tile: 0,
            real_pos: Coord::new(0, 0),
        };
        map.tile_mut(4, 4).unwrap().add_damage(decal);
        map.tile_mut(5, 5).unwrap().add_damage(decal);
        map.set_type(1, 1, TerrainType::Rock, &mut rng);
        assert!(map.tile(4, 4).unwrap().damage().is_empty());
        assert_eq!(map.tile(5, 5).unwrap().damage().len(), 1);
    }

    #[test]
    fn test_find_deploy_spot_prefers_origin() {
        let map = Map::new(8, 8).unwrap();
        let mut rng = GameRng::from_seed(3);
        assert_eq!(
            map.find_deploy_spot(ItemId::Trike, Coord::new(3, 3), &mut rng),
            Some(Coord::new(3, 3))
        );
    }

    #[test]
    fn test_find_deploy_spot_uses_first_free_ring() {
        let mut map = Map::new(8, 8).unwrap();
        map.tile_mut(3, 3)
            .unwrap()
            .assign_non_infantry_ground_object(ObjectId(1));
        let mut rng = GameRng::from_seed(3);
        let spot = map
            .find_deploy_spot(ItemId::Tank, Coord::new(3, 3), &mut rng)
            .unwrap();
        assert_ne!(spot, Coord::new(3, 3));
        assert!((spot.x - 3).abs() <= 1 && (spot.y - 3).abs() <= 1);
    }

    #[test]
    fn test_can_pass_rules() {
        let mut map = Map::new(4, 4).unwrap();
        let mut rng = GameRng::from_seed(0);
        map.set_type(0, 0, TerrainType::Mountain, &mut rng);
        assert!(!map.can_pass(ItemId::Tank, Coord::new(0, 0)));
        assert!(map.can_pass(ItemId::Soldier, Coord::new(0, 0)));
        assert!(map.can_pass(ItemId::Ornithopter, Coord::new(0, 0)));
        assert!(!map.can_pass(ItemId::Sandworm, Coord::new(0, 0)));
        assert!(!map.can_pass(ItemId::Tank, Coord::new(9, 9)));
    }

    #[test]
    fn test_view_map_radius() {
        let mut map = Map::new(10, 10).unwrap();
        map.view_map(HouseId::Atreides, Coord::new(5, 5), 2, 40);
        let options = crate::config::GameOptions::default();
        assert!(map.tile(5, 7).unwrap().is_explored(HouseId::Atreides, &options));
        assert!(!map.tile(7, 7).unwrap().is_explored(HouseId::Atreides, &options));
        assert!(!map.tile(5, 5).unwrap().is_explored(HouseId::Ordos, &options));
    }

    #[test]
    fn test_map_roundtrip() {
        let mut map = rock_ring_map();
        map.create_sand_regions();
        map.view_map(HouseId::Harkonnen, Coord::new(1, 1), 1, 9);
        let mut out = OutputStream::new();
        map.save(&mut out, 9);
        let bytes = out.into_bytes();
        let loaded = Map::load(&mut InputStream::new(&bytes)).unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_default_max_units() {
        assert_eq!(default_max_units(&Map::new(32, 32).unwrap()), 25);
        assert_eq!(default_max_units(&Map::new(128, 128).unwrap()), 100);
    }
}
