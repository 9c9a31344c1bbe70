//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A game restored from a save must continue exactly like the game that
//! was saved. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`dune_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted object id order.
//!
//! - **System randomness**: All "random" behavior draws from the single
//!   seeded stream owned by the simulation, and that stream is saved.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual module determinism (bullets, triggers, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use dune_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use dune_test_utils::determinism::verify_determinism;
/// use dune_test_utils::fixtures::skirmish_battle;
///
/// let result = verify_determinism(
///     3,  // Run 3 times
///     50, // 50 ticks each
///     || skirmish_battle(7),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// This is useful for catching non-determinism that only manifests
/// under thread scheduling variations, memory layout differences, etc.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// Useful for debugging non-determinism by finding exactly when
/// simulations start to differ.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    // Check initial state
    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let events1 = sim1.tick();
        let events2 = sim2.tick();

        if events1 != events2 || sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a save taken after `save_at` ticks continues exactly like
/// the original for another `continue_for` ticks.
pub fn verify_save_determinism<F>(setup_fn: F, save_at: u64, continue_for: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..save_at {
        sim.tick();
    }

    // Pending events are not part of the saved state.
    sim.drain_events();
    let bytes = sim.save();
    let Ok(mut restored) = Simulation::load(&bytes) else {
        return false;
    };

    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..continue_for {
        if sim.tick() != restored.tick() {
            return false;
        }
    }

    sim.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use dune_core::bullet::BulletType;
    use dune_core::data::{HouseId, ItemId};
    use dune_core::math::{Coord, Fixed};
    use dune_core::tile::TerrainType;
    use proptest::prelude::*;

    /// Generate a fixed-point number in a range of plausible credit amounts.
    pub fn arb_credits() -> impl Strategy<Value = Fixed> {
        (0i32..10_000i32).prop_map(Fixed::from_num)
    }

    /// Generate a tile coordinate inside a `width` x `height` map.
    pub fn arb_tile(width: i32, height: i32) -> impl Strategy<Value = Coord> {
        (0..width, 0..height).prop_map(|(x, y)| Coord::new(x, y))
    }

    /// Generate any house.
    pub fn arb_house() -> impl Strategy<Value = HouseId> {
        prop::sample::select(HouseId::ALL.to_vec())
    }

    /// Generate a ground unit type.
    pub fn arb_ground_unit() -> impl Strategy<Value = ItemId> {
        prop::sample::select(vec![
            ItemId::Soldier,
            ItemId::Trooper,
            ItemId::Trike,
            ItemId::Quad,
            ItemId::Tank,
            ItemId::SiegeTank,
            ItemId::Launcher,
            ItemId::Harvester,
        ])
    }

    /// Generate a terrain type that can be painted onto a map.
    pub fn arb_terrain() -> impl Strategy<Value = TerrainType> {
        prop::sample::select(vec![
            TerrainType::Sand,
            TerrainType::Dunes,
            TerrainType::Rock,
            TerrainType::Mountain,
            TerrainType::Spice,
            TerrainType::ThickSpice,
        ])
    }

    /// Generate a projectile type.
    pub fn arb_bullet() -> impl Strategy<Value = BulletType> {
        prop::sample::select(vec![
            BulletType::SmallRocket,
            BulletType::TurretRocket,
            BulletType::LargeRocket,
            BulletType::Rocket,
            BulletType::DRocket,
            BulletType::Sonic,
            BulletType::ShellSmall,
            BulletType::ShellMedium,
            BulletType::ShellLarge,
            BulletType::ShellTurret,
        ])
    }

    /// Generate a seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// A ground unit to place.
    #[derive(Debug, Clone)]
    pub struct TestUnitParams {
        /// Owner.
        pub house: HouseId,
        /// Type.
        pub item: ItemId,
        /// Tile.
        pub tile: Coord,
    }

    /// Generate a unit placement on a `width` x `height` map.
    pub fn arb_unit_params(width: i32, height: i32) -> impl Strategy<Value = TestUnitParams> {
        (arb_house(), arb_ground_unit(), arb_tile(width, height))
            .prop_map(|(house, item, tile)| TestUnitParams { house, item, tile })
    }

    /// Generate a list of unit placements.
    pub fn arb_unit_list(
        width: i32,
        height: i32,
        max_units: usize,
    ) -> impl Strategy<Value = Vec<TestUnitParams>> {
        proptest::collection::vec(arb_unit_params(width, height), 1..max_units)
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{sample_simulation, sandbox, skirmish_battle};
    use dune_core::config::GameOptions;
    use dune_core::math::Coord;
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(
            || Simulation::new(16, 16, GameOptions::default(), 0).unwrap(),
            100
        ));
    }

    #[test]
    fn test_skirmish_determinism() {
        let result = verify_determinism(
            4,
            300,
            || skirmish_battle(11),
            |sim| {
                sim.tick();
            },
            Simulation::state_hash,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = skirmish_battle(1);
        let mut b = skirmish_battle(2);
        for _ in 0..40 {
            a.tick();
            b.tick();
        }
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        let divergence = find_first_divergence(|| skirmish_battle(3), 200);
        assert!(divergence.is_none(), "Expected no divergence");
    }

    // =========================================================================
    // Save round-trip tests
    // =========================================================================

    #[test]
    fn test_save_preserves_empty_sim() {
        assert!(verify_save_determinism(
            || Simulation::new(8, 8, GameOptions::default(), 5).unwrap(),
            0,
            10
        ));
    }

    #[test]
    fn test_save_preserves_battle_mid_flight() {
        assert!(verify_save_determinism(|| skirmish_battle(4), 7, 200));
    }

    #[test]
    fn test_save_preserves_scenario() {
        assert!(verify_save_determinism(sample_simulation, 50, 500));
    }

    // =========================================================================
    // Parallel tests
    // =========================================================================

    #[test]
    fn test_parallel_scoped() {
        let result = run_parallel_simulations_scoped(|| skirmish_battle(9), 4, 150);
        assert_eq!(result.num_sims, 4);
        result.assert_deterministic();
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&42u32), compute_hash(&42u32));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_random_armies_are_deterministic(
            seed in arb_seed(),
            units in arb_unit_list(24, 24, 12),
        ) {
            let setup = || {
                let mut sim = sandbox(24, 24, seed);
                for unit in &units {
                    let _ = sim.place_unit(unit.house, unit.item, unit.tile.x, unit.tile.y);
                }
                sim
            };
            prop_assert!(verify_simulation_determinism(setup, 60));
        }

        #[test]
        fn prop_random_bullets_survive_save(
            seed in arb_seed(),
            bullet in arb_bullet(),
            from in arb_tile(24, 24),
            to in arb_tile(24, 24),
        ) {
            let setup = || {
                let mut sim = sandbox(24, 24, seed);
                sim.fire_bullet(
                    None,
                    from.tile_center(),
                    to.tile_center(),
                    bullet,
                    50,
                    false,
                );
                sim
            };
            prop_assert!(verify_save_determinism(setup, 3, 80));
        }

        #[test]
        fn prop_painted_maps_round_trip(
            seed in arb_seed(),
            strokes in proptest::collection::vec((arb_tile(16, 16), arb_terrain()), 0..40),
        ) {
            let setup = || {
                let mut sim = sandbox(16, 16, seed);
                for (tile, terrain) in &strokes {
                    sim.set_terrain_type(Coord::new(tile.x, tile.y), *terrain);
                }
                sim.map_mut().create_sand_regions();
                sim
            };
            prop_assert!(verify_save_determinism(setup, 0, 5));
        }
    }
}
