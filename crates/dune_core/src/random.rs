//! Seeded random source for the simulation.
//!
//! Gameplay randomness (spice amounts, rocket scatter, bloom rewards, drop
//! zones) must replay identically, so the simulation owns a single ChaCha
//! stream. Its full position is part of the save state.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::math::Fixed;
use crate::stream::{InputStream, OutputStream};

/// Deterministic random number generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRng {
    rng: ChaCha8Rng,
}

impl GameRng {
    /// Create a generator from a 64-bit seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `min..=max`. Returns `min` for an empty range.
    pub fn rand(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Uniform fixed-point value in `[0, 1)`.
    pub fn rand_fixed(&mut self) -> Fixed {
        Fixed::from_bits(i64::from(self.rng.gen::<u32>()))
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.rand(0, items.len() as i32 - 1);
        items.get(index as usize)
    }

    /// Position of the stream, for state hashing.
    #[must_use]
    pub fn word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    /// Write seed, stream and position.
    pub fn save(&self, stream: &mut OutputStream) {
        stream.write_bytes(&self.rng.get_seed());
        stream.write_u64(self.rng.get_stream());
        let pos = self.rng.get_word_pos();
        stream.write_u64(pos as u64);
        stream.write_u64((pos >> 64) as u64);
    }

    /// Restore a generator written by [`GameRng::save`].
    pub fn load(stream: &mut InputStream<'_>) -> Result<Self> {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(stream.read_bytes(32)?);
        let stream_id = stream.read_u64()?;
        let low = stream.read_u64()?;
        let high = stream.read_u64()?;

        let mut rng = ChaCha8Rng::from_seed(seed);
        rng.set_stream(stream_id);
        rng.set_word_pos(u128::from(low) | (u128::from(high) << 64));
        Ok(Self { rng })
    }
}
