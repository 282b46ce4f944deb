//! Deterministic seeded random number generator.
//!
//! The generator state lives inside [`WorldState`](crate::world::WorldState)
//! and is captured by snapshots, so a restored world continues the exact
//! same sequence. Uses xorshift64* for cheap, portable output.

use serde::{Deserialize, Serialize};

/// Serializable xorshift64* generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Creates a new RNG with the given seed.
    ///
    /// A zero seed would lock xorshift at zero forever, so it is remapped.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Returns the next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Returns a value in `0..bound`; zero when `bound` is zero.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (((self.next_u64() >> 32) * u64::from(bound)) >> 32) as u32
    }

    /// Returns a value in `min..=max` (arguments may be given in either order).
    pub fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = hi - lo;
        if span == u32::MAX {
            return (self.next_u64() >> 32) as u32;
        }
        lo + self.next_below(span + 1)
    }

    /// Rolls a percentage chance; 100 and above always succeeds.
    pub fn roll_percent(&mut self, chance: u8) -> bool {
        if chance >= 100 {
            // Still advance the stream so table order does not shift results.
            self.next_u64();
            return true;
        }
        self.next_below(100) < u32::from(chance)
    }

    /// Current internal state (for hashing and debugging).
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}
