//! xorshift64* random number generator
//!
//! Each generator remembers its seed. [`RngManager::reseed`] rewinds it, which
//! is what components call from their reset hook.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use queueing_simulator_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let first = rng.next_u64();
/// rng.next_u64();
/// rng.reseed();
/// assert_eq!(rng.next_u64(), first);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Seed given at construction
    seed: u64,
    /// Internal state (64-bit, never zero)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is mapped to 1 (xorshift state must be non-zero).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { seed, state }
    }

    /// Seed given at construction
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rewind to the construction seed
    pub fn reseed(&mut self) {
        self.state = if self.seed == 0 { 1 } else { self.seed };
    }

    /// Generate next random u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next_u64();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Uniform index in `[0, n)`
    ///
    /// # Panics
    /// Panics if `n` is zero
    pub fn index(&mut self, n: usize) -> usize {
        assert!(n > 0, "cannot pick from an empty range");
        (self.next_u64() % n as u64) as usize
    }

    /// True with probability `p`; `p <= 0` never fires and `p >= 1` always does
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}
