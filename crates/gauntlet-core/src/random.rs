//! Injectable randomness.
//!
//! Every draw in the game goes through [`RandomSource`] so that a seeded or
//! fixed source makes outcomes reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of uniform values in `[0, 1)`.
pub trait RandomSource {
    /// Next uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform value in `[0, 100)`.
    fn next_percent(&mut self) -> f64 {
        self.next_unit() * 100.0
    }

    /// Uniform index in `0..len`. `len` must be > 0.
    fn next_index(&mut self, len: usize) -> usize {
        let i = (self.next_unit() * len as f64) as usize;
        i.min(len.saturating_sub(1))
    }
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

impl<T: RandomSource + ?Sized> RandomSource for Box<T> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// ChaCha8-backed source seeded for reproducibility.
#[derive(Clone, Debug)]
pub struct SeededRandom(ChaCha8Rng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.gen_range(0.0..1.0)
    }
}

/// Always yields the same value; clamped into `[0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        if self.0.is_finite() {
            self.0.clamp(0.0, 1.0 - f64::EPSILON)
        } else {
            0.0
        }
    }
}
