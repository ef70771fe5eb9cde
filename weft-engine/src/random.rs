// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The process-wide deterministic random stream.
//!
//! There is exactly one stream per simulation, seeded once. Every draw is
//! made from inside an event handler, and execution is single-threaded, so
//! the sequence of draws is a pure function of the event order and thus of
//! the seed and inputs.

use std::cell::RefCell;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// The shared random stream.
pub struct Random {
    rng: RefCell<Xoshiro256PlusPlus>,
}

impl Random {
    /// Seed the stream.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RefCell::new(Xoshiro256PlusPlus::seed_from_u64(seed)),
        }
    }

    /// A uniform draw from the inclusive range `[lo, hi]`.
    pub fn next_u64(&self, lo: u64, hi: u64) -> u64 {
        assert!(lo <= hi);
        self.rng.borrow_mut().gen_range(lo..=hi)
    }

    /// A uniform draw from `[0.0, 1.0)`.
    pub fn next_f64(&self) -> f64 {
        self.rng.borrow_mut().gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = Random::new(0xBAADF00D);
        let b = Random::new(0xBAADF00D);
        for _ in 0..100 {
            assert_eq!(a.next_u64(0, 1000), b.next_u64(0, 1000));
        }
    }

    #[test]
    fn ranges_are_inclusive() {
        let r = Random::new(1);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[r.next_u64(0, 3) as usize] = true;
        }
        assert_eq!(seen, [true; 4]);
    }
}
