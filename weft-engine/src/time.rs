// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The logical clocks of a simulation.
//!
//! Time is a count of picoseconds held in a `u64`. Each clock has an integer
//! period in picoseconds and an epoch of 0; cycle arithmetic is exact and
//! clocks never drift.

/// The fixed set of named clocks.
///
/// Every device ticks on one of these; the periods come from the settings
/// document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clock {
    /// The clock channels (and devices pushing flits into them) tick on.
    Channel = 0,
    /// The router pipeline clock.
    Router = 1,
    /// The interface injection/ejection clock.
    Interface = 2,
    /// The clock terminals issue work on.
    Terminal = 3,
}

/// Number of [`Clock`]s.
pub const NUM_CLOCKS: usize = 4;

/// Clock periods in picoseconds, indexed by [`Clock`].
#[derive(Clone, Copy, Debug)]
pub struct ClockPeriods(pub [u64; NUM_CLOCKS]);

impl ClockPeriods {
    /// Create a set of periods; every period must be non-zero.
    #[must_use]
    pub fn new(channel: u64, router: u64, interface: u64, terminal: u64) -> Self {
        let periods = [channel, router, interface, terminal];
        assert!(periods.iter().all(|&p| p > 0), "clock period must be > 0");
        Self(periods)
    }

    /// The period of the given clock in picoseconds.
    #[must_use]
    pub fn period(&self, clock: Clock) -> u64 {
        self.0[clock as usize]
    }
}

/// A single period of 1ns for every clock.
impl Default for ClockPeriods {
    fn default() -> Self {
        Self::new(1000, 1000, 1000, 1000)
    }
}
