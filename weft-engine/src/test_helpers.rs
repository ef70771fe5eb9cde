// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Helpers shared by the engine tests and by downstream crates' tests.

use std::cell::RefCell;
use std::rc::Rc;

use weft_track::entity::Entity;
use weft_track::tracker::dev_null_tracker;

use crate::component::{Component, EventPayload};
use crate::engine::Simulator;
use crate::time::ClockPeriods;

/// Create a [`Simulator`] with suppressed logging, 1ns clocks and a fixed
/// seed.
#[must_use]
pub fn start_test() -> Rc<Simulator> {
    start_test_with_seed(0xBAADF00D)
}

/// Create a [`Simulator`] with suppressed logging, 1ns clocks and the given
/// seed.
#[must_use]
pub fn start_test_with_seed(seed: u64) -> Rc<Simulator> {
    let tracker = dev_null_tracker();
    Simulator::new(&tracker, ClockPeriods::default(), seed)
}

/// A component that records the `(time, kind)` of every event it receives.
pub struct Recorder {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    seen: RefCell<Vec<(u64, u32)>>,
}

impl Recorder {
    pub fn new_and_register(sim: &Rc<Simulator>, parent: &Rc<Entity>, name: &str) -> Rc<Self> {
        Rc::new(Self {
            entity: Rc::new(Entity::new(parent, name)),
            sim: sim.clone(),
            seen: RefCell::new(Vec::new()),
        })
    }

    /// Everything received so far.
    pub fn seen(&self) -> Vec<(u64, u32)> {
        self.seen.borrow().clone()
    }
}

impl Component for Recorder {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, _payload: EventPayload, kind: u32) {
        self.seen.borrow_mut().push((self.sim.time(), kind));
    }
}
