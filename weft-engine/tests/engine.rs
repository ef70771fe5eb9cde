// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use weft_engine::component::{Component, EventPayload};
use weft_engine::engine::Simulator;
use weft_engine::test_helpers::{Recorder, start_test};
use weft_engine::time::Clock;
use weft_track::entity::Entity;

#[test]
fn events_fire_in_time_order() {
    let sim = start_test();
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(3000, 0, recorder.clone(), None, 3);
    sim.add_event(1000, 0, recorder.clone(), None, 1);
    sim.add_event(2000, 0, recorder.clone(), None, 2);
    sim.run();

    assert_eq!(recorder.seen(), vec![(1000, 1), (2000, 2), (3000, 3)]);
}

#[test]
fn epsilon_orders_within_a_time() {
    let sim = start_test();
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(1000, 2, recorder.clone(), None, 30);
    sim.add_event(1000, 0, recorder.clone(), None, 10);
    sim.add_event(1000, 1, recorder.clone(), None, 20);
    sim.run();

    assert_eq!(recorder.seen(), vec![(1000, 10), (1000, 20), (1000, 30)]);
}

#[test]
fn insertion_order_breaks_ties() {
    let sim = start_test();
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    for kind in 0..10 {
        sim.add_event(1000, 0, recorder.clone(), None, kind);
    }
    sim.run();

    let kinds: Vec<u32> = recorder.seen().iter().map(|&(_, k)| k).collect();
    assert_eq!(kinds, (0..10).collect::<Vec<u32>>());
}

#[test]
#[should_panic(expected = "event scheduled in the past")]
fn scheduling_in_the_past_is_fatal() {
    let sim = start_test();
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(2000, 0, recorder.clone(), None, 0);
    sim.run();
    sim.add_event(1000, 0, recorder, None, 0);
}

#[test]
fn deadline_stops_delivery() {
    let sim = start_test();
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(1000, 0, recorder.clone(), None, 1);
    sim.add_event(5000, 0, recorder.clone(), None, 2);
    sim.set_deadline(2000);
    sim.run();

    assert_eq!(recorder.seen(), vec![(1000, 1)]);
    assert_eq!(sim.time(), 2000);
    assert_eq!(sim.pending_events(), 1);
}

/// A component that reschedules itself a fixed number of times, then
/// optionally halts the simulator.
struct Repeater {
    entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<Repeater>,
    remaining: RefCell<u32>,
    fired: RefCell<Vec<u64>>,
    halt_when_done: bool,
}

impl Repeater {
    fn new(sim: &Rc<Simulator>, count: u32, halt_when_done: bool) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            entity: Rc::new(Entity::new(sim.top(), "repeater")),
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            remaining: RefCell::new(count),
            fired: RefCell::new(Vec::new()),
            halt_when_done,
        })
    }
}

impl Component for Repeater {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, _payload: EventPayload, _kind: u32) {
        self.fired.borrow_mut().push(self.sim.time());
        let mut remaining = self.remaining.borrow_mut();
        *remaining -= 1;
        if *remaining > 0 {
            // Reentrant scheduling from within a handler.
            let next = self.sim.future_cycle(Clock::Terminal, 1);
            let component = self.self_ref.upgrade().unwrap();
            self.sim.add_event(next, 0, component, None, 0);
        } else if self.halt_when_done {
            self.sim.halt();
        }
    }
}

#[test]
fn reentrant_scheduling() {
    let sim = start_test();
    let repeater = Repeater::new(&sim, 4, false);

    sim.add_event(0, 0, repeater.clone(), None, 0);
    sim.run();

    assert_eq!(*repeater.fired.borrow(), vec![0, 1000, 2000, 3000]);
}

#[test]
fn halt_stops_the_run() {
    let sim = start_test();
    let repeater = Repeater::new(&sim, 2, true);
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(0, 0, repeater.clone(), None, 0);
    // Would fire long after the repeater halts.
    sim.add_event(1_000_000, 0, recorder.clone(), None, 9);
    sim.run();

    assert_eq!(*repeater.fired.borrow(), vec![0, 1000]);
    assert!(recorder.seen().is_empty());
}

#[test]
fn payloads_move_to_the_receiver() {
    struct Taker {
        entity: Rc<Entity>,
        got: RefCell<Option<String>>,
    }
    impl Component for Taker {
        fn entity(&self) -> &Rc<Entity> {
            &self.entity
        }
        fn process_event(&self, payload: EventPayload, _kind: u32) {
            let boxed = payload.unwrap().downcast::<String>().unwrap();
            *self.got.borrow_mut() = Some(*boxed);
        }
    }

    let sim = start_test();
    let taker = Rc::new(Taker {
        entity: Rc::new(Entity::new(sim.top(), "taker")),
        got: RefCell::new(None),
    });
    sim.add_event(
        500,
        0,
        taker.clone(),
        Some(Box::new(String::from("hello"))),
        7,
    );
    sim.run();
    assert_eq!(taker.got.borrow().as_deref(), Some("hello"));
}
