// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The simulator: event queue, clocks and the run loop.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use weft_track::Tracker;
use weft_track::entity::{Entity, toplevel};

use crate::component::{Component, EventPayload};
use crate::event::Event;
use crate::random::Random;
use crate::time::{Clock, ClockPeriods};

/// The global, deterministic event scheduler.
///
/// One `Simulator` exists per run, wrapped in an `Rc` and passed explicitly
/// to every component at construction. It owns the event queue, the
/// [clocks](crate::time), and the single [random stream](crate::random).
pub struct Simulator {
    queue: RefCell<BinaryHeap<Reverse<Event>>>,
    sequence: Cell<u64>,
    now: Cell<u64>,
    halted: Cell<bool>,
    deadline: Cell<Option<u64>>,
    executed: Cell<u64>,
    periods: ClockPeriods,

    /// The shared random stream; see [`Random`].
    pub random: Random,

    toplevel: Rc<Entity>,
    tracker: Tracker,
}

impl Simulator {
    /// Create a simulator with the given clock periods and seed.
    #[must_use]
    pub fn new(tracker: &Tracker, periods: ClockPeriods, seed: u64) -> Rc<Self> {
        let top = toplevel(tracker, "top");
        Rc::new(Self {
            queue: RefCell::new(BinaryHeap::new()),
            sequence: Cell::new(0),
            now: Cell::new(0),
            halted: Cell::new(false),
            deadline: Cell::new(None),
            executed: Cell::new(0),
            periods,
            random: Random::new(seed),
            toplevel: top,
            tracker: tracker.clone(),
        })
    }

    /// The current simulation time in picoseconds.
    pub fn time(&self) -> u64 {
        self.now.get()
    }

    /// The period of the given clock in picoseconds.
    pub fn cycle_time(&self, clock: Clock) -> u64 {
        self.periods.period(clock)
    }

    /// The current cycle number of the given clock.
    pub fn cycle(&self, clock: Clock) -> u64 {
        self.now.get() / self.periods.period(clock)
    }

    /// The absolute time of the `cycles`-th cycle boundary of `clock` at or
    /// after the current time: `ceil(now / period) * period + n * period`.
    pub fn future_cycle(&self, clock: Clock, cycles: u64) -> u64 {
        let period = self.periods.period(clock);
        let now = self.now.get();
        now.div_ceil(period) * period + cycles * period
    }

    /// Schedule an event. Scheduling in the past is fatal.
    pub fn add_event(
        &self,
        time: u64,
        epsilon: u8,
        component: Rc<dyn Component>,
        payload: EventPayload,
        kind: u32,
    ) {
        assert!(
            time >= self.now.get(),
            "{}: event scheduled in the past ({} < {})",
            component.entity(),
            time,
            self.now.get()
        );
        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);
        self.queue.borrow_mut().push(Reverse(Event {
            time,
            epsilon,
            sequence,
            component,
            payload,
            kind,
        }));
    }

    /// Run until the queue is empty, the deadline is reached, or a component
    /// calls [`halt`](Self::halt).
    pub fn run(&self) {
        loop {
            if self.halted.get() {
                break;
            }

            let event = {
                let mut queue = self.queue.borrow_mut();
                if let Some(Reverse(head)) = queue.peek() {
                    if let Some(deadline) = self.deadline.get() {
                        if head.time > deadline {
                            self.now.set(deadline);
                            break;
                        }
                    }
                }
                queue.pop()
            };

            let Some(Reverse(event)) = event else {
                break;
            };

            debug_assert!(event.time >= self.now.get());
            if event.time != self.now.get() {
                self.now.set(event.time);
                self.tracker.time(event.time);
            }
            self.executed.set(self.executed.get() + 1);
            let component = event.component.clone();
            component.process_event(event.payload, event.kind);
        }
    }

    /// Stop the run loop before the next event.
    pub fn halt(&self) {
        self.halted.set(true);
    }

    /// Set an absolute time after which no events will be delivered.
    pub fn set_deadline(&self, time: u64) {
        self.deadline.set(Some(time));
    }

    /// The number of events executed so far.
    pub fn executed_events(&self) -> u64 {
        self.executed.get()
    }

    /// The number of events currently queued.
    pub fn pending_events(&self) -> usize {
        self.queue.borrow().len()
    }

    /// The top-level entity all components descend from.
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    /// The [`Tracker`] shared by all entities.
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }
}
