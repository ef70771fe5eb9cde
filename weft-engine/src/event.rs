// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The event record and its total order.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::component::{Component, EventPayload};

/// One scheduled event.
///
/// Events are ordered by `(time, epsilon, sequence)`; the component, payload
/// and kind never take part in ordering.
pub struct Event {
    /// Absolute delivery time in picoseconds.
    pub time: u64,

    /// Sub-ordering within one delivery time.
    pub epsilon: u8,

    /// Monotone insertion counter; the final tiebreak.
    pub sequence: u64,

    /// The component `process_event` is invoked on.
    pub component: Rc<dyn Component>,

    /// Opaque payload handed to the component.
    pub payload: EventPayload,

    /// Component-private event type.
    pub kind: u32,
}

impl Event {
    fn key(&self) -> (u64, u8, u64) {
        (self.time, self.epsilon, self.sequence)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::test_helpers::{Recorder, start_test};

    #[test]
    fn ordering_is_time_epsilon_sequence() {
        let sim = start_test();
        let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");
        let c: Rc<dyn Component> = recorder;

        let ev = |time, epsilon, sequence| Event {
            time,
            epsilon,
            sequence,
            component: c.clone(),
            payload: None,
            kind: 0,
        };

        assert!(ev(1, 0, 0) < ev(2, 0, 0));
        assert!(ev(2, 0, 9) < ev(2, 1, 0));
        assert!(ev(2, 1, 3) < ev(2, 1, 4));
        assert!(ev(3, 0, 0) == ev(3, 0, 0));
    }
}
