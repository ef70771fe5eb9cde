// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The dispatch contract between the kernel and everything it ticks.

use std::any::Any;
use std::rc::Rc;

use weft_track::entity::Entity;

/// The payload carried by an event.
///
/// Payloads are owned by the event queue from `add_event` until delivery,
/// when ownership moves to the receiver. A payload that is never delivered
/// (queue dropped at teardown) is simply dropped.
pub type EventPayload = Option<Box<dyn Any>>;

/// A simulated component that can receive events.
///
/// `process_event` runs to completion: a handler never suspends, and may
/// schedule any number of future events (including to itself) while it runs.
pub trait Component {
    /// The entity that identifies this component in the hierarchy.
    fn entity(&self) -> &Rc<Entity>;

    /// Handle one event. `kind` is the component-private event type the
    /// scheduler passed through unchanged.
    fn process_event(&self, payload: EventPayload, kind: u32);
}
