// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;

use crate::tracker::{EntityManager, Track};
use crate::{Id, Writer};

/// A simple text logger to output messages to a [`Writer`].
///
/// Each message is prefixed with the current simulation time (in
/// picoseconds) and the emitting entity's ID.
pub struct TextTracker {
    entity_manager: EntityManager,

    /// Writer to which all _log_ events will be written.
    writer: RefCell<Writer>,

    /// The last time annotation seen, in picoseconds.
    time_ps: RefCell<u64>,
}

impl TextTracker {
    /// Create a new [`TextTracker`] with an [`EntityManager`].
    pub fn new(entity_manager: EntityManager, writer: Writer) -> Self {
        Self {
            entity_manager,
            writer: RefCell::new(writer),
            time_ps: RefCell::new(0),
        }
    }
}

/// Implementation for each [`Track`] event
impl Track for TextTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.entity_manager.is_enabled(id, level)
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.entity_manager.add_entity(id, entity_name);
        self.writer
            .borrow_mut()
            .write_all(format!("{id}: is {entity_name}\n").as_bytes())
            .unwrap();
    }

    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments) {
        let time_ps = *self.time_ps.borrow();
        self.writer
            .borrow_mut()
            .write_all(format!("{time_ps}ps {msg_by}:{level}: {msg}\n").as_bytes())
            .unwrap();
    }

    fn time(&self, time_ps: u64) {
        *self.time_ps.borrow_mut() = time_ps;
    }

    fn shutdown(&self) {
        self.writer.borrow_mut().flush().unwrap();
    }
}
