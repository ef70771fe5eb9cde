// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;

use crate::tracker::Track;
use crate::{Id, ROOT};

/// A tracker that suppresses all log events.
///
/// Unique IDs are still allocated so that entities remain distinguishable.
#[derive(Default)]
pub struct DevNullTracker {
    unique_id: RefCell<u64>,
}

impl Track for DevNullTracker {
    fn unique_id(&self) -> Id {
        let mut guard = self.unique_id.borrow_mut();
        let id = *guard + ROOT.0;
        *guard += 1;
        Id(id)
    }

    fn is_entity_enabled(&self, _id: Id, _level: log::Level) -> bool {
        false
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {}

    fn log(&self, _msg_by: Id, _level: log::Level, _msg: std::fmt::Arguments) {}

    fn time(&self, _time_ps: u64) {}

    fn shutdown(&self) {}
}
