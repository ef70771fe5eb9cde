// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;

use crate::tracker::{Track, Tracker};
use crate::{Id, ROOT};

/// A tracker that forwards every event to a set of child trackers.
///
/// ID allocation is owned here so that the children agree on entity IDs.
pub struct MultiTracker {
    trackers: Vec<Tracker>,
    unique_id: RefCell<u64>,
}

impl MultiTracker {
    pub fn new(trackers: Vec<Tracker>) -> Self {
        Self {
            trackers,
            unique_id: RefCell::new(ROOT.0),
        }
    }
}

impl Track for MultiTracker {
    fn unique_id(&self) -> Id {
        let mut guard = self.unique_id.borrow_mut();
        let id = *guard;
        *guard += 1;
        Id(id)
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.trackers.iter().any(|t| t.is_entity_enabled(id, level))
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        for t in &self.trackers {
            t.add_entity(id, entity_name);
        }
    }

    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments) {
        for t in &self.trackers {
            if t.is_entity_enabled(msg_by, level) {
                t.log(msg_by, level, msg);
            }
        }
    }

    fn time(&self, time_ps: u64) {
        for t in &self.trackers {
            t.time(time_ps);
        }
    }

    fn shutdown(&self) {
        for t in &self.trackers {
            t.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use super::*;
    use crate::tracker::{EntityManager, TextTracker, dev_null_tracker};

    struct SharedWriter {
        buffer: Rc<RefCell<Vec<u8>>>,
    }

    impl io::Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn forwards_to_enabled_children() {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let text: Tracker = Rc::new(TextTracker::new(
            EntityManager::new(log::Level::Info),
            Box::new(SharedWriter {
                buffer: buffer.clone(),
            }),
        ));
        let multi = MultiTracker::new(vec![text, dev_null_tracker()]);

        let id = multi.unique_id();
        multi.add_entity(id, "top");
        assert!(multi.is_entity_enabled(id, log::Level::Info));
        assert!(!multi.is_entity_enabled(id, log::Level::Trace));

        multi.log(id, log::Level::Info, format_args!("ping"));
        multi.log(id, log::Level::Trace, format_args!("dropped"));
        multi.shutdown();

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert!(text.contains("ping"));
        assert!(!text.contains("dropped"));
    }
}
