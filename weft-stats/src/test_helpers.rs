// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Helpers shared by the stats tests and by downstream crates' tests.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use weft_track::Writer;

/// The readable side of a [`shared_buffer`] writer.
pub type SharedBuffer = Rc<RefCell<Vec<u8>>>;

struct BufferWriter {
    buffer: SharedBuffer,
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Create an in-memory [`Writer`] and a handle to read back what was
/// written.
#[must_use]
pub fn shared_buffer() -> (Writer, SharedBuffer) {
    let buffer: SharedBuffer = Rc::new(RefCell::new(Vec::new()));
    let writer = Box::new(BufferWriter {
        buffer: buffer.clone(),
    });
    (writer, buffer)
}
