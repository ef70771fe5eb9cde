// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Per-transaction, per-message latency log.

use std::cell::RefCell;

use weft_protocols::message::Message;
use weft_track::Writer;

/// Sink for the message log.
///
/// Only transactions started during the logging phase are recorded; the
/// workload tags them and calls `start_transaction` / `end_transaction`
/// around the `log_message` calls for their messages.
pub trait MessageLog {
    /// A tagged transaction began.
    fn start_transaction(&self, transaction: u64);

    /// A message of a tagged transaction was delivered.
    fn log_message(&self, message: &Message);

    /// A tagged transaction completed.
    fn end_transaction(&self, transaction: u64);

    /// Flush any buffered output.
    fn shutdown(&self);
}

/// Plain-text file sink.
///
/// Record formats (times in picoseconds):
///
/// ```text
/// +<transaction>
/// m,<source>,<destination>,<transaction>,<opcode>,<create>,<inject>,<deliver>
/// -<transaction>
/// ```
///
/// The `m` record's three times delimit the phases: terminal queueing
/// (`create` to `inject`) and network transit (`inject` to `deliver`).
pub struct FileMessageLog {
    writer: RefCell<Writer>,
}

impl FileMessageLog {
    pub fn new(writer: Writer) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }
}

impl MessageLog for FileMessageLog {
    fn start_transaction(&self, transaction: u64) {
        self.writer
            .borrow_mut()
            .write_all(format!("+{transaction}\n").as_bytes())
            .unwrap();
    }

    fn log_message(&self, message: &Message) {
        self.writer
            .borrow_mut()
            .write_all(
                format!(
                    "m,{},{},{},{},{},{},{}\n",
                    message.source(),
                    message.destination(),
                    message.transaction,
                    message.opcode,
                    message.create_time(),
                    message.inject_time(),
                    message.deliver_time()
                )
                .as_bytes(),
            )
            .unwrap();
    }

    fn end_transaction(&self, transaction: u64) {
        self.writer
            .borrow_mut()
            .write_all(format!("-{transaction}\n").as_bytes())
            .unwrap();
    }

    fn shutdown(&self) {
        self.writer.borrow_mut().flush().unwrap();
    }
}

/// Sink that discards everything.
#[derive(Default)]
pub struct NullMessageLog;

impl MessageLog for NullMessageLog {
    fn start_transaction(&self, _transaction: u64) {}
    fn log_message(&self, _message: &Message) {}
    fn end_transaction(&self, _transaction: u64) {}
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::shared_buffer;

    #[test]
    fn record_formats() {
        let (writer, buffer) = shared_buffer();
        let log = FileMessageLog::new(writer);

        let (message, _flits) = Message::assemble(0, 0xFA, 77, 4, 4).unwrap();
        message.set_send_info(9, 2, 5, 1000);
        message.mark_injected(2000);
        message.mark_delivered(8000);

        log.start_transaction(77);
        log.log_message(&message);
        log.end_transaction(77);
        log.shutdown();

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(text, "+77\nm,2,5,77,250,1000,2000,8000\n-77\n");
    }
}
