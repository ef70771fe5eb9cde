// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Per-channel utilization log.

use std::cell::RefCell;

use weft_track::Writer;

/// Sink for one utilization record per monitored channel.
pub trait ChannelLog {
    /// Record one channel: `flits` delivered over `cycles` monitored cycles.
    fn log_channel(&self, name: &str, flits: u64, cycles: u64);

    /// Flush any buffered output.
    fn shutdown(&self);
}

/// CSV file sink: `name,flits,cycles,utilization`.
pub struct CsvChannelLog {
    writer: RefCell<Writer>,
}

impl CsvChannelLog {
    pub fn new(mut writer: Writer) -> Self {
        writer.write_all(b"name,flits,cycles,utilization\n").unwrap();
        Self {
            writer: RefCell::new(writer),
        }
    }
}

impl ChannelLog for CsvChannelLog {
    fn log_channel(&self, name: &str, flits: u64, cycles: u64) {
        let utilization = if cycles > 0 {
            flits as f64 / cycles as f64
        } else {
            0.0
        };
        self.writer
            .borrow_mut()
            .write_all(format!("{name},{flits},{cycles},{utilization:.6}\n").as_bytes())
            .unwrap();
    }

    fn shutdown(&self) {
        self.writer.borrow_mut().flush().unwrap();
    }
}

/// Sink that discards everything.
#[derive(Default)]
pub struct NullChannelLog;

impl ChannelLog for NullChannelLog {
    fn log_channel(&self, _name: &str, _flits: u64, _cycles: u64) {}
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::shared_buffer;

    #[test]
    fn csv_rows() {
        let (writer, buffer) = shared_buffer();
        let log = CsvChannelLog::new(writer);
        log.log_channel("top::net::ch_0", 50, 200);
        log.log_channel("top::net::ch_1", 0, 0);
        log.shutdown();

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "name,flits,cycles,utilization\n\
             top::net::ch_0,50,200,0.250000\n\
             top::net::ch_1,0,0,0.000000\n"
        );
    }
}
