// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Per-hop traffic accounting.

use std::cell::RefCell;
use std::collections::BTreeMap;

use weft_track::Writer;

/// Sink for flit movements through a device, keyed by the full
/// `(input port, input VC) -> (output port, output VC)` hop.
pub trait TrafficLog {
    /// Count `flits` crossing the given hop of `device`.
    fn log_traffic(
        &self,
        device: &str,
        input_port: u32,
        input_vc: u32,
        output_port: u32,
        output_vc: u32,
        flits: u32,
    );

    /// Write out the accumulated counts and flush.
    fn shutdown(&self);
}

type HopKey = (String, u32, u32, u32, u32);

/// CSV file sink: `device,input_port,input_vc,output_port,output_vc,flits`.
///
/// Counts are accumulated and written sorted at shutdown so that the file
/// contents are a pure function of the traffic, not of event order.
pub struct CsvTrafficLog {
    writer: RefCell<Writer>,
    counts: RefCell<BTreeMap<HopKey, u64>>,
}

impl CsvTrafficLog {
    pub fn new(writer: Writer) -> Self {
        Self {
            writer: RefCell::new(writer),
            counts: RefCell::new(BTreeMap::new()),
        }
    }
}

impl TrafficLog for CsvTrafficLog {
    fn log_traffic(
        &self,
        device: &str,
        input_port: u32,
        input_vc: u32,
        output_port: u32,
        output_vc: u32,
        flits: u32,
    ) {
        let key = (device.to_string(), input_port, input_vc, output_port, output_vc);
        *self.counts.borrow_mut().entry(key).or_insert(0) += u64::from(flits);
    }

    fn shutdown(&self) {
        let mut writer = self.writer.borrow_mut();
        writer
            .write_all(b"device,input_port,input_vc,output_port,output_vc,flits\n")
            .unwrap();
        for ((device, ip, ivc, op, ovc), flits) in self.counts.borrow().iter() {
            writer
                .write_all(format!("{device},{ip},{ivc},{op},{ovc},{flits}\n").as_bytes())
                .unwrap();
        }
        writer.flush().unwrap();
    }
}

/// Sink that discards everything.
#[derive(Default)]
pub struct NullTrafficLog;

impl TrafficLog for NullTrafficLog {
    fn log_traffic(&self, _: &str, _: u32, _: u32, _: u32, _: u32, _: u32) {}
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::shared_buffer;

    #[test]
    fn counts_accumulate_and_sort() {
        let (writer, buffer) = shared_buffer();
        let log = CsvTrafficLog::new(writer);
        log.log_traffic("top::r1", 1, 0, 2, 1, 3);
        log.log_traffic("top::r0", 0, 0, 1, 0, 1);
        log.log_traffic("top::r1", 1, 0, 2, 1, 2);
        log.shutdown();

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "device,input_port,input_vc,output_port,output_vc,flits\n\
             top::r0,0,0,1,0,1\n\
             top::r1,1,0,2,1,5\n"
        );
    }
}
