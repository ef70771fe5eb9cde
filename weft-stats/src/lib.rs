// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Statistics sinks for the WEFT simulator.
//!
//! Three append-only sinks sit behind narrow traits so that the fabric and
//! the workload never know whether they are writing to a file or to
//! nowhere:
//!
//!  - [`ChannelLog`](crate::channel_log::ChannelLog): per-channel
//!    utilization over the monitoring window.
//!  - [`TrafficLog`](crate::traffic_log::TrafficLog): per
//!    `(device, input port, input VC, output port, output VC)` flit counts.
//!  - [`MessageLog`](crate::message_log::MessageLog): per-transaction and
//!    per-message records.
//!
//! All sinks honor the monitoring window: the callers only emit samples
//! between `start_monitoring` and `end_monitoring` on the network, and only
//! for transactions tagged during the logging phase. Output formats are
//! stable across runs; two runs with the same settings and seed produce
//! byte-identical files.

pub mod channel_log;
pub mod message_log;
pub mod test_helpers;
pub mod traffic_log;
