// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Workloads for the WEFT simulator.
//!
//! The [workload](crate::workload::Workload) drives the measurement phases
//! of a run: it owns the application, opens and closes the network's
//! monitoring window around the logging phase, and finalizes the message
//! log. The shipped application is [blast](crate::blast): every terminal
//! issues transactions at a configured injection rate, warms up until its
//! enroute flit count stops growing (or declares saturation), logs a fixed
//! number of transactions, and drains.
//!
//! Traffic patterns and message-size distributions are narrow, name-keyed
//! extension points; see [`traffic`] and [`size`].

pub mod blast;
pub mod size;
pub mod terminal;
pub mod traffic;
pub mod warmup;
pub mod workload;
