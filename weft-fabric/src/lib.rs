// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The packet pipeline of the WEFT simulator.
//!
//! This crate owns everything between a message leaving a terminal and its
//! flits arriving at the far side:
//!
//!  - [`channel`]: the wire - a latency pipeline carrying flits forward and
//!    credits backward.
//!  - [`router`]: the input-queued, virtual-channel router pipeline
//!    (route, VC allocation, switch allocation, crossbar).
//!  - [`interface`]: the host side - injection queues, ejection reassembly.
//!  - [`network`]: the fabric binder that owns all devices and channels,
//!    publishes the protocol-class to VC map, and toggles the monitoring
//!    window.
//!  - [`arbiter`]: the swappable allocation policies.
//!  - [`routing`]: the routing / injection algorithm contracts and their
//!    name-keyed registries.
//!  - [`topology`]: the topology contract and the torus construction.
//!
//! # Event sub-ordering
//!
//! Within one delivery time, credit returns fire before flit movements,
//! which fire before device pipeline ticks. The constants below are the
//! epsilon values every fabric event is scheduled with.

pub mod arbiter;
pub mod channel;
pub mod interface;
pub mod network;
pub mod router;
pub mod routing;
pub mod topology;

/// Epsilon for credit-return events.
pub const EPSILON_CREDIT: u8 = 0;
/// Epsilon for flit-delivery events.
pub const EPSILON_FLIT: u8 = 1;
/// Epsilon for device pipeline ticks.
pub const EPSILON_TICK: u8 = 2;
