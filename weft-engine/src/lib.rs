// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! `WEFT` engine - the discrete-event kernel.
//!
//! This library provides the [`Simulator`](crate::engine::Simulator): a
//! global, deterministic priority-time event scheduler with multiple logical
//! [clocks](crate::time::Clock), used by every other part of the simulator.
//!
//! Components implement [`Component`](crate::component::Component) and
//! receive each of their scheduled events exactly once through
//! `process_event`. Events are totally ordered by
//! `(time, epsilon, sequence)`:
//!
//!  - **time** is the absolute simulation time in picoseconds;
//!  - **epsilon** is an integer sub-ordering within one time, used to order
//!    e.g. all credit returns before all flit movements in a cycle;
//!  - **sequence** is the monotone insertion counter, so events with equal
//!    `(time, epsilon)` fire in the order they were scheduled.
//!
//! Given the same inputs and seed, a run therefore produces an identical
//! event order, and identical statistics.
//!
//! # Example
//!
//! ```rust
//! use weft_engine::test_helpers::{Recorder, start_test};
//! use weft_engine::time::Clock;
//!
//! let sim = start_test();
//! let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");
//! let time = sim.future_cycle(Clock::Terminal, 3);
//! sim.add_event(time, 0, recorder.clone(), None, 42);
//! sim.run();
//! assert_eq!(recorder.seen(), vec![(time, 42)]);
//! ```

pub mod component;
pub mod engine;
pub mod event;
pub mod random;
pub mod test_helpers;
pub mod time;
pub mod types;
