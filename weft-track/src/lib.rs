// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Combined _track_ capabilities for the WEFT simulator.
//!
//! _Track_ means the combination of _log_ and _trace_ where:
//!
//!   - _log_ are text-based human-readable messages emitted at various levels
//!     of verbosity (from `Trace` through to `Error`).
//!   - _trace_ provides the simulation time annotations that make those
//!     messages attributable to a point in the run.
//!
//! Every simulated component owns an [`Entity`](crate::entity::Entity) that
//! places it in the hierarchy (`top::network::router_3::input_2`) and carries
//! a shared [`Tracker`] sink. Messages are emitted through the level macros,
//! which take the entity expression first:
//!
//! ```rust
//! # use weft_track::tracker::stdout_tracker;
//! # use weft_track::entity::toplevel;
//! use weft_track::info;
//!
//! let tracker = stdout_tracker(log::Level::Info);
//! let top = toplevel(&tracker, "top");
//! info!(top ; "hello from {}", top.full_name());
//! ```

use std::str::FromStr;

pub use log;

pub mod entity;
pub mod tracker;

pub use tracker::{Track, Tracker};

/// A type alias for objects that receive _log_ events.
pub type Writer = Box<dyn std::io::Write>;

/// Unique identifier assigned to every [`Entity`](crate::entity::Entity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub u64);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// The id of the top-level entity; all other ids are allocated after it.
pub const ROOT: Id = Id(1);

/// Take a command-line string and convert it to a [`log::Level`].
#[must_use]
pub fn str_to_level(lvl: &str) -> log::Level {
    match log::Level::from_str(lvl) {
        Ok(level) => level,
        Err(_) => panic!("Unable to parse level string '{lvl}'"),
    }
}

#[macro_export]
/// Emit a `Trace` message, gated on the entity's configured level.
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity
                .tracker
                .log($entity.id, $crate::log::Level::Trace, format_args!($($arg)+));
        }
    };
}

#[macro_export]
/// Emit a `Debug` message, gated on the entity's configured level.
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Debug)
        {
            $entity
                .tracker
                .log($entity.id, $crate::log::Level::Debug, format_args!($($arg)+));
        }
    };
}

#[macro_export]
/// Emit an `Info` message, gated on the entity's configured level.
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Info)
        {
            $entity
                .tracker
                .log($entity.id, $crate::log::Level::Info, format_args!($($arg)+));
        }
    };
}

#[macro_export]
/// Emit a `Warn` message, gated on the entity's configured level.
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Warn)
        {
            $entity
                .tracker
                .log($entity.id, $crate::log::Level::Warn, format_args!($($arg)+));
        }
    };
}

#[macro_export]
/// Emit an `Error` message, gated on the entity's configured level.
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => {
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Error)
        {
            $entity
                .tracker
                .log($entity.id, $crate::log::Level::Error, format_args!($($arg)+));
        }
    };
}
