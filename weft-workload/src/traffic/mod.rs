// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Continuous traffic patterns.
//!
//! A pattern is an infinite producer of destination interface ids, pure
//! over its own state and the global random stream. Instances are built per
//! terminal by the name-keyed registry.

pub mod dim_transpose;
pub mod tornado;
pub mod uniform_random;

use std::collections::HashMap;
use std::rc::Rc;

use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

/// An infinite, seedable sequence of destinations.
pub trait ContinuousTrafficPattern {
    /// The next destination interface id, in `[0, num_terminals)`.
    fn next_destination(&mut self) -> u32;
}

type TrafficConstructor = fn(
    &serde_json::Value,
    &Rc<Simulator>,
    u32, // num_terminals
    u32, // self id
) -> Result<Box<dyn ContinuousTrafficPattern>, SetupError>;

/// Name-keyed traffic pattern factory, populated at process start.
pub struct TrafficPatternRegistry {
    constructors: HashMap<&'static str, TrafficConstructor>,
}

impl TrafficPatternRegistry {
    /// A registry with every built-in pattern registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("uniform_random", uniform_random::create);
        registry.register("dim_transpose", dim_transpose::create);
        registry.register("tornado", tornado::create);
        registry
    }

    /// Register a pattern under `name`.
    pub fn register(&mut self, name: &'static str, constructor: TrafficConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Build the named pattern for one terminal.
    pub fn create(
        &self,
        name: &str,
        settings: &serde_json::Value,
        sim: &Rc<Simulator>,
        num_terminals: u32,
        self_id: u32,
    ) -> Result<Box<dyn ContinuousTrafficPattern>, SetupError> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(settings, sim, num_terminals, self_id),
            None => weft_engine::config_error!(format!("unknown traffic pattern '{name}'")),
        }
    }
}
