// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Message-size distributions.

use std::collections::HashMap;
use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

use weft_protocols::message::Message;

/// Produces message sizes in flits.
pub trait MessageSizeDistribution {
    /// Size of the next request message.
    fn next_message_size(&mut self) -> u32;

    /// Size of the response to `request`. Defaults to an ordinary draw.
    fn next_response_size(&mut self, request: &Message) -> u32 {
        let _ = request;
        self.next_message_size()
    }

    /// The largest size this distribution can produce.
    fn max_message_size(&self) -> u32;
}

type SizeConstructor =
    fn(&serde_json::Value, &Rc<Simulator>) -> Result<Box<dyn MessageSizeDistribution>, SetupError>;

/// Name-keyed size distribution factory, populated at process start.
pub struct SizeDistributionRegistry {
    constructors: HashMap<&'static str, SizeConstructor>,
}

impl SizeDistributionRegistry {
    /// A registry with every built-in distribution registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("single", create_single);
        registry.register("random", create_random);
        registry
    }

    /// Register a distribution under `name`.
    pub fn register(&mut self, name: &'static str, constructor: SizeConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Build the named distribution.
    pub fn create(
        &self,
        name: &str,
        settings: &serde_json::Value,
        sim: &Rc<Simulator>,
    ) -> Result<Box<dyn MessageSizeDistribution>, SetupError> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(settings, sim),
            None => weft_engine::config_error!(format!("unknown message size distribution '{name}'")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SingleSettings {
    message_size: u32,
    response_size: Option<u32>,
}

fn create_single(
    settings: &serde_json::Value,
    _sim: &Rc<Simulator>,
) -> Result<Box<dyn MessageSizeDistribution>, SetupError> {
    let settings: SingleSettings = match serde_json::from_value(settings.clone()) {
        Ok(s) => s,
        Err(e) => return weft_engine::config_error!(format!("bad single size settings: {e}")),
    };
    if settings.message_size == 0 || settings.response_size == Some(0) {
        weft_engine::config_error!("message sizes must be at least one flit");
    }
    Ok(Box::new(Single {
        message_size: settings.message_size,
        response_size: settings.response_size,
    }))
}

/// Every message the same size; responses may use a distinct fixed size.
pub struct Single {
    message_size: u32,
    response_size: Option<u32>,
}

impl MessageSizeDistribution for Single {
    fn next_message_size(&mut self) -> u32 {
        self.message_size
    }

    fn next_response_size(&mut self, _request: &Message) -> u32 {
        self.response_size.unwrap_or(self.message_size)
    }

    fn max_message_size(&self) -> u32 {
        self.message_size.max(self.response_size.unwrap_or(0))
    }
}

#[derive(Debug, Deserialize)]
struct RandomSettings {
    min_message_size: u32,
    max_message_size: u32,
}

fn create_random(
    settings: &serde_json::Value,
    sim: &Rc<Simulator>,
) -> Result<Box<dyn MessageSizeDistribution>, SetupError> {
    let settings: RandomSettings = match serde_json::from_value(settings.clone()) {
        Ok(s) => s,
        Err(e) => return weft_engine::config_error!(format!("bad random size settings: {e}")),
    };
    if settings.min_message_size == 0 || settings.min_message_size > settings.max_message_size {
        weft_engine::config_error!("random size needs 0 < min_message_size <= max_message_size");
    }
    Ok(Box::new(Random {
        sim: sim.clone(),
        min: settings.min_message_size,
        max: settings.max_message_size,
    }))
}

/// Uniform over `[min, max]` flits.
pub struct Random {
    sim: Rc<Simulator>,
    min: u32,
    max: u32,
}

impl MessageSizeDistribution for Random {
    fn next_message_size(&mut self) -> u32 {
        self.sim.random.next_u64(u64::from(self.min), u64::from(self.max)) as u32
    }

    fn max_message_size(&self) -> u32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use weft_engine::test_helpers::start_test;

    use super::*;

    #[test]
    fn single_sizes() {
        let sim = start_test();
        let registry = SizeDistributionRegistry::with_defaults();
        let mut dist = registry
            .create(
                "single",
                &serde_json::json!({"message_size": 8, "response_size": 2}),
                &sim,
            )
            .unwrap();
        assert_eq!(dist.next_message_size(), 8);
        assert_eq!(dist.max_message_size(), 8);

        let (request, _) = Message::assemble(0, 0, 1, 8, 8).unwrap();
        assert_eq!(dist.next_response_size(&request), 2);
    }

    #[test]
    fn random_stays_in_range() {
        let sim = start_test();
        let registry = SizeDistributionRegistry::with_defaults();
        let mut dist = registry
            .create(
                "random",
                &serde_json::json!({"min_message_size": 2, "max_message_size": 5}),
                &sim,
            )
            .unwrap();
        let mut seen = [false; 6];
        for _ in 0..200 {
            let size = dist.next_message_size();
            assert!((2..=5).contains(&size));
            seen[size as usize] = true;
        }
        assert_eq!(&seen[2..], [true; 4]);
        assert_eq!(dist.max_message_size(), 5);
    }

    #[test]
    fn bad_settings_are_rejected() {
        let sim = start_test();
        let registry = SizeDistributionRegistry::with_defaults();
        assert!(registry
            .create("single", &serde_json::json!({"message_size": 0}), &sim)
            .is_err());
        assert!(registry
            .create(
                "random",
                &serde_json::json!({"min_message_size": 6, "max_message_size": 5}),
                &sim,
            )
            .is_err());
        assert!(registry.create("fixed", &serde_json::json!({}), &sim).is_err());
    }
}
