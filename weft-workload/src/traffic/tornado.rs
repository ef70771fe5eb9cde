// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Tornado traffic for tori.

use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

use crate::traffic::ContinuousTrafficPattern;

#[derive(Debug, Deserialize)]
struct Settings {
    dimensions: Vec<u32>,
    concentration: u32,
    #[serde(default = "one")]
    interface_ports: u32,
}

fn one() -> u32 {
    1
}

pub fn create(
    settings: &serde_json::Value,
    _sim: &Rc<Simulator>,
    num_terminals: u32,
    self_id: u32,
) -> Result<Box<dyn ContinuousTrafficPattern>, SetupError> {
    let settings: Settings = match serde_json::from_value(settings.clone()) {
        Ok(s) => s,
        Err(e) => return weft_engine::config_error!(format!("bad tornado settings: {e}")),
    };

    let num_routers: u32 = settings.dimensions.iter().product();
    let terminals_per_router = settings.concentration * settings.interface_ports;
    if num_routers * terminals_per_router != num_terminals {
        weft_engine::config_error!(format!(
            "tornado geometry covers {} terminals, network has {}",
            num_routers * terminals_per_router,
            num_terminals
        ));
    }

    // Fixed permutation: offset each coordinate by just under half the ring,
    // the adversarial distance for minimal routing.
    let offset = self_id % terminals_per_router;
    let mut router = self_id / terminals_per_router;
    let mut destination_router = 0;
    let mut scale = 1;
    for &width in &settings.dimensions {
        let x = router % width;
        router /= width;
        let dx = (x + width.div_ceil(2) - 1) % width;
        destination_router += dx * scale;
        scale *= width;
    }

    Ok(Box::new(Tornado {
        destination: destination_router * terminals_per_router + offset,
    }))
}

/// The tornado permutation: `x -> (x + ceil(k/2) - 1) mod k` per dimension.
pub struct Tornado {
    destination: u32,
}

impl ContinuousTrafficPattern for Tornado {
    fn next_destination(&mut self) -> u32 {
        self.destination
    }
}

#[cfg(test)]
mod tests {
    use weft_engine::test_helpers::start_test;

    use super::*;

    #[test]
    fn ring_offset() {
        let sim = start_test();
        let settings = serde_json::json!({"dimensions": [8], "concentration": 1});
        // ceil(8/2) - 1 = 3 hops around the ring.
        for src in 0..8 {
            let mut pattern = create(&settings, &sim, 8, src).unwrap();
            assert_eq!(pattern.next_destination(), (src + 3) % 8);
        }
    }

    #[test]
    fn concentration_is_preserved() {
        let sim = start_test();
        let settings = serde_json::json!({"dimensions": [5], "concentration": 2});
        // ceil(5/2) - 1 = 2 routers ahead.
        let mut pattern = create(&settings, &sim, 10, 3).unwrap();
        // Source: router 1, offset 1. Destination: router 3, offset 1.
        assert_eq!(pattern.next_destination(), 7);
    }

    #[test]
    fn width_one_degenerates_to_self() {
        let sim = start_test();
        let settings = serde_json::json!({"dimensions": [1], "concentration": 4});
        let mut pattern = create(&settings, &sim, 4, 2).unwrap();
        assert_eq!(pattern.next_destination(), 2);
    }
}
