// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Uniform-random traffic.

use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

use crate::traffic::ContinuousTrafficPattern;

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default)]
    send_to_self: bool,
}

pub fn create(
    settings: &serde_json::Value,
    sim: &Rc<Simulator>,
    num_terminals: u32,
    self_id: u32,
) -> Result<Box<dyn ContinuousTrafficPattern>, SetupError> {
    let settings: Settings = match serde_json::from_value(settings.clone()) {
        Ok(s) => s,
        Err(e) => return weft_engine::config_error!(format!("bad uniform_random settings: {e}")),
    };
    if !settings.send_to_self && num_terminals < 2 {
        weft_engine::config_error!("uniform_random without send_to_self needs 2+ terminals");
    }
    Ok(Box::new(UniformRandom {
        sim: sim.clone(),
        num_terminals,
        self_id,
        send_to_self: settings.send_to_self,
    }))
}

/// Every destination equally likely, one draw per message.
pub struct UniformRandom {
    sim: Rc<Simulator>,
    num_terminals: u32,
    self_id: u32,
    send_to_self: bool,
}

impl ContinuousTrafficPattern for UniformRandom {
    fn next_destination(&mut self) -> u32 {
        if self.send_to_self {
            self.sim.random.next_u64(0, u64::from(self.num_terminals) - 1) as u32
        } else {
            // Draw from one fewer and skip over ourselves, keeping the
            // distribution uniform with a single draw.
            let draw = self.sim.random.next_u64(0, u64::from(self.num_terminals) - 2) as u32;
            if draw >= self.self_id { draw + 1 } else { draw }
        }
    }
}

#[cfg(test)]
mod tests {
    use weft_engine::test_helpers::start_test;

    use super::*;

    #[test]
    fn never_self_by_default() {
        let sim = start_test();
        let mut pattern = create(&serde_json::json!({}), &sim, 8, 3).unwrap();
        for _ in 0..1000 {
            let destination = pattern.next_destination();
            assert!(destination < 8);
            assert_ne!(destination, 3);
        }
    }

    #[test]
    fn covers_all_destinations() {
        let sim = start_test();
        let mut pattern =
            create(&serde_json::json!({"send_to_self": true}), &sim, 4, 0).unwrap();
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[pattern.next_destination() as usize] = true;
        }
        assert_eq!(seen, [true; 4]);
    }
}
