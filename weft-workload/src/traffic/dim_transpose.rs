// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Dimension-transpose traffic for tori and meshes.

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
    enabled_dimensions: Option<Vec<bool>>,
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
        Err(e) => return weft_engine::config_error!(format!("bad dim_transpose settings: {e}")),
    };

    let num_routers: u32 = settings.dimensions.iter().product();
    let terminals_per_router = settings.concentration * settings.interface_ports;
    if num_routers * terminals_per_router != num_terminals {
        weft_engine::config_error!(format!(
            "dim_transpose geometry covers {} terminals, network has {}",
            num_routers * terminals_per_router,
            num_terminals
        ));
    }
    let enabled = settings
        .enabled_dimensions
        .unwrap_or_else(|| vec![true; settings.dimensions.len()]);
    if enabled.len() != settings.dimensions.len() {
        weft_engine::config_error!("enabled_dimensions length must match dimensions");
    }

    Ok(Box::new(DimTranspose::new(
        &settings.dimensions,
        terminals_per_router,
        &enabled,
        self_id,
    )))
}

/// A fixed permutation: the coordinates of the enabled dimensions, taken in
/// index order, are exchanged pairwise (`e0` with `e1`, `e2` with `e3`, and
/// so on; an unpaired last dimension and all disabled dimensions keep their
/// coordinate). The concentration offset is preserved.
pub struct DimTranspose {
    destination: u32,
}

impl DimTranspose {
    fn new(dimensions: &[u32], terminals_per_router: u32, enabled: &[bool], self_id: u32) -> Self {
        let offset = self_id % terminals_per_router;
        let mut router = self_id / terminals_per_router;

        let mut coords = Vec::with_capacity(dimensions.len());
        for &width in dimensions {
            coords.push(router % width);
            router /= width;
        }

        let enabled_dims: Vec<usize> = (0..dimensions.len()).filter(|&d| enabled[d]).collect();
        let mut transposed = coords.clone();
        for pair in enabled_dims.chunks(2) {
            if let &[a, b] = pair {
                transposed[a] = coords[b];
                transposed[b] = coords[a];
            }
        }

        let mut destination_router = 0;
        for (d, &width) in dimensions.iter().enumerate().rev() {
            debug_assert!(transposed[d] < width, "transposed coordinate out of range");
            destination_router = destination_router * width + transposed[d];
        }

        Self {
            destination: destination_router * terminals_per_router + offset,
        }
    }
}

impl ContinuousTrafficPattern for DimTranspose {
    fn next_destination(&mut self) -> u32 {
        self.destination
    }
}
