// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The torus: `k`-ary `n`-dimensional with wrap-around links.
//!
//! Router addresses are the coordinate vector (dimension 0 fastest
//! varying); interface addresses prepend the concentration offset. Port
//! numbering per router: `0..c` terminal ports, then per dimension `d` the
//! positive-direction port `c + 2d` and the negative-direction port
//! `c + 2d + 1`.

use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

use weft_protocols::flit::Flit;
use weft_protocols::pc::{PcVcInfo, PcVcMap};

use crate::network::AlgorithmSettings;
use crate::routing::{
    InjectionAlgorithm, RotatingInjection, RoutingAlgorithm, RoutingResponse,
};
use crate::topology::{ChannelSpec, Topology};

#[derive(Debug, Deserialize)]
struct TorusSettings {
    dimensions: Vec<u32>,
    concentration: u32,
}

/// Build a [`Torus`] from its settings document.
pub fn create(settings: &serde_json::Value) -> Result<Rc<dyn Topology>, SetupError> {
    let settings: TorusSettings = match serde_json::from_value(settings.clone()) {
        Ok(s) => s,
        Err(e) => return weft_engine::config_error!(format!("bad torus settings: {e}")),
    };
    Ok(Rc::new(Torus::new(
        settings.dimensions,
        settings.concentration,
    )?))
}

pub struct Torus {
    widths: Vec<u32>,
    concentration: u32,
}

impl Torus {
    pub fn new(widths: Vec<u32>, concentration: u32) -> Result<Self, SetupError> {
        if widths.is_empty() {
            weft_engine::config_error!("torus needs at least one dimension");
        }
        if widths.iter().any(|&w| w < 2) {
            weft_engine::config_error!("torus dimension widths must be at least 2");
        }
        if concentration == 0 {
            weft_engine::config_error!("torus concentration must be at least 1");
        }
        Ok(Self {
            widths,
            concentration,
        })
    }

    fn coords(&self, mut router: u32) -> Vec<u32> {
        let mut coords = Vec::with_capacity(self.widths.len());
        for &width in &self.widths {
            coords.push(router % width);
            router /= width;
        }
        coords
    }

    fn router_index(&self, coords: &[u32]) -> u32 {
        let mut index = 0;
        for (d, &width) in self.widths.iter().enumerate().rev() {
            debug_assert!(coords[d] < width);
            index = index * width + coords[d];
        }
        index
    }
}

impl Topology for Torus {
    fn num_routers(&self) -> u32 {
        self.widths.iter().product()
    }

    fn num_interfaces(&self) -> u32 {
        self.concentration * self.num_routers()
    }

    fn router_radix(&self) -> u32 {
        self.concentration + 2 * self.widths.len() as u32
    }

    fn interface_port(&self, interface: u32) -> (u32, u32) {
        (
            interface / self.concentration,
            interface % self.concentration,
        )
    }

    fn channels(&self) -> Vec<ChannelSpec> {
        let mut specs = Vec::new();
        for router in 0..self.num_routers() {
            let coords = self.coords(router);
            for (d, &width) in self.widths.iter().enumerate() {
                let mut neighbor = coords.clone();
                neighbor[d] = (coords[d] + 1) % width;
                let neighbor = self.router_index(&neighbor);
                let port_pos = self.concentration + 2 * d as u32;
                let port_neg = port_pos + 1;

                // The positive-facing wire and its return.
                specs.push(ChannelSpec {
                    src_router: router,
                    src_port: port_pos,
                    dst_router: neighbor,
                    dst_port: port_neg,
                });
                specs.push(ChannelSpec {
                    src_router: neighbor,
                    src_port: port_neg,
                    dst_router: router,
                    dst_port: port_pos,
                });
            }
        }
        specs
    }

    fn interface_id_to_address(&self, id: u32) -> Vec<u32> {
        let mut address = vec![id % self.concentration];
        address.extend(self.coords(id / self.concentration));
        address
    }

    fn interface_address_to_id(&self, address: &[u32]) -> u32 {
        assert_eq!(address.len(), self.widths.len() + 1);
        self.router_index(&address[1..]) * self.concentration + address[0]
    }

    fn router_id_to_address(&self, id: u32) -> Vec<u32> {
        self.coords(id)
    }

    fn router_address_to_id(&self, address: &[u32]) -> u32 {
        assert_eq!(address.len(), self.widths.len());
        self.router_index(address)
    }

    fn minimal_hops(&self, source: &[u32], destination: &[u32]) -> u32 {
        let mut hops = 1;
        for (d, &width) in self.widths.iter().enumerate() {
            let a = source[d + 1];
            let b = destination[d + 1];
            let delta = a.abs_diff(b);
            hops += delta.min(width - delta);
        }
        hops
    }

    fn create_routing_algorithm(
        &self,
        settings: &AlgorithmSettings,
        _sim: &Rc<Simulator>,
        pc_map: &Rc<PcVcMap>,
        pc: u32,
        router: u32,
        input_port: u32,
        input_vc: u32,
    ) -> Result<Box<dyn RoutingAlgorithm>, SetupError> {
        match settings.algorithm.as_str() {
            "dimension_order" => Ok(Box::new(DimOrderRouting::new(
                self.widths.clone(),
                self.concentration,
                self.coords(router),
                pc_map.pc_vcs(pc),
                input_port,
                input_vc,
                settings.latency,
            )?)),
            name => weft_engine::config_error!(format!("unknown torus routing algorithm '{name}'")),
        }
    }

    fn create_injection_algorithm(
        &self,
        settings: &AlgorithmSettings,
        _sim: &Rc<Simulator>,
        pc_map: &Rc<PcVcMap>,
        pc: u32,
        _interface: u32,
    ) -> Result<Box<dyn InjectionAlgorithm>, SetupError> {
        match settings.algorithm.as_str() {
            "dimension_order" => Ok(Box::new(RotatingInjection::new(pc_map.pc_vcs(pc)))),
            name => weft_engine::config_error!(format!("unknown torus injection algorithm '{name}'")),
        }
    }
}

/// Torus dimension-order routing with dateline VC classes.
///
/// Dimensions are corrected in ascending order, taking the shorter
/// direction (ties toward positive). Within the flit's protocol class the
/// VC class is 0 until the hop that crosses the dimension's wrap-around
/// link and 1 afterwards; entering a new dimension resets to class 0. The
/// class therefore needs at least two VCs.
pub struct DimOrderRouting {
    widths: Vec<u32>,
    concentration: u32,
    coords: Vec<u32>,
    pc_vcs: PcVcInfo,
    input_dim: Option<u32>,
    input_class: u32,
    latency: u64,
}

impl DimOrderRouting {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        widths: Vec<u32>,
        concentration: u32,
        coords: Vec<u32>,
        pc_vcs: PcVcInfo,
        input_port: u32,
        input_vc: u32,
        latency: u64,
    ) -> Result<Self, SetupError> {
        if pc_vcs.num_vcs < 2 {
            weft_engine::config_error!(
                "dimension_order routing needs at least 2 VCs per protocol class"
            );
        }
        if latency == 0 {
            weft_engine::config_error!("routing latency must be at least one cycle");
        }
        let input_dim = if input_port >= concentration {
            Some((input_port - concentration) / 2)
        } else {
            None
        };
        let class_width = pc_vcs.num_vcs / 2;
        let input_class = if input_vc - pc_vcs.base_vc < class_width {
            0
        } else {
            1
        };
        Ok(Self {
            widths,
            concentration,
            coords,
            pc_vcs,
            input_dim,
            input_class,
            latency,
        })
    }

    fn class_vc(&self, class: u32) -> u32 {
        self.pc_vcs.base_vc + class * (self.pc_vcs.num_vcs / 2)
    }

    fn destination_coords(&self, interface: u32) -> (u32, Vec<u32>) {
        let offset = interface % self.concentration;
        let mut router = interface / self.concentration;
        let mut coords = Vec::with_capacity(self.widths.len());
        for &width in &self.widths {
            coords.push(router % width);
            router /= width;
        }
        (offset, coords)
    }
}

impl RoutingAlgorithm for DimOrderRouting {
    fn route(&mut self, flit: &Flit) -> RoutingResponse {
        let (offset, dest) = self.destination_coords(flit.packet.message.destination());
        let mut response = RoutingResponse::default();

        for (d, &width) in self.widths.iter().enumerate() {
            let here = self.coords[d];
            let there = dest[d];
            if here == there {
                continue;
            }

            let dist_pos = (there + width - here) % width;
            let dist_neg = (here + width - there) % width;
            let positive = dist_pos <= dist_neg;

            let port = self.concentration + 2 * d as u32 + u32::from(!positive);
            let crosses_wrap =
                (positive && here == width - 1) || (!positive && here == 0);
            let continuing = self.input_dim == Some(d as u32);
            let class = if crosses_wrap || (continuing && self.input_class == 1) {
                1
            } else {
                0
            };
            response.add(port, self.class_vc(class));
            return response;
        }

        // At the destination router: eject toward the interface, keeping the
        // arrival class.
        response.add(offset, self.class_vc(self.input_class));
        response
    }

    fn latency(&self) -> u64 {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_protocols::message::Message;

    fn torus_3d() -> Torus {
        Torus::new(vec![3, 3, 3], 2).unwrap()
    }

    #[test]
    fn address_translation_is_a_bijection() {
        let torus = torus_3d();
        for id in 0..torus.num_interfaces() {
            let address = torus.interface_id_to_address(id);
            assert_eq!(torus.interface_address_to_id(&address), id);
        }
        for id in 0..torus.num_routers() {
            let address = torus.router_id_to_address(id);
            assert_eq!(torus.router_address_to_id(&address), id);
        }
    }

    #[test]
    fn radix_and_ports() {
        let torus = torus_3d();
        assert_eq!(torus.num_routers(), 27);
        assert_eq!(torus.num_interfaces(), 54);
        assert_eq!(torus.router_radix(), 2 + 6);
        assert_eq!(torus.interface_port(0), (0, 0));
        assert_eq!(torus.interface_port(1), (0, 1));
        assert_eq!(torus.interface_port(7), (3, 1));
    }

    #[test]
    fn channel_wiring_pairs_ports() {
        let torus = Torus::new(vec![4], 1).unwrap();
        let specs = torus.channels();
        // 4 routers, 1 dimension: 4 positive wires and 4 returns.
        assert_eq!(specs.len(), 8);
        assert!(specs.contains(&ChannelSpec {
            src_router: 0,
            src_port: 1,
            dst_router: 1,
            dst_port: 2,
        }));
        assert!(specs.contains(&ChannelSpec {
            src_router: 1,
            src_port: 2,
            dst_router: 0,
            dst_port: 1,
        }));
        // The wrap-around link.
        assert!(specs.contains(&ChannelSpec {
            src_router: 3,
            src_port: 1,
            dst_router: 0,
            dst_port: 2,
        }));
    }

    #[test]
    fn minimal_hops_wraps() {
        let torus = Torus::new(vec![4, 3], 1).unwrap();
        let a = torus.interface_id_to_address(0); // router (0,0)
        let b = torus.interface_id_to_address(3); // router (3,0)
        // One hop around the wrap link, plus the router itself.
        assert_eq!(torus.minimal_hops(&a, &b), 2);

        let c = torus.interface_id_to_address(torus.interface_address_to_id(&[0, 2, 2]));
        assert_eq!(torus.minimal_hops(&a, &c), 1 + 2 + 1);

        assert_eq!(torus.minimal_hops(&a, &a), 1);
    }

    fn head_flit_to(destination: u32) -> Flit {
        let (message, mut flits) = Message::assemble(0, 0, 1, 1, 1).unwrap();
        message.set_send_info(1, 0, destination, 0);
        flits.remove(0)
    }

    #[test]
    fn dim_order_corrects_lowest_dimension_first() {
        let torus = Torus::new(vec![3, 3], 1).unwrap();
        let pc = PcVcInfo { base_vc: 0, num_vcs: 2 };
        // Router (0,0), injection input.
        let mut alg =
            DimOrderRouting::new(vec![3, 3], 1, vec![0, 0], pc, 0, 0, 1).unwrap();

        // Destination router (1,1): correct dimension 0 first, positive.
        let response = alg.route(&head_flit_to(torus.router_address_to_id(&[1, 1])));
        assert_eq!(response.options, vec![(1, 0)]);

        // Destination router (0,1): dimension 0 done, move in dimension 1.
        let response = alg.route(&head_flit_to(torus.router_address_to_id(&[0, 1])));
        assert_eq!(response.options, vec![(3, 0)]);

        // Destination router (2,0): shorter the other way around the ring;
        // leaving coordinate 0 negative crosses the wrap, so class 1.
        let response = alg.route(&head_flit_to(torus.router_address_to_id(&[2, 0])));
        assert_eq!(response.options, vec![(2, 1)]);
    }

    #[test]
    fn dim_order_keeps_class_after_the_dateline() {
        let pc = PcVcInfo { base_vc: 0, num_vcs: 2 };
        // Width-5 ring: router 0, flit arrived from the negative side on
        // class 1 (it crossed the wrap link getting here), continuing
        // positive toward router 1: stays class 1.
        let mut alg = DimOrderRouting::new(vec![5], 1, vec![0], pc, 2, 1, 1).unwrap();
        let response = alg.route(&head_flit_to(1));
        assert_eq!(response.options, vec![(1, 1)]);

        // Same position arriving on class 0 with no wrap ahead: class 0.
        let mut alg = DimOrderRouting::new(vec![5], 1, vec![0], pc, 2, 0, 1).unwrap();
        let response = alg.route(&head_flit_to(1));
        assert_eq!(response.options, vec![(1, 0)]);
    }

    #[test]
    fn dim_order_ejects_at_destination() {
        let pc = PcVcInfo { base_vc: 2, num_vcs: 2 };
        let mut alg =
            DimOrderRouting::new(vec![3, 3], 2, vec![1, 2], pc, 4, 2, 1).unwrap();
        // Interface 15 = router 7 = (1, 2), offset 1.
        let response = alg.route(&head_flit_to(15));
        assert_eq!(response.options, vec![(1, 2)]);
    }

    #[test]
    fn dim_order_needs_two_vcs() {
        let pc = PcVcInfo { base_vc: 0, num_vcs: 1 };
        assert!(DimOrderRouting::new(vec![3], 1, vec![0], pc, 0, 0, 1).is_err());
    }
}
