// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The topology contract and the registry of constructions.
//!
//! A topology fixes the device counts, the port wiring, the address
//! translation bijections, and - because it alone knows its geometry - acts
//! as the factory for routing and injection algorithm instances.

pub mod torus;

use std::collections::HashMap;
use std::rc::Rc;

use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;

use weft_protocols::pc::PcVcMap;

use crate::network::AlgorithmSettings;
use crate::routing::{InjectionAlgorithm, RoutingAlgorithm};

/// One directed router-to-router wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    pub src_router: u32,
    pub src_port: u32,
    pub dst_router: u32,
    pub dst_port: u32,
}

/// A topology construction.
pub trait Topology {
    fn num_routers(&self) -> u32;
    fn num_interfaces(&self) -> u32;

    /// Ports per router; terminal ports first.
    fn router_radix(&self) -> u32;

    /// The `(router, port)` an interface attaches to.
    fn interface_port(&self, interface: u32) -> (u32, u32);

    /// Every directed router-to-router wire.
    fn channels(&self) -> Vec<ChannelSpec>;

    fn interface_id_to_address(&self, id: u32) -> Vec<u32>;
    fn interface_address_to_id(&self, address: &[u32]) -> u32;
    fn router_id_to_address(&self, id: u32) -> Vec<u32>;
    fn router_address_to_id(&self, address: &[u32]) -> u32;

    /// Minimum routers visited between two interface addresses.
    fn minimal_hops(&self, source: &[u32], destination: &[u32]) -> u32;

    /// Build the routing algorithm instance for `(router, input port,
    /// input VC)` in protocol class `pc`.
    #[allow(clippy::too_many_arguments)]
    fn create_routing_algorithm(
        &self,
        settings: &AlgorithmSettings,
        sim: &Rc<Simulator>,
        pc_map: &Rc<PcVcMap>,
        pc: u32,
        router: u32,
        input_port: u32,
        input_vc: u32,
    ) -> Result<Box<dyn RoutingAlgorithm>, SetupError>;

    /// Build the injection algorithm instance for protocol class `pc` of
    /// `interface`.
    fn create_injection_algorithm(
        &self,
        settings: &AlgorithmSettings,
        sim: &Rc<Simulator>,
        pc_map: &Rc<PcVcMap>,
        pc: u32,
        interface: u32,
    ) -> Result<Box<dyn InjectionAlgorithm>, SetupError>;
}

type TopologyConstructor = fn(&serde_json::Value) -> Result<Rc<dyn Topology>, SetupError>;

/// Name-keyed topology factory, populated at process start.
pub struct TopologyRegistry {
    constructors: HashMap<&'static str, TopologyConstructor>,
}

impl TopologyRegistry {
    /// A registry with every built-in topology registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("torus", torus::create);
        registry
    }

    /// Register a construction under `name`.
    pub fn register(&mut self, name: &'static str, constructor: TopologyConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Build the named topology from its settings.
    pub fn create(
        &self,
        name: &str,
        settings: &serde_json::Value,
    ) -> Result<Rc<dyn Topology>, SetupError> {
        match self.constructors.get(name) {
            Some(constructor) => constructor(settings),
            None => weft_engine::config_error!(format!("unknown topology '{name}'")),
        }
    }
}
