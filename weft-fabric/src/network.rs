// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The fabric binder.
//!
//! The network owns every router, interface and channel, fixes the
//! protocol-class to VC map for the run, delegates address translation to
//! the topology, and toggles the monitoring window the statistics sinks
//! observe.

use std::cell::Cell;
use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_engine::types::SetupError;
use weft_stats::channel_log::ChannelLog;
use weft_stats::traffic_log::TrafficLog;
use weft_track::entity::Entity;
use weft_track::info;

use weft_protocols::pc::{PcVcInfo, PcVcMap};

use crate::channel::Channel;
use crate::interface::Interface;
use crate::router::Router;
use crate::topology::Topology;

/// The monitoring window shared by channels and device traffic logging.
///
/// Samples taken outside the window are discarded at the source.
pub struct Monitor {
    sim: Rc<Simulator>,
    monitoring: Cell<bool>,
    start_cycle: Cell<u64>,
    cycles: Cell<u64>,
}

impl Monitor {
    fn new(sim: &Rc<Simulator>) -> Rc<Self> {
        Rc::new(Self {
            sim: sim.clone(),
            monitoring: Cell::new(false),
            start_cycle: Cell::new(0),
            cycles: Cell::new(0),
        })
    }

    fn start(&self) {
        assert!(!self.monitoring.get(), "monitoring already started");
        self.monitoring.set(true);
        self.start_cycle.set(self.sim.cycle(Clock::Channel));
    }

    fn end(&self) {
        assert!(self.monitoring.get(), "monitoring not started");
        let elapsed = self.sim.cycle(Clock::Channel) - self.start_cycle.get();
        self.cycles.set(self.cycles.get() + elapsed);
        self.monitoring.set(false);
    }

    /// Whether the window is currently open.
    pub fn is_on(&self) -> bool {
        self.monitoring.get()
    }

    /// Total channel cycles monitored so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.get()
    }
}

/// Name-keyed algorithm selection plus its private settings.
#[derive(Clone, Debug, Deserialize)]
pub struct AlgorithmSettings {
    /// Registry name of the algorithm.
    pub algorithm: String,

    /// Pipeline latency of the algorithm, in router cycles.
    #[serde(default = "default_latency")]
    pub latency: u64,

    /// Algorithm-private settings, passed through unparsed.
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_latency() -> u64 {
    1
}

/// Per-protocol-class configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ProtocolClassSettings {
    /// Number of VCs this class owns.
    pub num_vcs: u32,

    /// Routing algorithm for every `(input port, input VC)` in the class.
    pub routing: AlgorithmSettings,

    /// Injection algorithm for this class at every interface.
    pub injection: AlgorithmSettings,
}

/// The network section of the settings document.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkSettings {
    /// The protocol classes, in VC-range order.
    pub protocol_classes: Vec<ProtocolClassSettings>,

    /// Latency of router-to-router channels, in channel cycles.
    pub internal_channel_latency: u64,

    /// Latency of interface-to-router channels, in channel cycles.
    pub terminal_channel_latency: u64,

    /// Depth of every input VC buffer, in flits.
    pub input_buffer_depth: u32,

    /// VC-allocation fairness policy.
    #[serde(default = "default_policy")]
    pub vc_allocation_policy: String,

    /// Switch-allocation fairness policy.
    #[serde(default = "default_policy")]
    pub switch_allocation_policy: String,
}

fn default_policy() -> String {
    String::from("round_robin")
}

/// The fabric: all devices, all channels, the PC/VC map and the monitoring
/// window.
pub struct Network {
    pub entity: Rc<Entity>,
    topology: Rc<dyn Topology>,
    pc_map: Rc<PcVcMap>,
    monitor: Rc<Monitor>,
    routers: Vec<Rc<Router>>,
    interfaces: Vec<Rc<Interface>>,
    channels: Vec<Rc<Channel>>,
}

impl Network {
    /// Construct and wire the whole fabric.
    pub fn new(
        sim: &Rc<Simulator>,
        topology: Rc<dyn Topology>,
        settings: &NetworkSettings,
        traffic_log: Rc<dyn TrafficLog>,
    ) -> Result<Rc<Self>, SetupError> {
        let entity = Rc::new(Entity::new(sim.top(), "network"));
        let vc_counts: Vec<u32> = settings.protocol_classes.iter().map(|pc| pc.num_vcs).collect();
        let pc_map = Rc::new(PcVcMap::new(&vc_counts)?);
        let monitor = Monitor::new(sim);

        if settings.internal_channel_latency == 0 || settings.terminal_channel_latency == 0 {
            weft_engine::config_error!("channel latencies must be at least one cycle");
        }

        // Routers, with one routing algorithm instance per (port, VC).
        let radix = topology.router_radix();
        let mut routers = Vec::with_capacity(topology.num_routers() as usize);
        for id in 0..topology.num_routers() {
            let router = Router::new(
                sim,
                &entity,
                &format!("router_{id}"),
                id,
                radix,
                pc_map.num_vcs(),
                settings.input_buffer_depth,
                &pc_map,
                &monitor,
                &traffic_log,
                &settings.vc_allocation_policy,
                &settings.switch_allocation_policy,
            )?;
            for port in 0..radix {
                for (pc, pc_settings) in settings.protocol_classes.iter().enumerate() {
                    let info = pc_map.pc_vcs(pc as u32);
                    for vc in info.base_vc..info.base_vc + info.num_vcs {
                        let algorithm = topology.create_routing_algorithm(
                            &pc_settings.routing,
                            sim,
                            &pc_map,
                            pc as u32,
                            id,
                            port,
                            vc,
                        )?;
                        router.set_routing_algorithm(port, vc, algorithm);
                    }
                }
            }
            routers.push(router);
        }

        // Interfaces, with one injection algorithm instance per class.
        let mut interfaces = Vec::with_capacity(topology.num_interfaces() as usize);
        for id in 0..topology.num_interfaces() {
            let interface = Interface::new(
                sim,
                &entity,
                &format!("interface_{id}"),
                id,
                settings.input_buffer_depth,
                &pc_map,
            )?;
            for (pc, pc_settings) in settings.protocol_classes.iter().enumerate() {
                let algorithm = topology.create_injection_algorithm(
                    &pc_settings.injection,
                    sim,
                    &pc_map,
                    pc as u32,
                    id,
                )?;
                interface.set_injection_algorithm(pc as u32, algorithm);
            }
            interfaces.push(interface);
        }

        // Terminal channels, both directions per interface.
        let mut channels = Vec::new();
        for (id, interface) in interfaces.iter().enumerate() {
            let (router_id, port) = topology.interface_port(id as u32);
            let router = &routers[router_id as usize];

            let into = Channel::new(
                sim,
                &entity,
                &format!("terminal_in_{id}"),
                settings.terminal_channel_latency,
                &monitor,
            );
            into.set_source(interface.clone(), 0);
            into.set_sink(router.clone(), port);
            interface.connect_output(into.clone());
            router.connect_input(port, into.clone());
            channels.push(into);

            let out_of = Channel::new(
                sim,
                &entity,
                &format!("terminal_out_{id}"),
                settings.terminal_channel_latency,
                &monitor,
            );
            out_of.set_source(router.clone(), port);
            out_of.set_sink(interface.clone(), 0);
            router.connect_output(port, out_of.clone());
            interface.connect_input(out_of.clone());
            channels.push(out_of);
        }

        // Inter-router channels from the topology's wiring list.
        for spec in topology.channels() {
            let channel = Channel::new(
                sim,
                &entity,
                &format!(
                    "internal_{}_p{}_to_{}",
                    spec.src_router, spec.src_port, spec.dst_router
                ),
                settings.internal_channel_latency,
                &monitor,
            );
            let src = &routers[spec.src_router as usize];
            let dst = &routers[spec.dst_router as usize];
            channel.set_source(src.clone(), spec.src_port);
            channel.set_sink(dst.clone(), spec.dst_port);
            src.connect_output(spec.src_port, channel.clone());
            dst.connect_input(spec.dst_port, channel.clone());
            channels.push(channel);
        }

        info!(entity ; "{} routers, {} interfaces, {} channels, {} VCs in {} PCs",
              routers.len(), interfaces.len(), channels.len(),
              pc_map.num_vcs(), pc_map.num_pcs());

        Ok(Rc::new(Self {
            entity,
            topology,
            pc_map,
            monitor,
            routers,
            interfaces,
            channels,
        }))
    }

    pub fn num_routers(&self) -> u32 {
        self.routers.len() as u32
    }

    pub fn num_interfaces(&self) -> u32 {
        self.interfaces.len() as u32
    }

    pub fn interface(&self, id: u32) -> &Rc<Interface> {
        &self.interfaces[id as usize]
    }

    pub fn router(&self, id: u32) -> &Rc<Router> {
        &self.routers[id as usize]
    }

    /// The protocol-class to VC map, fixed for the run.
    pub fn pc_map(&self) -> &Rc<PcVcMap> {
        &self.pc_map
    }

    /// The VC range of protocol class `pc`.
    pub fn pc_vcs(&self, pc: u32) -> PcVcInfo {
        self.pc_map.pc_vcs(pc)
    }

    /// The monitoring window handle.
    pub fn monitor(&self) -> &Rc<Monitor> {
        &self.monitor
    }

    /// Open the monitoring window.
    pub fn start_monitoring(&self) {
        self.monitor.start();
    }

    /// Close the monitoring window.
    pub fn end_monitoring(&self) {
        self.monitor.end();
    }

    pub fn translate_interface_id_to_address(&self, id: u32) -> Vec<u32> {
        self.topology.interface_id_to_address(id)
    }

    pub fn translate_interface_address_to_id(&self, address: &[u32]) -> u32 {
        self.topology.interface_address_to_id(address)
    }

    pub fn translate_router_id_to_address(&self, id: u32) -> Vec<u32> {
        self.topology.router_id_to_address(id)
    }

    pub fn translate_router_address_to_id(&self, address: &[u32]) -> u32 {
        self.topology.router_address_to_id(address)
    }

    /// Minimum routers visited between two interfaces.
    pub fn minimal_hops(&self, source: u32, destination: u32) -> u32 {
        let src = self.topology.interface_id_to_address(source);
        let dst = self.topology.interface_id_to_address(destination);
        self.topology.minimal_hops(&src, &dst)
    }

    /// Emit every channel's utilization over the monitoring window.
    pub fn report_channels(&self, log: &dyn ChannelLog) {
        for channel in &self.channels {
            channel.report(log);
        }
    }
}
