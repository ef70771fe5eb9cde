// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The input-queued, virtual-channel router.
//!
//! Per input port and VC the router keeps a bounded flit buffer, a routing
//! algorithm instance and the route state of the packet at the head of the
//! line. The pipeline stages run in causal order within one router cycle:
//!
//! 1. **Route** - head flits at the head of the line are presented to their
//!    `(input port, input VC)` routing algorithm; the response becomes
//!    usable after the algorithm's latency.
//! 2. **VC allocation** - head flits with a usable response compete for a
//!    downstream VC. A VC is eligible only while it holds no packet, and at
//!    most one head wins a given VC per cycle. Matching is maximal, with
//!    the configured fairness policy across inputs.
//! 3. **Switch allocation** - flits with an allocated hop and a non-zero
//!    downstream credit compete for the crossbar: one flit per input port,
//!    one per output port per cycle.
//! 4. **Crossbar** - winners traverse: the downstream credit is consumed, a
//!    credit is returned upstream for the freed input slot, and the flit
//!    enters the output channel.
//!
//! Credit underflow, buffer overflow and an empty routing response are all
//! fatal - correct configurations never produce them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use weft_engine::component::{Component, EventPayload};
use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_engine::types::SetupError;
use weft_stats::traffic_log::TrafficLog;
use weft_track::entity::Entity;
use weft_track::trace;

use weft_protocols::credit::Credit;
use weft_protocols::flit::Flit;
use weft_protocols::pc::PcVcMap;

use crate::EPSILON_TICK;
use crate::arbiter::{Arbitrate, RoundRobinPolicy, create_policy};
use crate::channel::{Channel, CreditSink, FlitSink};
use crate::network::Monitor;
use crate::routing::RoutingAlgorithm;

const TICK_EVT: u32 = 0;

struct PendingRoute {
    ready_cycle: u64,
    options: Vec<(u32, u32)>,
}

struct InputVc {
    buffer: VecDeque<Flit>,
    route: Option<PendingRoute>,
    allocated: Option<(u32, u32)>,
}

struct OutputVc {
    credits: u32,
    owner: Option<(u32, u32)>,
    tail_sent: bool,
}

/// One router of the fabric.
pub struct Router {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<Router>,
    id: u32,
    num_ports: u32,
    num_vcs: u32,
    buffer_depth: u32,
    pc_map: Rc<PcVcMap>,
    monitor: Rc<Monitor>,
    traffic_log: Rc<dyn TrafficLog>,
    full_name: String,

    inputs: RefCell<Vec<InputVc>>,
    outputs: RefCell<Vec<OutputVc>>,
    routing: RefCell<Vec<Option<Box<dyn RoutingAlgorithm>>>>,
    input_channels: RefCell<Vec<Option<Rc<Channel>>>>,
    output_channels: RefCell<Vec<Option<Rc<Channel>>>>,

    vc_alloc: RefCell<Box<dyn Arbitrate>>,
    switch_alloc: RefCell<Box<dyn Arbitrate>>,
    vc_pick: RefCell<Vec<RoundRobinPolicy>>,

    tick_scheduled: Cell<bool>,
}

#[allow(clippy::too_many_arguments)]
impl Router {
    pub fn new(
        sim: &Rc<Simulator>,
        parent: &Rc<Entity>,
        name: &str,
        id: u32,
        num_ports: u32,
        num_vcs: u32,
        buffer_depth: u32,
        pc_map: &Rc<PcVcMap>,
        monitor: &Rc<Monitor>,
        traffic_log: &Rc<dyn TrafficLog>,
        vc_alloc_policy: &str,
        switch_alloc_policy: &str,
    ) -> Result<Rc<Self>, SetupError> {
        if buffer_depth == 0 {
            weft_engine::config_error!("input buffer depth must be at least one flit");
        }
        let entity = Rc::new(Entity::new(parent, name));
        let full_name = entity.full_name();
        let num_slots = (num_ports * num_vcs) as usize;

        let inputs = (0..num_slots)
            .map(|_| InputVc {
                buffer: VecDeque::new(),
                route: None,
                allocated: None,
            })
            .collect();
        let outputs = (0..num_slots)
            .map(|_| OutputVc {
                credits: buffer_depth,
                owner: None,
                tail_sent: false,
            })
            .collect();

        let vc_alloc = create_policy(vc_alloc_policy, num_slots, None)?;
        let switch_alloc = create_policy(switch_alloc_policy, num_ports as usize, None)?;

        Ok(Rc::new_cyclic(|self_ref| Self {
            entity,
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            id,
            num_ports,
            num_vcs,
            buffer_depth,
            pc_map: pc_map.clone(),
            monitor: monitor.clone(),
            traffic_log: traffic_log.clone(),
            full_name,
            inputs: RefCell::new(inputs),
            outputs: RefCell::new(outputs),
            routing: RefCell::new((0..num_slots).map(|_| None).collect()),
            input_channels: RefCell::new(vec![None; num_ports as usize]),
            output_channels: RefCell::new(vec![None; num_ports as usize]),
            vc_alloc: RefCell::new(vc_alloc),
            switch_alloc: RefCell::new(switch_alloc),
            vc_pick: RefCell::new(
                (0..num_ports).map(|_| RoundRobinPolicy::new()).collect(),
            ),
            tick_scheduled: Cell::new(false),
        }))
    }

    /// This router's id within the network.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Install the routing algorithm instance for `(port, vc)`.
    pub fn set_routing_algorithm(&self, port: u32, vc: u32, algorithm: Box<dyn RoutingAlgorithm>) {
        self.routing.borrow_mut()[self.index(port, vc)] = Some(algorithm);
    }

    /// Attach the channel feeding input `port`; credits for freed buffer
    /// slots are returned on it.
    pub fn connect_input(&self, port: u32, channel: Rc<Channel>) {
        self.input_channels.borrow_mut()[port as usize] = Some(channel);
    }

    /// Attach the channel fed by output `port`.
    pub fn connect_output(&self, port: u32, channel: Rc<Channel>) {
        self.output_channels.borrow_mut()[port as usize] = Some(channel);
    }

    fn index(&self, port: u32, vc: u32) -> usize {
        debug_assert!(port < self.num_ports && vc < self.num_vcs);
        (port * self.num_vcs + vc) as usize
    }

    fn ensure_tick(&self) {
        if !self.tick_scheduled.get() {
            self.tick_scheduled.set(true);
            let time = self.sim.future_cycle(Clock::Router, 1);
            self.sim.add_event(
                time,
                EPSILON_TICK,
                self.self_ref.upgrade().unwrap(),
                None,
                TICK_EVT,
            );
        }
    }

    /// Stage 1: request routes for head flits at the head of the line.
    fn stage_route(&self, cycle: u64) {
        let mut inputs = self.inputs.borrow_mut();
        let mut routing = self.routing.borrow_mut();
        for index in 0..inputs.len() {
            let input = &inputs[index];
            if input.allocated.is_some() || input.route.is_some() {
                continue;
            }
            let Some(flit) = input.buffer.front() else {
                continue;
            };
            assert!(
                flit.head,
                "{}: non-head flit {} at head of line without a route",
                self.entity, flit
            );

            let algorithm = routing[index]
                .as_mut()
                .unwrap_or_else(|| panic!("{}: no routing algorithm at {}", self.entity, index));
            let response = algorithm.route(flit);
            assert!(
                !response.options.is_empty(),
                "{}: empty routing response for {}",
                self.entity,
                flit
            );
            let pc = flit.protocol_class();
            for &(port, vc) in &response.options {
                assert!(port < self.num_ports);
                assert!(
                    self.pc_map.vc_in_pc(pc, vc),
                    "{}: route option vc {} outside protocol class {}",
                    self.entity,
                    vc,
                    pc
                );
            }
            trace!(self.entity ; "routed {}: {:?}", flit, response.options);
            inputs[index].route = Some(PendingRoute {
                ready_cycle: cycle + algorithm.latency(),
                options: response.options,
            });
        }
    }

    /// Stage 2: maximal matching of routed head flits onto idle downstream
    /// VCs.
    fn stage_vc_allocate(&self, cycle: u64) -> bool {
        let mut inputs = self.inputs.borrow_mut();
        let mut outputs = self.outputs.borrow_mut();
        let mut vc_alloc = self.vc_alloc.borrow_mut();
        let mut granted_this_cycle = vec![false; outputs.len()];
        let mut progress = false;

        loop {
            let requests: Vec<bool> = inputs
                .iter()
                .map(|input| {
                    if input.allocated.is_some() {
                        return false;
                    }
                    let Some(route) = &input.route else {
                        return false;
                    };
                    route.ready_cycle <= cycle
                        && route.options.iter().any(|&(port, vc)| {
                            let out = self.index(port, vc);
                            outputs[out].owner.is_none() && !granted_this_cycle[out]
                        })
                })
                .collect();

            let Some(winner) = vc_alloc.arbitrate(&requests) else {
                break;
            };

            let route = inputs[winner].route.take().unwrap();
            let &(port, vc) = route
                .options
                .iter()
                .find(|&&(port, vc)| {
                    let out = self.index(port, vc);
                    outputs[out].owner.is_none() && !granted_this_cycle[out]
                })
                .unwrap();

            let in_port = winner as u32 / self.num_vcs;
            let in_vc = winner as u32 % self.num_vcs;
            let out = self.index(port, vc);
            outputs[out].owner = Some((in_port, in_vc));
            outputs[out].tail_sent = false;
            granted_this_cycle[out] = true;
            inputs[winner].allocated = Some((port, vc));
            progress = true;
            trace!(self.entity ; "vc alloc: input ({in_port},{in_vc}) -> ({port},{vc})");
        }

        progress
    }

    /// Stages 3 and 4: switch allocation and crossbar traversal.
    fn stage_switch(&self) -> bool {
        let mut inputs = self.inputs.borrow_mut();
        let mut outputs = self.outputs.borrow_mut();
        let mut switch_alloc = self.switch_alloc.borrow_mut();
        let mut vc_pick = self.vc_pick.borrow_mut();
        let input_channels = self.input_channels.borrow();
        let output_channels = self.output_channels.borrow();

        let mut output_port_taken = vec![false; self.num_ports as usize];
        let mut input_port_granted = vec![false; self.num_ports as usize];
        let mut progress = false;

        let eligible = |inputs: &Vec<InputVc>,
                        outputs: &Vec<OutputVc>,
                        output_port_taken: &Vec<bool>,
                        index: usize|
         -> bool {
            let input = &inputs[index];
            let Some((port, vc)) = input.allocated else {
                return false;
            };
            if input.buffer.is_empty() {
                return false;
            }
            let out = (port * self.num_vcs + vc) as usize;
            outputs[out].credits > 0
                && !output_port_taken[port as usize]
                && output_channels[port as usize]
                    .as_ref()
                    .map(|c| c.can_send_flit())
                    .unwrap_or(false)
        };

        loop {
            // One flit per input port per cycle; the port-level policy picks
            // the port, a per-port round-robin picks among its VCs.
            let port_requests: Vec<bool> = (0..self.num_ports)
                .map(|port| {
                    !input_port_granted[port as usize]
                        && (0..self.num_vcs).any(|vc| {
                            eligible(
                                &inputs,
                                &outputs,
                                &output_port_taken,
                                (port * self.num_vcs + vc) as usize,
                            )
                        })
                })
                .collect();

            let Some(in_port) = switch_alloc.arbitrate(&port_requests) else {
                break;
            };
            input_port_granted[in_port] = true;

            let vc_requests: Vec<bool> = (0..self.num_vcs)
                .map(|vc| {
                    eligible(
                        &inputs,
                        &outputs,
                        &output_port_taken,
                        in_port * self.num_vcs as usize + vc as usize,
                    )
                })
                .collect();
            let in_vc = vc_pick[in_port].arbitrate(&vc_requests).unwrap();
            let index = in_port * self.num_vcs as usize + in_vc;

            // Crossbar traversal.
            let input = &mut inputs[index];
            let (out_port, out_vc) = input.allocated.unwrap();
            let mut flit = input.buffer.pop_front().unwrap();
            let input_vc_was = flit.vc;
            let out = (out_port * self.num_vcs + out_vc) as usize;

            assert!(outputs[out].credits > 0, "{}: credit underflow", self.entity);
            outputs[out].credits -= 1;

            if flit.head {
                flit.packet.increment_hop_count();
            }
            if flit.tail {
                input.allocated = None;
                debug_assert_eq!(outputs[out].owner, Some((in_port as u32, in_vc as u32)));
                outputs[out].tail_sent = true;
            }

            // Return the freed input slot upstream.
            if let Some(channel) = input_channels[in_port].as_ref() {
                channel.send_credit(Credit {
                    vc: input_vc_was,
                });
            }

            if self.monitor.is_on() {
                self.traffic_log.log_traffic(
                    &self.full_name,
                    in_port as u32,
                    input_vc_was,
                    out_port,
                    out_vc,
                    1,
                );
            }

            trace!(self.entity ; "xbar: {} ({},{}) -> ({},{})",
                   flit, in_port, input_vc_was, out_port, out_vc);
            flit.vc = out_vc;
            output_port_taken[out_port as usize] = true;
            output_channels[out_port as usize]
                .as_ref()
                .unwrap()
                .send_flit(flit);
            progress = true;
        }

        progress
    }

    fn tick(&self) {
        let cycle = self.sim.cycle(Clock::Router);

        self.stage_route(cycle);
        let mut progress = self.stage_vc_allocate(cycle);
        progress |= self.stage_switch();

        // Re-arm only while the router can advance on its own; flits blocked
        // purely on downstream credits are woken by the credit arrival.
        let mut reschedule = progress;
        if !reschedule {
            let inputs = self.inputs.borrow();
            let outputs = self.outputs.borrow();
            for input in inputs.iter() {
                if let Some(route) = &input.route {
                    if route.ready_cycle > cycle {
                        reschedule = true;
                        break;
                    }
                }
                if let Some((port, vc)) = input.allocated {
                    if !input.buffer.is_empty()
                        && outputs[(port * self.num_vcs + vc) as usize].credits > 0
                    {
                        reschedule = true;
                        break;
                    }
                }
            }
        }
        if reschedule {
            self.ensure_tick();
        }
    }
}

impl FlitSink for Router {
    fn receive_flit(&self, port: u32, flit: Flit) {
        let index = self.index(port, flit.vc);
        let mut inputs = self.inputs.borrow_mut();
        let buffer = &mut inputs[index].buffer;
        assert!(
            (buffer.len() as u32) < self.buffer_depth,
            "{}: input buffer overflow at port {} vc {}",
            self.entity,
            port,
            flit.vc
        );
        if flit.head {
            assert!(
                buffer.is_empty(),
                "{}: packet interleaving at port {} vc {}",
                self.entity,
                port,
                flit.vc
            );
        }
        buffer.push_back(flit);
        drop(inputs);
        self.ensure_tick();
    }
}

impl CreditSink for Router {
    fn receive_credit(&self, port: u32, credit: Credit) {
        let index = self.index(port, credit.vc);
        let mut outputs = self.outputs.borrow_mut();
        let output = &mut outputs[index];
        output.credits += 1;
        assert!(
            output.credits <= self.buffer_depth,
            "{}: credit overflow at port {} vc {}",
            self.entity,
            port,
            credit.vc
        );
        // The VC is idle again once the packet has fully drained downstream.
        if output.owner.is_some() && output.tail_sent && output.credits == self.buffer_depth {
            output.owner = None;
        }
        drop(outputs);
        self.ensure_tick();
    }
}

impl Component for Router {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, _payload: EventPayload, kind: u32) {
        assert_eq!(kind, TICK_EVT, "{}: unknown event kind {}", self.entity, kind);
        self.tick_scheduled.set(false);
        self.tick();
    }
}
