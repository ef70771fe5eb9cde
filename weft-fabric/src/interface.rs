// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The host side of the fabric.
//!
//! An interface owns the per-protocol-class injection side and the ejection
//! side of one terminal. Injection runs the class's injection algorithm per
//! packet, queues the flits per VC, and feeds the outgoing channel under
//! the same credit discipline as a router output: a packet may start onto a
//! VC only while the downstream input VC is empty, and every flit needs a
//! credit. Ejection reassembles arriving flits into messages by flit count
//! and hands completed messages to the attached receiver.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use weft_engine::component::{Component, EventPayload};
use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_engine::types::SetupError;
use weft_track::entity::Entity;
use weft_track::trace;

use weft_protocols::credit::Credit;
use weft_protocols::flit::Flit;
use weft_protocols::message::Message;
use weft_protocols::pc::PcVcMap;

use crate::EPSILON_TICK;
use crate::arbiter::{Arbitrate, RoundRobinPolicy};
use crate::channel::{Channel, CreditSink, FlitSink};
use crate::routing::InjectionAlgorithm;

const TICK_EVT: u32 = 0;

/// Receiver of fully reassembled messages; implemented by the workload.
pub trait MessageReceiver {
    /// `message` fully arrived at interface `interface_id`.
    fn message_arrived(&self, interface_id: u32, message: Rc<Message>);
}

struct Receiving {
    message: Rc<Message>,
    flits_arrived: u32,
}

/// One terminal's attachment point to the fabric.
pub struct Interface {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<Interface>,
    id: u32,
    num_vcs: u32,
    buffer_depth: u32,
    pc_map: Rc<PcVcMap>,

    injection: RefCell<Vec<Option<Box<dyn InjectionAlgorithm>>>>,
    queues: RefCell<Vec<VecDeque<Flit>>>,
    credits: RefCell<Vec<u32>>,
    vc_rr: RefCell<RoundRobinPolicy>,

    output_channel: RefCell<Option<Rc<Channel>>>,
    input_channel: RefCell<Option<Rc<Channel>>>,
    receiver: RefCell<Option<Rc<dyn MessageReceiver>>>,
    receiving: RefCell<HashMap<u64, Receiving>>,

    tick_scheduled: Cell<bool>,
}

impl Interface {
    pub fn new(
        sim: &Rc<Simulator>,
        parent: &Rc<Entity>,
        name: &str,
        id: u32,
        buffer_depth: u32,
        pc_map: &Rc<PcVcMap>,
    ) -> Result<Rc<Self>, SetupError> {
        if buffer_depth == 0 {
            weft_engine::config_error!("input buffer depth must be at least one flit");
        }
        let num_vcs = pc_map.num_vcs();
        Ok(Rc::new_cyclic(|self_ref| Self {
            entity: Rc::new(Entity::new(parent, name)),
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            id,
            num_vcs,
            buffer_depth,
            pc_map: pc_map.clone(),
            injection: RefCell::new((0..pc_map.num_pcs()).map(|_| None).collect()),
            queues: RefCell::new((0..num_vcs).map(|_| VecDeque::new()).collect()),
            credits: RefCell::new(vec![buffer_depth; num_vcs as usize]),
            vc_rr: RefCell::new(RoundRobinPolicy::new()),
            output_channel: RefCell::new(None),
            input_channel: RefCell::new(None),
            receiver: RefCell::new(None),
            receiving: RefCell::new(HashMap::new()),
            tick_scheduled: Cell::new(false),
        }))
    }

    /// This interface's id within the network.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Install the injection algorithm instance for protocol class `pc`.
    pub fn set_injection_algorithm(&self, pc: u32, algorithm: Box<dyn InjectionAlgorithm>) {
        self.injection.borrow_mut()[pc as usize] = Some(algorithm);
    }

    /// Attach the channel into the fabric.
    pub fn connect_output(&self, channel: Rc<Channel>) {
        *self.output_channel.borrow_mut() = Some(channel);
    }

    /// Attach the channel out of the fabric; ejection credits return on it.
    pub fn connect_input(&self, channel: Rc<Channel>) {
        *self.input_channel.borrow_mut() = Some(channel);
    }

    /// Attach the terminal-side receiver of reassembled messages.
    pub fn set_receiver(&self, receiver: Rc<dyn MessageReceiver>) {
        *self.receiver.borrow_mut() = Some(receiver);
    }

    /// Queue a stamped message for injection. `flits` is the message's flits
    /// in packetization order, as produced by
    /// [`Message::assemble`](weft_protocols::message::Message::assemble).
    pub fn inject_message(&self, message: &Rc<Message>, flits: Vec<Flit>) {
        let pc = message.protocol_class;
        let mut injection = self.injection.borrow_mut();
        let algorithm = injection[pc as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("{}: no injection algorithm for pc {}", self.entity, pc));

        let mut queues = self.queues.borrow_mut();
        let mut packet_vc = 0;
        for mut flit in flits {
            if flit.head {
                let (port, vc) = algorithm.inject(message, flit.packet.id);
                assert_eq!(port, 0, "{}: interfaces have a single port", self.entity);
                assert!(
                    self.pc_map.vc_in_pc(pc, vc),
                    "{}: injection vc {} outside protocol class {}",
                    self.entity,
                    vc,
                    pc
                );
                packet_vc = vc;
            }
            flit.vc = packet_vc;
            queues[packet_vc as usize].push_back(flit);
        }
        drop(queues);
        drop(injection);
        trace!(self.entity ; "queued {} for injection", message);
        self.ensure_tick();
    }

    fn ensure_tick(&self) {
        if !self.tick_scheduled.get() {
            self.tick_scheduled.set(true);
            let time = self.sim.future_cycle(Clock::Interface, 1);
            self.sim.add_event(
                time,
                EPSILON_TICK,
                self.self_ref.upgrade().unwrap(),
                None,
                TICK_EVT,
            );
        }
    }

    /// Whether the head of `queue` may enter the channel right now: a head
    /// flit needs the downstream VC fully drained, a body flit one credit.
    fn vc_eligible(&self, queue: &VecDeque<Flit>, credits: u32) -> bool {
        match queue.front() {
            None => false,
            Some(flit) if flit.head => credits == self.buffer_depth,
            Some(_) => credits > 0,
        }
    }

    fn tick(&self) {
        let output = self.output_channel.borrow();
        let channel = output.as_ref().expect("interface output not connected");

        let mut queues = self.queues.borrow_mut();
        let mut credits = self.credits.borrow_mut();
        let mut progress = false;

        if channel.can_send_flit() {
            let requests: Vec<bool> = (0..self.num_vcs as usize)
                .map(|vc| self.vc_eligible(&queues[vc], credits[vc]))
                .collect();
            if let Some(vc) = self.vc_rr.borrow_mut().arbitrate(&requests) {
                let flit = queues[vc].pop_front().unwrap();
                credits[vc] -= 1;
                flit.packet.message.mark_injected(self.sim.time());
                trace!(self.entity ; "inject {} on vc {}", flit, vc);
                channel.send_flit(flit);
                progress = true;
            }
        }

        // Re-arm while sending can continue without an external credit.
        let reschedule = if progress {
            queues.iter().any(|q| !q.is_empty())
        } else {
            // Only the channel slot could have blocked us; a credit-blocked
            // VC is woken by the credit's arrival.
            !channel.can_send_flit()
                && (0..self.num_vcs as usize)
                    .any(|vc| self.vc_eligible(&queues[vc], credits[vc]))
        };
        drop(queues);
        drop(credits);
        drop(output);
        if reschedule {
            self.ensure_tick();
        }
    }
}

impl FlitSink for Interface {
    fn receive_flit(&self, port: u32, flit: Flit) {
        debug_assert_eq!(port, 0);

        // The ejection side drains unconditionally: hand the slot straight
        // back to the router.
        self.input_channel
            .borrow()
            .as_ref()
            .expect("interface input not connected")
            .send_credit(Credit { vc: flit.vc });

        let message = flit.packet.message.clone();
        let complete = {
            let mut receiving = self.receiving.borrow_mut();
            let entry = receiving.entry(message.id()).or_insert_with(|| Receiving {
                message: message.clone(),
                flits_arrived: 0,
            });
            entry.flits_arrived += 1;
            assert!(entry.flits_arrived <= message.num_flits);
            if entry.flits_arrived == message.num_flits {
                receiving.remove(&message.id());
                true
            } else {
                false
            }
        };

        if complete {
            message.mark_delivered(self.sim.time());
            trace!(self.entity ; "delivered {}", message);
            let receiver = self.receiver.borrow().clone();
            receiver
                .expect("interface has no receiver attached")
                .message_arrived(self.id, message);
        }
    }
}

impl CreditSink for Interface {
    fn receive_credit(&self, port: u32, credit: Credit) {
        debug_assert_eq!(port, 0);
        let mut credits = self.credits.borrow_mut();
        let slot = &mut credits[credit.vc as usize];
        *slot += 1;
        assert!(
            *slot <= self.buffer_depth,
            "{}: credit overflow on vc {}",
            self.entity,
            credit.vc
        );
        drop(credits);
        self.ensure_tick();
    }
}

impl Component for Interface {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, _payload: EventPayload, kind: u32) {
        assert_eq!(kind, TICK_EVT, "{}: unknown event kind {}", self.entity, kind);
        self.tick_scheduled.set(false);
        self.tick();
    }
}
