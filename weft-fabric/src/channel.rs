// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The wire: a latency pipeline between two devices.
//!
//! A channel is directed. Flits travel forward from the source device's
//! output port to the sink device's input port; credits travel backward
//! with identical latency semantics. Each direction accepts at most one
//! item per channel cycle - offering a second is a contract violation
//! (callers must honor credits), so the in-flight count never exceeds the
//! pipeline depth.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use weft_engine::component::{Component, EventPayload};
use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_stats::channel_log::ChannelLog;
use weft_track::entity::Entity;

use weft_protocols::credit::Credit;
use weft_protocols::flit::Flit;

use crate::network::Monitor;
use crate::{EPSILON_CREDIT, EPSILON_FLIT};

const FLIT_EVT: u32 = 0;
const CREDIT_EVT: u32 = 1;

const NO_CYCLE: u64 = u64::MAX;

/// A device side that accepts flits from a channel.
pub trait FlitSink {
    /// Deliver `flit` to input port `port`.
    fn receive_flit(&self, port: u32, flit: Flit);
}

/// A device side that accepts credits from a channel.
pub trait CreditSink {
    /// Deliver `credit` to output port `port`.
    fn receive_credit(&self, port: u32, credit: Credit);
}

/// One directed wire.
pub struct Channel {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<Channel>,
    latency: u64,

    sink: RefCell<Option<(Rc<dyn FlitSink>, u32)>>,
    source: RefCell<Option<(Rc<dyn CreditSink>, u32)>>,

    // One item per direction per channel cycle.
    flit_send_cycle: Cell<u64>,
    credit_send_cycle: Cell<u64>,

    monitor: Rc<Monitor>,
    monitored_flits: Cell<u64>,
}

impl Channel {
    pub fn new(
        sim: &Rc<Simulator>,
        parent: &Rc<Entity>,
        name: &str,
        latency: u64,
        monitor: &Rc<Monitor>,
    ) -> Rc<Self> {
        assert!(latency > 0, "channel latency must be at least one cycle");
        Rc::new_cyclic(|self_ref| Self {
            entity: Rc::new(Entity::new(parent, name)),
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            latency,
            sink: RefCell::new(None),
            source: RefCell::new(None),
            flit_send_cycle: Cell::new(NO_CYCLE),
            credit_send_cycle: Cell::new(NO_CYCLE),
            monitor: monitor.clone(),
            monitored_flits: Cell::new(0),
        })
    }

    /// Pipeline depth (= latency) in channel cycles.
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// Attach the flit-receiving device and its input port.
    pub fn set_sink(&self, device: Rc<dyn FlitSink>, port: u32) {
        *self.sink.borrow_mut() = Some((device, port));
    }

    /// Attach the flit-sending device and its output port; it receives the
    /// credits.
    pub fn set_source(&self, device: Rc<dyn CreditSink>, port: u32) {
        *self.source.borrow_mut() = Some((device, port));
    }

    /// Whether the forward slot for the current channel cycle is still free.
    pub fn can_send_flit(&self) -> bool {
        self.flit_send_cycle.get() != self.sim.cycle(Clock::Channel)
    }

    /// Offer a flit to the wire. At most one per channel cycle.
    pub fn send_flit(&self, flit: Flit) {
        let cycle = self.sim.cycle(Clock::Channel);
        assert!(
            self.flit_send_cycle.get() != cycle,
            "{}: two flits offered in cycle {}",
            self.entity,
            cycle
        );
        self.flit_send_cycle.set(cycle);

        let time = self.sim.future_cycle(Clock::Channel, self.latency);
        self.sim.add_event(
            time,
            EPSILON_FLIT,
            self.self_ref.upgrade().unwrap(),
            Some(Box::new(flit)),
            FLIT_EVT,
        );
    }

    /// Offer a credit to the reverse direction. At most one per channel
    /// cycle.
    pub fn send_credit(&self, credit: Credit) {
        let cycle = self.sim.cycle(Clock::Channel);
        assert!(
            self.credit_send_cycle.get() != cycle,
            "{}: two credits offered in cycle {}",
            self.entity,
            cycle
        );
        self.credit_send_cycle.set(cycle);

        let time = self.sim.future_cycle(Clock::Channel, self.latency);
        self.sim.add_event(
            time,
            EPSILON_CREDIT,
            self.self_ref.upgrade().unwrap(),
            Some(Box::new(credit)),
            CREDIT_EVT,
        );
    }

    /// Emit this channel's utilization over the monitoring window.
    pub fn report(&self, log: &dyn ChannelLog) {
        log.log_channel(
            &self.entity.full_name(),
            self.monitored_flits.get(),
            self.monitor.cycles(),
        );
    }
}

impl Component for Channel {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, payload: EventPayload, kind: u32) {
        match kind {
            FLIT_EVT => {
                let flit = payload
                    .expect("flit event without payload")
                    .downcast::<Flit>()
                    .expect("flit event with non-flit payload");
                if self.monitor.is_on() {
                    self.monitored_flits.set(self.monitored_flits.get() + 1);
                }
                let sink = self.sink.borrow();
                let (device, port) = sink.as_ref().expect("channel sink not connected");
                device.receive_flit(*port, *flit);
            }
            CREDIT_EVT => {
                let credit = payload
                    .expect("credit event without payload")
                    .downcast::<Credit>()
                    .expect("credit event with non-credit payload");
                let source = self.source.borrow();
                let (device, port) = source.as_ref().expect("channel source not connected");
                device.receive_credit(*port, *credit);
            }
            _ => panic!("{}: unknown event kind {}", self.entity, kind),
        }
    }
}
