// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The blast workload: fixed-rate request traffic with optional responses.
//!
//! Every terminal issues transactions of `transaction_size` request
//! messages at `request_injection_rate` flits per cycle. The application
//! runs the coarse measurement state machine (WARMING, LOGGING, BLABBING,
//! DRAINING); each terminal runs the finer per-host machine and the
//! warm-up / saturation detector over its enroute flit count. Transactions
//! started during the logging phase are tagged into the message log; the
//! terminal completes when its tagged transaction count reaches
//! `num_transactions`.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use serde::Deserialize;
use weft_engine::component::{Component, EventPayload};
use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_engine::types::SetupError;
use weft_fabric::interface::Interface;
use weft_fabric::network::Network;
use weft_stats::message_log::MessageLog;
use weft_track::entity::Entity;
use weft_track::{debug, info};

use weft_protocols::message::Message;

use crate::size::MessageSizeDistribution;
use crate::terminal::{SendAccounting, TransactionTracker, cycles_to_send};
use crate::traffic::ContinuousTrafficPattern;
use crate::warmup::{Verdict, WarmupDetector};
use crate::workload::{Registries, Workload};

/// Request message opcode.
pub const REQUEST_OP: u32 = 0xFA;
/// Response message opcode.
pub const RESPONSE_OP: u32 = 0x82;

// Terminal event kinds.
const REQUEST_EVT: u32 = REQUEST_OP;
const RESPONSE_EVT: u32 = RESPONSE_OP;

// Application event kinds.
const FORCE_WARMED_EVT: u32 = 0x123;
const MAX_SATURATION_EVT: u32 = 0x456;

#[derive(Clone, Debug, Deserialize)]
struct Settings {
    kill_on_saturation: bool,
    log_during_saturation: bool,
    #[serde(default)]
    max_saturation_cycles: u64,
    warmup_threshold: f64,
    blast_terminal: TerminalSettings,
}

#[derive(Clone, Debug, Deserialize)]
struct TerminalSettings {
    request_injection_rate: f64,
    num_transactions: u32,
    transaction_size: u32,
    max_packet_size: u32,
    request_protocol_class: u32,
    enable_responses: bool,
    #[serde(default)]
    request_processing_latency: u64,
    response_protocol_class: Option<u32>,
    traffic_pattern: TrafficChoice,
    message_size_distribution: SizeChoice,
    warmup_interval: u32,
    warmup_window: u32,
    warmup_attempts: u32,
}

#[derive(Clone, Debug, Deserialize)]
struct TrafficChoice {
    pattern: String,
    #[serde(default)]
    settings: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
struct SizeChoice {
    distribution: String,
    #[serde(default)]
    settings: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd)]
enum AppFsm {
    Warming,
    Logging,
    Blabbing,
    Draining,
}

/// The blast application: owns the terminals and the coarse FSM.
pub struct Application {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<Application>,
    workload: Weak<Workload>,

    kill_on_saturation: bool,
    log_during_saturation: bool,
    max_saturation_cycles: u64,
    warmup_threshold: f64,

    terminals: RefCell<Vec<Rc<BlastTerminal>>>,
    active_terminals: u32,

    fsm: Cell<AppFsm>,
    do_logging: Cell<bool>,
    warmed_terminals: Cell<u32>,
    saturated_terminals: Cell<u32>,
    completed_terminals: Cell<u32>,
    done_terminals: Cell<u32>,
}

impl Application {
    pub fn new(
        sim: &Rc<Simulator>,
        parent: &Rc<Entity>,
        network: &Rc<Network>,
        workload: Weak<Workload>,
        settings: &serde_json::Value,
        message_log: Rc<dyn MessageLog>,
        registries: &Registries,
    ) -> Result<Rc<Self>, SetupError> {
        let settings: Settings = match serde_json::from_value(settings.clone()) {
            Ok(s) => s,
            Err(e) => return weft_engine::config_error!(format!("bad blast settings: {e}")),
        };
        if !(0.0..=1.0).contains(&settings.warmup_threshold) {
            weft_engine::config_error!("warmup_threshold must be within [0, 1]");
        }
        if settings.log_during_saturation && settings.max_saturation_cycles == 0 {
            weft_engine::config_error!("log_during_saturation needs max_saturation_cycles");
        }

        let num_terminals = network.num_interfaces();
        let active = if settings.blast_terminal.request_injection_rate > 0.0 {
            num_terminals
        } else {
            0
        };
        if active == 0 {
            weft_engine::config_error!("blast needs a positive request_injection_rate");
        }

        let application = Rc::new_cyclic(|self_ref| Self {
            entity: Rc::new(Entity::new(parent, "blast")),
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            workload,
            kill_on_saturation: settings.kill_on_saturation,
            log_during_saturation: settings.log_during_saturation,
            max_saturation_cycles: settings.max_saturation_cycles,
            warmup_threshold: settings.warmup_threshold,
            terminals: RefCell::new(Vec::new()),
            active_terminals: active,
            fsm: Cell::new(AppFsm::Warming),
            do_logging: Cell::new(false),
            warmed_terminals: Cell::new(0),
            saturated_terminals: Cell::new(0),
            completed_terminals: Cell::new(0),
            done_terminals: Cell::new(0),
        });

        {
            let mut terminals = application.terminals.borrow_mut();
            for id in 0..num_terminals {
                terminals.push(BlastTerminal::new(
                    sim,
                    &application.entity,
                    id,
                    Rc::downgrade(&application),
                    network.interface(id).clone(),
                    &settings.blast_terminal,
                    message_log.clone(),
                    registries,
                    num_terminals,
                )?);
            }
        }
        info!(application.entity ; "{} active terminals", active);

        // Nothing to wait for when the threshold is zero: force the warmed
        // transition at time zero.
        if application.warmup_threshold == 0.0 {
            sim.add_event(
                0,
                0,
                application.clone(),
                None,
                FORCE_WARMED_EVT,
            );
        }

        Ok(application)
    }

    fn workload(&self) -> Rc<Workload> {
        self.workload.upgrade().unwrap()
    }

    /// Route a completed message to the sender's delivered hook, then the
    /// receiving terminal's received hook.
    pub fn message_arrived(&self, interface_id: u32, message: Rc<Message>) {
        let terminals = self.terminals.borrow();
        terminals[message.source() as usize].handle_delivered_message(&message);
        terminals[interface_id as usize].handle_received_message(message);
    }

    /// Move every terminal into its measured phase (or straight to
    /// draining after an unlogged saturation).
    pub fn start(&self) {
        let terminals = self.terminals.borrow();
        for terminal in terminals.iter() {
            if self.do_logging.get() {
                terminal.start_logging();
            } else {
                terminal.stop_sending();
            }
        }
        drop(terminals);
        if !self.do_logging.get() {
            self.workload().application_complete();
        }
    }

    /// End the measured phase.
    pub fn stop(&self) {
        if self.do_logging.get() {
            for terminal in self.terminals.borrow().iter() {
                terminal.stop_logging();
            }
        } else {
            self.workload().application_done();
        }
    }

    /// Stop all sending; the fabric drains whatever is left.
    pub fn kill(&self) {
        if self.do_logging.get() {
            for terminal in self.terminals.borrow().iter() {
                terminal.stop_sending();
            }
        }
    }

    fn warm_all_terminals(&self) {
        for terminal in self.terminals.borrow().iter() {
            terminal.stop_warming();
        }
    }

    /// A terminal's detector declared it warmed; `None` is the forced
    /// transition for a zero threshold.
    pub fn terminal_warmed(&self, id: Option<u32>) {
        assert_eq!(self.fsm.get(), AppFsm::Warming);
        if let Some(id) = id {
            self.warmed_terminals.set(self.warmed_terminals.get() + 1);
            debug!(self.entity ; "terminal {} is warmed ({} of {})",
                   id, self.warmed_terminals.get(), self.active_terminals);
        }
        assert!(self.warmed_terminals.get() <= self.active_terminals);

        let percent_warmed =
            f64::from(self.warmed_terminals.get()) / f64::from(self.active_terminals);
        if percent_warmed >= self.warmup_threshold {
            info!(self.entity ; "warmup threshold {} reached", self.warmup_threshold);
            self.fsm.set(AppFsm::Logging);
            self.do_logging.set(true);
            self.warm_all_terminals();
            self.workload().application_ready();
        }
    }

    /// A terminal's detector declared it saturated.
    pub fn terminal_saturated(&self, id: u32) {
        assert_eq!(self.fsm.get(), AppFsm::Warming);
        self.saturated_terminals.set(self.saturated_terminals.get() + 1);
        debug!(self.entity ; "terminal {} is saturated ({} of {})",
               id, self.saturated_terminals.get(), self.active_terminals);
        assert!(self.saturated_terminals.get() <= self.active_terminals);

        let percent_saturated =
            f64::from(self.saturated_terminals.get()) / f64::from(self.active_terminals);
        if percent_saturated > (1.0 - self.warmup_threshold) {
            if self.kill_on_saturation {
                // The run succeeded in determining saturation; leave now.
                info!(self.entity ; "saturated, killing the run");
                std::process::exit(0);
            } else if self.log_during_saturation {
                info!(self.entity ; "saturated, logging anyway");
                self.fsm.set(AppFsm::Logging);
                self.do_logging.set(true);
                self.warm_all_terminals();
                self.workload().application_ready();

                // Bound the logging phase.
                let timeout = self
                    .sim
                    .future_cycle(Clock::Terminal, self.max_saturation_cycles);
                self.sim.add_event(
                    timeout,
                    0,
                    self.self_ref.upgrade().unwrap(),
                    None,
                    MAX_SATURATION_EVT,
                );
            } else {
                info!(self.entity ; "saturated, draining");
                self.fsm.set(AppFsm::Draining);
                self.do_logging.set(false);
                self.warm_all_terminals();
                self.workload().application_ready();
            }
        }
    }

    /// A terminal finished its logged transactions.
    pub fn terminal_complete(&self, id: u32) {
        self.completed_terminals.set(self.completed_terminals.get() + 1);
        debug!(self.entity ; "terminal {} is done logging ({} of {})",
               id, self.completed_terminals.get(), self.active_terminals);
        assert!(self.completed_terminals.get() <= self.active_terminals);
        if self.completed_terminals.get() == self.active_terminals
            && self.fsm.get() == AppFsm::Logging
        {
            info!(self.entity ; "all terminals are done logging");
            self.fsm.set(AppFsm::Blabbing);
            self.workload().application_complete();
        }
    }

    /// A terminal has no logged transactions left in flight.
    pub fn terminal_done(&self, id: u32) {
        self.done_terminals.set(self.done_terminals.get() + 1);
        debug!(self.entity ; "terminal {} is done sending ({} of {})",
               id, self.done_terminals.get(), self.active_terminals);
        assert!(self.done_terminals.get() <= self.active_terminals);
        if self.done_terminals.get() == self.active_terminals {
            info!(self.entity ; "all terminals are done sending");
            self.fsm.set(AppFsm::Draining);
            self.workload().application_done();
        }
    }
}

impl Component for Application {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, _payload: EventPayload, kind: u32) {
        match kind {
            FORCE_WARMED_EVT => {
                self.terminal_warmed(None);
            }
            MAX_SATURATION_EVT => {
                // A sentinel timeout: no-op unless we are still logging.
                if self.fsm.get() == AppFsm::Logging {
                    info!(self.entity ; "max saturation time reached");
                    self.fsm.set(AppFsm::Blabbing);
                    self.workload().application_complete();
                }
            }
            _ => panic!("{}: unknown event kind {}", self.entity, kind),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TerminalFsm {
    Warming,
    WarmBlabbing,
    Logging,
    LogBlabbing,
    Draining,
}

/// One blast terminal.
pub struct BlastTerminal {
    pub entity: Rc<Entity>,
    sim: Rc<Simulator>,
    self_ref: Weak<BlastTerminal>,
    id: u32,
    application: Weak<Application>,
    interface: Rc<Interface>,
    message_log: Rc<dyn MessageLog>,

    request_injection_rate: f64,
    num_transactions: u32,
    transaction_size: u32,
    max_packet_size: u32,
    request_protocol_class: u32,
    enable_responses: bool,
    request_processing_latency: u64,
    response_protocol_class: u32,

    traffic_pattern: RefCell<Box<dyn ContinuousTrafficPattern>>,
    size_distribution: RefCell<Box<dyn MessageSizeDistribution>>,

    fsm: Cell<TerminalFsm>,
    detector: RefCell<WarmupDetector>,
    accounting: RefCell<SendAccounting>,
    transactions: RefCell<TransactionTracker>,
    transactions_to_log: RefCell<HashSet<u64>>,
    loggable_complete_count: Cell<u32>,
    notified_done: Cell<bool>,
}

impl BlastTerminal {
    #[allow(clippy::too_many_arguments)]
    fn new(
        sim: &Rc<Simulator>,
        parent: &Rc<Entity>,
        id: u32,
        application: Weak<Application>,
        interface: Rc<Interface>,
        settings: &TerminalSettings,
        message_log: Rc<dyn MessageLog>,
        registries: &Registries,
        num_terminals: u32,
    ) -> Result<Rc<Self>, SetupError> {
        if !(0.0..=1.0).contains(&settings.request_injection_rate) {
            weft_engine::config_error!("request_injection_rate must be within [0, 1]");
        }
        if settings.transaction_size == 0 {
            weft_engine::config_error!("transaction_size must be at least 1");
        }
        if settings.max_packet_size == 0 {
            weft_engine::config_error!("max_packet_size must be at least 1");
        }
        if settings.enable_responses && settings.response_protocol_class.is_none() {
            weft_engine::config_error!("enable_responses needs response_protocol_class");
        }
        if settings.warmup_window < 5 {
            weft_engine::config_error!("warmup_window must hold at least 5 samples");
        }
        if settings.warmup_attempts == 0 {
            weft_engine::config_error!("warmup_attempts must be at least 1");
        }

        let traffic_pattern = registries.traffic.create(
            &settings.traffic_pattern.pattern,
            &settings.traffic_pattern.settings,
            sim,
            num_terminals,
            id,
        )?;
        let size_distribution = registries.sizes.create(
            &settings.message_size_distribution.distribution,
            &settings.message_size_distribution.settings,
            sim,
        )?;

        // A message may never span more than half a warmup interval, or the
        // detector's sampling cadence breaks down; reject rather than clamp.
        if settings.warmup_interval > 0 {
            if settings.warmup_interval < 100 {
                weft_engine::config_error!("warmup_interval must be 0 or at least 100");
            }
            if settings.warmup_interval < 2 * size_distribution.max_message_size() {
                weft_engine::config_error!(format!(
                    "warmup_interval {} is less than twice the maximum message size {}",
                    settings.warmup_interval,
                    size_distribution.max_message_size()
                ));
            }
        }

        let terminal = Rc::new_cyclic(|self_ref| Self {
            entity: Rc::new(Entity::new(parent, &format!("terminal_{id}"))),
            sim: sim.clone(),
            self_ref: self_ref.clone(),
            id,
            application,
            interface,
            message_log,
            request_injection_rate: settings.request_injection_rate,
            num_transactions: settings.num_transactions,
            transaction_size: settings.transaction_size,
            max_packet_size: settings.max_packet_size,
            request_protocol_class: settings.request_protocol_class,
            enable_responses: settings.enable_responses,
            request_processing_latency: settings.request_processing_latency,
            response_protocol_class: settings.response_protocol_class.unwrap_or(0),
            traffic_pattern: RefCell::new(traffic_pattern),
            size_distribution: RefCell::new(size_distribution),
            fsm: Cell::new(TerminalFsm::Warming),
            detector: RefCell::new(WarmupDetector::new(
                settings.warmup_interval,
                settings.warmup_window as usize,
                settings.warmup_attempts,
            )),
            accounting: RefCell::new(SendAccounting::new(id)),
            transactions: RefCell::new(TransactionTracker::new()),
            transactions_to_log: RefCell::new(HashSet::new()),
            loggable_complete_count: Cell::new(0),
            notified_done: Cell::new(false),
        });

        // Start at a random cycle within three transaction times, so the
        // terminals do not inject in lockstep.
        if terminal.request_injection_rate > 0.0 {
            let max_message = terminal.size_distribution.borrow().max_message_size();
            let max_transaction = max_message * terminal.transaction_size;
            let cycles = cycles_to_send(sim, terminal.request_injection_rate, max_transaction);
            let cycles = sim.random.next_u64(1, 1 + cycles * 3);
            let time = sim.future_cycle(Clock::Channel, 1)
                + (cycles - 1) * sim.cycle_time(Clock::Channel);
            sim.add_event(time, 0, terminal.clone(), None, REQUEST_EVT);
            debug!(terminal.entity ; "start time is {}", time);
        } else {
            debug!(terminal.entity ; "not running");
        }

        Ok(terminal)
    }

    fn application(&self) -> Rc<Application> {
        self.application.upgrade().unwrap()
    }

    /// Leave WARMING; the detector is no longer consulted.
    pub fn stop_warming(&self) {
        self.fsm.set(TerminalFsm::WarmBlabbing);
    }

    /// Enter the measured phase: transactions started from here are tagged.
    pub fn start_logging(&self) {
        self.fsm.set(TerminalFsm::Logging);
        if self.request_injection_rate > 0.0 && self.num_transactions == 0 {
            self.complete();
        }
    }

    /// Stop tagging new transactions; finish the tagged ones in flight.
    pub fn stop_logging(&self) {
        self.fsm.set(TerminalFsm::LogBlabbing);
        if self.request_injection_rate > 0.0
            && (self.num_transactions == 0 || self.transactions_to_log.borrow().is_empty())
        {
            self.done();
        }
    }

    /// Stop issuing transactions entirely.
    pub fn stop_sending(&self) {
        self.fsm.set(TerminalFsm::Draining);
    }

    /// A message this terminal sent was fully delivered.
    fn handle_delivered_message(&self, message: &Rc<Message>) {
        self.accounting.borrow_mut().delivered(message.num_flits);

        if self.fsm.get() == TerminalFsm::Warming {
            self.warm_detector(message);
        }

        if message.opcode == REQUEST_OP {
            // Request-only transaction tracking.
            let transaction = message.transaction;
            let last_of_transaction = if self.enable_responses {
                false
            } else {
                self.transactions.borrow_mut().complete_one(transaction)
            };

            if self.transactions_to_log.borrow().contains(&transaction) {
                self.message_log.log_message(message);
                if !self.enable_responses && last_of_transaction {
                    self.complete_loggable(transaction);
                }
            }
        }
    }

    /// A message arrived for this terminal.
    fn handle_received_message(&self, message: Rc<Message>) {
        if message.opcode == RESPONSE_OP {
            assert!(self.enable_responses);
            let transaction = message.transaction;
            let last_of_transaction = self.transactions.borrow_mut().complete_one(transaction);

            if self.transactions_to_log.borrow().contains(&transaction) {
                self.message_log.log_message(&message);
                if last_of_transaction {
                    self.complete_loggable(transaction);
                }
            }
        } else if self.enable_responses && message.opcode == REQUEST_OP {
            if self.request_processing_latency == 0 {
                self.send_response(&message);
            } else {
                let time = self
                    .sim
                    .future_cycle(Clock::Channel, self.request_processing_latency);
                self.sim.add_event(
                    time,
                    0,
                    self.self_ref.upgrade().unwrap(),
                    Some(Box::new(message)),
                    RESPONSE_EVT,
                );
            }
        }
    }

    fn warm_detector(&self, message: &Rc<Message>) {
        let enroute = self.accounting.borrow().enroute_flits();
        let verdict = self.detector.borrow_mut().delivered(
            message.num_flits,
            enroute,
            self.sim.cycle(Clock::Channel),
        );
        if let Some(verdict) = verdict {
            self.fsm.set(TerminalFsm::WarmBlabbing);
            match verdict {
                Verdict::Warmed => {
                    debug!(self.entity ; "warmed");
                    self.application().terminal_warmed(Some(self.id));
                }
                Verdict::Saturated => {
                    debug!(self.entity ; "saturated");
                    self.application().terminal_saturated(self.id);
                }
            }
        }
    }

    fn complete(&self) {
        self.application().terminal_complete(self.id);
    }

    fn done(&self) {
        if !self.notified_done.get() {
            self.notified_done.set(true);
            self.application().terminal_done(self.id);
        }
    }

    /// Close out a tagged transaction in the log and check for completion.
    fn complete_loggable(&self, transaction: u64) {
        assert!(!self.transactions.borrow().is_open(transaction));
        let removed = self.transactions_to_log.borrow_mut().remove(&transaction);
        assert!(removed);

        self.message_log.end_transaction(transaction);
        self.loggable_complete_count
            .set(self.loggable_complete_count.get() + 1);

        if self.loggable_complete_count.get() == self.num_transactions {
            self.complete();
            return;
        }

        if self.fsm.get() == TerminalFsm::LogBlabbing
            && self.transactions_to_log.borrow().is_empty()
        {
            self.done();
        }
    }

    fn start_transaction(&self) {
        assert_ne!(self.fsm.get(), TerminalFsm::Draining);

        let destination = self.traffic_pattern.borrow_mut().next_destination();
        let message_size = self.size_distribution.borrow_mut().next_message_size();
        let transaction = self.accounting.borrow_mut().create_transaction_id();

        self.transactions
            .borrow_mut()
            .start(transaction, self.transaction_size);

        if self.fsm.get() == TerminalFsm::Logging {
            let inserted = self.transactions_to_log.borrow_mut().insert(transaction);
            assert!(inserted);
            self.message_log.start_transaction(transaction);
        }

        for _ in 0..self.transaction_size {
            self.send_message(
                self.request_protocol_class,
                REQUEST_OP,
                transaction,
                message_size,
                destination,
            );
        }

        // Pace the next transaction to the configured injection rate.
        let transaction_flits = message_size * self.transaction_size;
        let cycles = cycles_to_send(&self.sim, self.request_injection_rate, transaction_flits);
        debug_assert!(cycles >= 1);
        let time = self.sim.future_cycle(Clock::Channel, cycles);
        self.sim
            .add_event(time, 0, self.self_ref.upgrade().unwrap(), None, REQUEST_EVT);
    }

    fn send_response(&self, request: &Rc<Message>) {
        assert!(self.enable_responses);
        let destination = request.source();
        let message_size = self
            .size_distribution
            .borrow_mut()
            .next_response_size(request);
        self.send_message(
            self.response_protocol_class,
            RESPONSE_OP,
            request.transaction,
            message_size,
            destination,
        );
    }

    fn send_message(
        &self,
        protocol_class: u32,
        opcode: u32,
        transaction: u64,
        num_flits: u32,
        destination: u32,
    ) {
        let (message, flits) = Message::assemble(
            protocol_class,
            opcode,
            transaction,
            num_flits,
            self.max_packet_size,
        )
        .expect("message sizes were validated at construction");

        let mut accounting = self.accounting.borrow_mut();
        let id = accounting.create_message_id();
        accounting.sent(num_flits);
        drop(accounting);

        message.set_send_info(id, self.id, destination, self.sim.time());
        self.interface.inject_message(&message, flits);
    }
}

impl Component for BlastTerminal {
    fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    fn process_event(&self, payload: EventPayload, kind: u32) {
        match kind {
            REQUEST_EVT => {
                if self.fsm.get() != TerminalFsm::Draining {
                    self.start_transaction();
                }
            }
            RESPONSE_EVT => {
                let request = payload
                    .expect("response event without payload")
                    .downcast::<Rc<Message>>()
                    .expect("response event with wrong payload");
                self.send_response(&request);
            }
            _ => panic!("{}: unknown event kind {}", self.entity, kind),
        }
    }
}
