// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The workload driver.
//!
//! The workload owns the application, relays completed messages from the
//! interfaces to it, and sequences the measurement window: monitoring opens
//! when the application reports ready (enough terminals warmed), closes
//! when it reports complete (all logged transactions finished), and the
//! application is told to stop sending when it reports done. The run then
//! drains naturally - the simulator stops when the event queue empties.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;
use weft_engine::engine::Simulator;
use weft_engine::types::SetupError;
use weft_fabric::interface::MessageReceiver;
use weft_fabric::network::Network;
use weft_stats::message_log::MessageLog;
use weft_track::entity::Entity;
use weft_track::info;

use weft_protocols::message::Message;

use crate::blast;
use crate::size::SizeDistributionRegistry;
use crate::traffic::TrafficPatternRegistry;

/// The workload section of the settings document.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkloadSettings {
    /// Application kind; `"blast"` is the one shipped.
    pub application: String,

    /// Application-private settings, passed through unparsed.
    pub settings: serde_json::Value,
}

/// The extension-point registries, populated once at process start.
pub struct Registries {
    pub traffic: TrafficPatternRegistry,
    pub sizes: SizeDistributionRegistry,
}

impl Registries {
    /// Registries with every built-in implementation registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            traffic: TrafficPatternRegistry::with_defaults(),
            sizes: SizeDistributionRegistry::with_defaults(),
        }
    }
}

/// The top of the workload side of a simulation.
pub struct Workload {
    pub entity: Rc<Entity>,
    network: Rc<Network>,
    message_log: Rc<dyn MessageLog>,
    application: RefCell<Option<Rc<blast::Application>>>,
}

impl Workload {
    /// Build the workload and attach it to every interface of `network`.
    pub fn new(
        sim: &Rc<Simulator>,
        network: &Rc<Network>,
        settings: &WorkloadSettings,
        message_log: Rc<dyn MessageLog>,
        registries: &Registries,
    ) -> Result<Rc<Self>, SetupError> {
        let workload = Rc::new(Self {
            entity: Rc::new(Entity::new(sim.top(), "workload")),
            network: network.clone(),
            message_log: message_log.clone(),
            application: RefCell::new(None),
        });

        let application = match settings.application.as_str() {
            "blast" => blast::Application::new(
                sim,
                &workload.entity,
                network,
                Rc::downgrade(&workload),
                &settings.settings,
                message_log,
                registries,
            )?,
            name => return weft_engine::config_error!(format!("unknown application '{name}'")),
        };
        *workload.application.borrow_mut() = Some(application);

        let receiver: Rc<dyn MessageReceiver> = workload.clone();
        for id in 0..network.num_interfaces() {
            network.interface(id).set_receiver(receiver.clone());
        }

        Ok(workload)
    }

    fn application(&self) -> Rc<blast::Application> {
        self.application.borrow().as_ref().unwrap().clone()
    }

    /// The application has warmed: open the monitoring window and start
    /// logging.
    pub fn application_ready(&self) {
        info!(self.entity ; "application ready, monitoring on");
        self.network.start_monitoring();
        self.application().start();
    }

    /// The application finished its measured work: close the window.
    pub fn application_complete(&self) {
        info!(self.entity ; "application complete, monitoring off");
        self.network.end_monitoring();
        self.application().stop();
    }

    /// The application has nothing left to send: drain.
    pub fn application_done(&self) {
        info!(self.entity ; "application done, draining");
        self.application().kill();
    }

    /// The message log the application's terminals write to.
    pub fn message_log(&self) -> &Rc<dyn MessageLog> {
        &self.message_log
    }
}

impl MessageReceiver for Workload {
    fn message_arrived(&self, interface_id: u32, message: Rc<Message>) {
        self.application().message_arrived(interface_id, message);
    }
}
