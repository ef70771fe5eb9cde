// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Construct and run a whole simulation from a settings document.

use std::io;
use std::rc::Rc;

use weft_engine::engine::Simulator;
use weft_engine::time::Clock;
use weft_engine::types::SetupError;
use weft_fabric::network::Network;
use weft_fabric::topology::TopologyRegistry;
use weft_stats::channel_log::{ChannelLog, CsvChannelLog, NullChannelLog};
use weft_stats::message_log::{FileMessageLog, MessageLog, NullMessageLog};
use weft_stats::traffic_log::{CsvTrafficLog, NullTrafficLog, TrafficLog};
use weft_track::entity::Entity;
use weft_track::{Tracker, Writer, info};
use weft_workload::workload::{Registries, Workload};

use crate::settings::{Settings, StatisticsSettings};

/// The statistics sinks of one run.
pub struct StatSinks {
    pub channel_log: Rc<dyn ChannelLog>,
    pub traffic_log: Rc<dyn TrafficLog>,
    pub message_log: Rc<dyn MessageLog>,
}

impl StatSinks {
    /// Sinks that discard everything.
    #[must_use]
    pub fn null() -> Self {
        Self {
            channel_log: Rc::new(NullChannelLog),
            traffic_log: Rc::new(NullTrafficLog),
            message_log: Rc::new(NullMessageLog),
        }
    }

    /// File-backed sinks for the paths named in the settings; absent paths
    /// discard their records.
    pub fn from_settings(statistics: &StatisticsSettings) -> Result<Self, SetupError> {
        let mut sinks = Self::null();
        if let Some(path) = &statistics.channel_log {
            sinks.channel_log = Rc::new(CsvChannelLog::new(file_writer(path)?));
        }
        if let Some(path) = &statistics.traffic_log {
            sinks.traffic_log = Rc::new(CsvTrafficLog::new(file_writer(path)?));
        }
        if let Some(path) = &statistics.message_log {
            sinks.message_log = Rc::new(FileMessageLog::new(file_writer(path)?));
        }
        Ok(sinks)
    }
}

fn file_writer(path: &str) -> Result<Writer, SetupError> {
    match std::fs::File::create(path) {
        Ok(file) => Ok(Box::new(io::BufWriter::new(file))),
        Err(e) => weft_engine::io_error!(format!("cannot create '{path}': {e}")),
    }
}

/// A fully constructed simulation, ready to run.
pub struct Simulation {
    pub sim: Rc<Simulator>,
    pub network: Rc<Network>,
    pub workload: Rc<Workload>,
    sinks: StatSinks,
}

/// Build every component of a run from the settings document.
pub fn build(
    settings: &Settings,
    tracker: &Tracker,
    sinks: StatSinks,
) -> Result<Simulation, SetupError> {
    let periods = settings.simulator.clock_periods()?;
    let sim = Simulator::new(tracker, periods, settings.simulator.random_seed);
    if let Some(deadline) = settings.simulator.deadline_ps {
        sim.set_deadline(deadline);
    }

    let topologies = TopologyRegistry::with_defaults();
    let topology = topologies.create(
        &settings.network.topology,
        &settings.network.topology_settings,
    )?;

    let network = Network::new(
        &sim,
        topology,
        &settings.network.fabric,
        sinks.traffic_log.clone(),
    )?;

    let registries = Registries::with_defaults();
    let workload = Workload::new(
        &sim,
        &network,
        &settings.workload,
        sinks.message_log.clone(),
        &registries,
    )?;

    Ok(Simulation {
        sim,
        network,
        workload,
        sinks,
    })
}

/// Run a built simulation to completion and emit the statistics.
pub fn run(simulation: &Simulation) {
    simulation.sim.run();

    let summary = Rc::new(Entity::new(simulation.sim.top(), "summary"));
    info!(summary ; "{} events over {} channel cycles",
          simulation.sim.executed_events(),
          simulation.sim.cycle(Clock::Channel));

    simulation.network.report_channels(&*simulation.sinks.channel_log);
    simulation.sinks.channel_log.shutdown();
    simulation.sinks.traffic_log.shutdown();
    simulation.sinks.message_log.shutdown();
}
