// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use weft_engine::engine::Simulator;
use weft_engine::test_helpers::Recorder;
use weft_engine::time::{Clock, ClockPeriods};
use weft_track::tracker::dev_null_tracker;

#[test]
fn future_cycle_from_zero() {
    let tracker = dev_null_tracker();
    let sim = Simulator::new(&tracker, ClockPeriods::new(750, 1000, 1000, 1500), 1);

    assert_eq!(sim.future_cycle(Clock::Channel, 1), 750);
    assert_eq!(sim.future_cycle(Clock::Channel, 4), 3000);
    assert_eq!(sim.future_cycle(Clock::Terminal, 2), 3000);
}

#[test]
fn future_cycle_rounds_up_between_edges() {
    let tracker = dev_null_tracker();
    let sim = Simulator::new(&tracker, ClockPeriods::new(750, 1000, 1000, 1500), 1);
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    // Land the simulator at 1500ps, which is mid-cycle for the 750+1000
    // pair only when offset; use an unaligned time of 1100ps.
    sim.add_event(1100, 0, recorder.clone(), None, 0);
    sim.run();
    assert_eq!(sim.time(), 1100);

    // ceil(1100 / 750) = 2 edges in; next cycle boundary is 1500.
    assert_eq!(sim.future_cycle(Clock::Channel, 0), 1500);
    assert_eq!(sim.future_cycle(Clock::Channel, 1), 2250);
    // ceil(1100 / 1500) = 1; one more cycle lands at 3000.
    assert_eq!(sim.future_cycle(Clock::Terminal, 1), 3000);
}

#[test]
fn cycles_count_whole_periods() {
    let tracker = dev_null_tracker();
    let sim = Simulator::new(&tracker, ClockPeriods::new(500, 1000, 1000, 2000), 1);
    let recorder = Recorder::new_and_register(&sim, sim.top(), "recorder");

    sim.add_event(6000, 0, recorder.clone(), None, 0);
    sim.run();

    assert_eq!(sim.cycle(Clock::Channel), 12);
    assert_eq!(sim.cycle(Clock::Router), 6);
    assert_eq!(sim.cycle(Clock::Terminal), 3);
    assert_eq!(sim.cycle_time(Clock::Channel), 500);
}
