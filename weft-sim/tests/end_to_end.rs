// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::rc::Rc;

use weft_sim::builder::{StatSinks, build, run};
use weft_sim::settings::parse;
use weft_stats::message_log::FileMessageLog;
use weft_stats::test_helpers::{SharedBuffer, shared_buffer};
use weft_track::tracker::dev_null_tracker;

fn base_document(
    dimensions: &[u32],
    concentration: u32,
    protocol_classes: serde_json::Value,
    blast: serde_json::Value,
) -> String {
    serde_json::json!({
        "simulator": {"random_seed": 0xBAADF00Du64},
        "network": {
            "topology": "torus",
            "topology_settings": {
                "dimensions": dimensions,
                "concentration": concentration,
            },
            "protocol_classes": protocol_classes,
            "internal_channel_latency": 1,
            "terminal_channel_latency": 1,
            "input_buffer_depth": 4,
        },
        "workload": {"application": "blast", "settings": blast},
    })
    .to_string()
}

fn one_class() -> serde_json::Value {
    serde_json::json!([{
        "num_vcs": 2,
        "routing": {"algorithm": "dimension_order"},
        "injection": {"algorithm": "dimension_order"},
    }])
}

fn blast_settings(
    rate: f64,
    num_transactions: u32,
    transaction_size: u32,
    responses: bool,
) -> serde_json::Value {
    let mut settings = serde_json::json!({
        "kill_on_saturation": false,
        "log_during_saturation": false,
        "warmup_threshold": 1.0,
        "blast_terminal": {
            "request_injection_rate": rate,
            "num_transactions": num_transactions,
            "transaction_size": transaction_size,
            "max_packet_size": 2,
            "request_protocol_class": 0,
            "enable_responses": responses,
            "traffic_pattern": {"pattern": "uniform_random", "settings": {}},
            "message_size_distribution": {
                "distribution": "single",
                "settings": {"message_size": 4},
            },
            "warmup_interval": 0,
            "warmup_window": 5,
            "warmup_attempts": 3,
        },
    });
    if responses {
        settings["blast_terminal"]["response_protocol_class"] = serde_json::json!(1);
    }
    settings
}

/// Run a document to completion, capturing the message log.
fn run_capturing_messages(document: &str) -> SharedBuffer {
    let settings = parse(document, &[]).unwrap();
    let tracker = dev_null_tracker();
    let (writer, buffer) = shared_buffer();
    let mut sinks = StatSinks::null();
    sinks.message_log = Rc::new(FileMessageLog::new(writer));
    let simulation = build(&settings, &tracker, sinks).unwrap();
    run(&simulation);
    buffer
}

struct MessageLogLines {
    starts: Vec<u64>,
    ends: Vec<u64>,
    messages: Vec<Vec<String>>,
    lines: Vec<String>,
}

fn parse_message_log(buffer: &SharedBuffer) -> MessageLogLines {
    let text = String::from_utf8(buffer.borrow().clone()).unwrap();
    let lines: Vec<String> = text.lines().map(String::from).collect();
    let mut log = MessageLogLines {
        starts: Vec::new(),
        ends: Vec::new(),
        messages: Vec::new(),
        lines: lines.clone(),
    };
    for line in &lines {
        if let Some(id) = line.strip_prefix('+') {
            log.starts.push(id.parse().unwrap());
        } else if let Some(id) = line.strip_prefix('-') {
            log.ends.push(id.parse().unwrap());
        } else if line.starts_with("m,") {
            log.messages
                .push(line.split(',').map(String::from).collect());
        } else {
            panic!("unexpected message log line: {line}");
        }
    }
    log
}

/// Every started transaction ends exactly once.
fn assert_balanced(log: &MessageLogLines) {
    let mut starts = log.starts.clone();
    let mut ends = log.ends.clone();
    starts.sort_unstable();
    ends.sort_unstable();
    assert_eq!(starts, ends);
}

#[test]
fn single_transactions_close_on_delivery() {
    // Two terminals on a 2-torus; responses disabled, transactions of one
    // message each.
    let document = base_document(&[2], 1, one_class(), blast_settings(0.1, 1, 1, false));
    let log = parse_message_log(&run_capturing_messages(&document));

    // Both terminals reach their one required transaction; anything extra
    // tagged before logging stopped is also completed and balanced.
    assert!(log.starts.len() >= 2);
    assert_balanced(&log);
    assert_eq!(log.messages.len(), log.starts.len());

    // With a single request per transaction, the transaction closes with
    // the delivery of its sole message: the end marker directly follows
    // the message record, and names the same transaction.
    for end in &log.ends {
        let end_line = format!("-{end}");
        let position = log.lines.iter().position(|l| *l == end_line).unwrap();
        let previous = &log.lines[position - 1];
        assert!(previous.starts_with("m,"), "expected a message before {end_line}");
        let fields: Vec<&str> = previous.split(',').collect();
        assert_eq!(fields[3].parse::<u64>().unwrap(), *end);
    }

    // Message records carry ordered timestamps and the request opcode.
    for message in &log.messages {
        let create: u64 = message[5].parse().unwrap();
        let inject: u64 = message[6].parse().unwrap();
        let deliver: u64 = message[7].parse().unwrap();
        assert!(create <= inject);
        assert!(inject < deliver);
        assert_eq!(message[4], "250");
    }
}

#[test]
fn transactions_complete_under_load() {
    let document = base_document(&[2, 2], 1, one_class(), blast_settings(0.05, 3, 2, false));
    let log = parse_message_log(&run_capturing_messages(&document));

    // Four terminals, at least three tagged transactions each, two request
    // messages per transaction.
    assert!(log.starts.len() >= 12);
    assert_balanced(&log);
    assert_eq!(log.messages.len(), 2 * log.starts.len());
}

#[test]
fn responses_close_transactions() {
    let two_classes = serde_json::json!([
        {
            "num_vcs": 2,
            "routing": {"algorithm": "dimension_order"},
            "injection": {"algorithm": "dimension_order"},
        },
        {
            "num_vcs": 2,
            "routing": {"algorithm": "dimension_order"},
            "injection": {"algorithm": "dimension_order"},
        },
    ]);
    let document = base_document(&[2], 1, two_classes, blast_settings(0.05, 2, 1, true));
    let log = parse_message_log(&run_capturing_messages(&document));

    assert!(log.starts.len() >= 4);
    assert_balanced(&log);
    // Each tagged transaction logs its request and its response.
    assert_eq!(log.messages.len(), 2 * log.starts.len());
    let requests = log.messages.iter().filter(|m| m[4] == "250").count();
    let responses = log.messages.iter().filter(|m| m[4] == "130").count();
    assert_eq!(requests, log.starts.len());
    assert_eq!(responses, log.starts.len());
}

#[test]
fn zero_threshold_logs_from_time_zero() {
    // With a zero warmup threshold the application force-warms at time
    // zero, so terminals tag from their very first transaction even though
    // the detector (interval 1000) never produces a verdict.
    let document = base_document(&[2], 1, one_class(), blast_settings(0.1, 1, 1, false));
    let settings_override =
        String::from("workload.settings.blast_terminal.warmup_interval=1000");
    let threshold_override = String::from("workload.settings.warmup_threshold=0.0");
    let settings = parse(&document, &[settings_override, threshold_override]).unwrap();

    let tracker = dev_null_tracker();
    let (writer, buffer) = shared_buffer();
    let mut sinks = StatSinks::null();
    sinks.message_log = Rc::new(FileMessageLog::new(writer));
    let simulation = build(&settings, &tracker, sinks).unwrap();
    run(&simulation);

    let log = parse_message_log(&buffer);
    assert!(log.starts.len() >= 2);
    assert_balanced(&log);
}

#[test]
fn identical_runs_are_byte_identical() {
    let document = base_document(&[2, 2], 1, one_class(), blast_settings(0.05, 2, 1, false));
    let first = run_capturing_messages(&document);
    let second = run_capturing_messages(&document);
    assert!(!first.borrow().is_empty());
    assert_eq!(*first.borrow(), *second.borrow());
}

#[test]
fn a_different_seed_changes_the_log() {
    let document = base_document(&[2, 2], 1, one_class(), blast_settings(0.05, 2, 1, false));
    let first = run_capturing_messages(&document);

    let reseeded = parse(&document, &[String::from("simulator.random_seed=7")])
        .unwrap();
    let tracker = dev_null_tracker();
    let (writer, second) = shared_buffer();
    let mut sinks = StatSinks::null();
    sinks.message_log = Rc::new(FileMessageLog::new(writer));
    let simulation = build(&reseeded, &tracker, sinks).unwrap();
    run(&simulation);

    assert_ne!(*first.borrow(), *second.borrow());
}

#[test]
fn bad_configurations_fail_before_running() {
    let tracker = dev_null_tracker();

    // Unknown topology.
    let document = base_document(&[2], 1, one_class(), blast_settings(0.1, 1, 1, false))
        .replace("\"torus\"", "\"hypercube\"");
    let settings = parse(&document, &[]).unwrap();
    assert!(build(&settings, &tracker, StatSinks::null()).is_err());

    // Dimension-order routing needs two VCs per class.
    let document = base_document(&[2], 1, one_class(), blast_settings(0.1, 1, 1, false));
    let settings = parse(
        &document,
        &[String::from("network.protocol_classes.0.num_vcs=1")],
    )
    .unwrap();
    assert!(build(&settings, &tracker, StatSinks::null()).is_err());

    // A warmup interval of at least twice the maximum message size is
    // accepted; a shorter one is rejected rather than clamped.
    let settings = parse(
        &document,
        &[String::from("workload.settings.blast_terminal.warmup_interval=100")],
    )
    .unwrap();
    assert!(build(&settings, &tracker, StatSinks::null()).is_ok());
    let settings = parse(
        &document,
        &[
            String::from("workload.settings.blast_terminal.warmup_interval=150"),
            String::from(
                "workload.settings.blast_terminal.message_size_distribution.settings.message_size=80",
            ),
        ],
    )
    .unwrap();
    assert!(build(&settings, &tracker, StatSinks::null()).is_err());

    // An unknown traffic pattern.
    let settings = parse(
        &document,
        &[String::from(
            "workload.settings.blast_terminal.traffic_pattern.pattern=hotspot",
        )],
    )
    .unwrap();
    assert!(build(&settings, &tracker, StatSinks::null()).is_err());
}
