// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Simulate an interconnection network described by a settings document.
//!
//! ```text
//! weft-sim settings.json -o workload.settings.blast_terminal.request_injection_rate=0.3
//! ```
//!
//! The process exits 0 on normal completion (including a saturation kill,
//! which is a successful determination), and non-zero on configuration
//! errors. Invariant violations abort.

use std::path::PathBuf;

use clap::Parser;
use weft_engine::types::SetupResult;
use weft_sim::builder::{StatSinks, build, run};
use weft_sim::settings;
use weft_track::tracker::setup_tracker;

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "WEFT interconnection network simulator")]
struct Cli {
    /// Path to the JSON settings document.
    settings: PathBuf,

    /// Apply a `key.path=value` override to the settings document.
    /// May be given multiple times.
    #[arg(short = 'o', long = "override")]
    overrides: Vec<String>,

    /// Enable text logging.
    #[arg(long, default_value = "false")]
    log: bool,

    /// Level of log message to emit.
    #[arg(long, default_value = "Info")]
    log_level: log::Level,

    /// Set a regular expression for which entities should have logging set
    /// to `--log-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    log_filter_regex: String,

    /// The file text log output is written to. Use '-' for stdout.
    #[arg(long, default_value = "-")]
    log_file: String,
}

fn main() -> SetupResult {
    let args = Cli::parse();

    let text = match std::fs::read_to_string(&args.settings) {
        Ok(text) => text,
        Err(e) => {
            return weft_engine::io_error!(format!(
                "cannot read '{}': {e}",
                args.settings.display()
            ));
        }
    };
    let settings = settings::parse(&text, &args.overrides)?;

    let tracker = match setup_tracker(
        args.log,
        args.log_level,
        &args.log_filter_regex,
        &args.log_file,
    ) {
        Ok(tracker) => tracker,
        Err(e) => return weft_engine::config_error!(e.0),
    };

    let sinks = StatSinks::from_settings(&settings.statistics)?;
    let simulation = build(&settings, &tracker, sinks)?;
    run(&simulation);
    tracker.shutdown();

    Ok(())
}
