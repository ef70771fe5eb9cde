// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The settings document.
//!
//! One JSON document configures a whole run. It is read once at startup;
//! `key.path=value` overrides from the command line are applied to the raw
//! document before it is deserialized, and nothing is mutable afterwards.

use serde::Deserialize;
use weft_engine::time::ClockPeriods;
use weft_engine::types::SetupError;
use weft_fabric::network::NetworkSettings;
use weft_workload::workload::WorkloadSettings;

/// The whole settings document.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub simulator: SimulatorSettings,
    pub network: NetworkSection,
    pub workload: WorkloadSettings,
    #[serde(default)]
    pub statistics: StatisticsSettings,
}

/// Clock periods, seed and the optional hard deadline.
#[derive(Clone, Debug, Deserialize)]
pub struct SimulatorSettings {
    #[serde(default = "default_period")]
    pub channel_period_ps: u64,
    #[serde(default = "default_period")]
    pub router_period_ps: u64,
    #[serde(default = "default_period")]
    pub interface_period_ps: u64,
    #[serde(default = "default_period")]
    pub terminal_period_ps: u64,

    /// Seed of the single deterministic random stream.
    pub random_seed: u64,

    /// Stop delivering events after this time, if set.
    pub deadline_ps: Option<u64>,
}

fn default_period() -> u64 {
    1000
}

impl SimulatorSettings {
    pub fn clock_periods(&self) -> Result<ClockPeriods, SetupError> {
        if self.channel_period_ps == 0
            || self.router_period_ps == 0
            || self.interface_period_ps == 0
            || self.terminal_period_ps == 0
        {
            weft_engine::config_error!("clock periods must be non-zero");
        }
        Ok(ClockPeriods::new(
            self.channel_period_ps,
            self.router_period_ps,
            self.interface_period_ps,
            self.terminal_period_ps,
        ))
    }
}

/// The network section: topology choice plus the fabric settings.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkSection {
    /// Registry name of the topology.
    pub topology: String,

    /// Topology-private geometry settings.
    pub topology_settings: serde_json::Value,

    #[serde(flatten)]
    pub fabric: NetworkSettings,
}

/// Statistics file paths; absent entries discard their records.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatisticsSettings {
    pub channel_log: Option<String>,
    pub traffic_log: Option<String>,
    pub message_log: Option<String>,
}

/// Parse a settings document, applying `key.path=value` overrides first.
pub fn parse(text: &str, overrides: &[String]) -> Result<Settings, SetupError> {
    let mut document: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return weft_engine::config_error!(format!("settings are not valid JSON: {e}")),
    };
    for entry in overrides {
        apply_override(&mut document, entry)?;
    }
    match serde_json::from_value(document) {
        Ok(settings) => Ok(settings),
        Err(e) => weft_engine::config_error!(format!("bad settings document: {e}")),
    }
}

/// Apply one `key.path=value` override to the raw document. The value is
/// parsed as JSON when possible and treated as a bare string otherwise.
fn apply_override(document: &mut serde_json::Value, entry: &str) -> Result<(), SetupError> {
    let Some((path, raw_value)) = entry.split_once('=') else {
        return weft_engine::config_error!(format!("override '{entry}' is not key=value"));
    };
    let value: serde_json::Value = serde_json::from_str(raw_value)
        .unwrap_or_else(|_| serde_json::Value::String(raw_value.to_string()));

    let mut cursor = document;
    let segments: Vec<&str> = path.split('.').collect();
    for (position, segment) in segments.iter().enumerate() {
        let last = position == segments.len() - 1;
        if let Ok(index) = segment.parse::<usize>() {
            let Some(array) = cursor.as_array_mut() else {
                return weft_engine::config_error!(format!(
                    "override '{path}': '{segment}' indexes a non-array"
                ));
            };
            if index >= array.len() {
                return weft_engine::config_error!(format!(
                    "override '{path}': index {index} out of bounds"
                ));
            }
            if last {
                array[index] = value;
                return Ok(());
            }
            cursor = &mut array[index];
        } else {
            let Some(object) = cursor.as_object_mut() else {
                return weft_engine::config_error!(format!(
                    "override '{path}': '{segment}' indexes a non-object"
                ));
            };
            if last {
                object.insert(segment.to_string(), value);
                return Ok(());
            }
            cursor = object
                .entry(segment.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        }
    }
    unreachable!("override paths have at least one segment");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> String {
        serde_json::json!({
            "simulator": {"random_seed": 1},
            "network": {
                "topology": "torus",
                "topology_settings": {"dimensions": [2], "concentration": 1},
                "protocol_classes": [{
                    "num_vcs": 2,
                    "routing": {"algorithm": "dimension_order"},
                    "injection": {"algorithm": "dimension_order"},
                }],
                "internal_channel_latency": 1,
                "terminal_channel_latency": 1,
                "input_buffer_depth": 4,
            },
            "workload": {"application": "blast", "settings": {}},
        })
        .to_string()
    }

    #[test]
    fn parses_with_defaults() {
        let settings = parse(&document(), &[]).unwrap();
        assert_eq!(settings.simulator.channel_period_ps, 1000);
        assert_eq!(settings.simulator.random_seed, 1);
        assert_eq!(settings.network.fabric.vc_allocation_policy, "round_robin");
        assert!(settings.statistics.message_log.is_none());
    }

    #[test]
    fn overrides_reach_nested_keys() {
        let overrides = vec![
            String::from("simulator.random_seed=99"),
            String::from("network.input_buffer_depth=8"),
            String::from("network.protocol_classes.0.num_vcs=4"),
            String::from("statistics.message_log=messages.log"),
        ];
        let settings = parse(&document(), &overrides).unwrap();
        assert_eq!(settings.simulator.random_seed, 99);
        assert_eq!(settings.network.fabric.input_buffer_depth, 8);
        assert_eq!(settings.network.fabric.protocol_classes[0].num_vcs, 4);
        assert_eq!(
            settings.statistics.message_log.as_deref(),
            Some("messages.log")
        );
    }

    #[test]
    fn bad_overrides_are_rejected() {
        assert!(parse(&document(), &[String::from("no_equals_sign")]).is_err());
        assert!(parse(&document(), &[String::from("network.protocol_classes.7.num_vcs=1")]).is_err());
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(parse("{not json", &[]).is_err());
    }
}
