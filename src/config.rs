use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub targets: Vec<ProbeTarget>,
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    pub webhook_url: Option<String>,
}

fn default_check_interval_ms() -> u64 { 300_000 }
fn default_probe_timeout_ms() -> u64 { 5_000 }
fn default_initial_delay_ms() -> u64 { 2_000 }
fn default_api_port() -> u16 { 3000 }

/// One admin-API endpoint under watch. The registry is fixed at startup;
/// keys are unique and stable across runs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeTarget {
    pub key: String,
    pub display_name: String,
    pub endpoint_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: MonitorConfig = serde_json::from_str(r#"{ "targets": [] }"#).unwrap();
        assert_eq!(config.check_interval_ms, 300_000);
        assert_eq!(config.probe_timeout_ms, 5_000);
        assert_eq!(config.initial_delay_ms, 2_000);
        assert_eq!(config.api_port, 3000);
        assert!(config.webhook_url.is_none());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn parses_target_list() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{
                "targets": [
                    { "key": "stations", "display_name": "Stations Management", "endpoint_url": "http://localhost:8080/api/stations" }
                ],
                "check_interval_ms": 60000
            }"#,
        )
        .unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].key, "stations");
        assert_eq!(config.check_interval_ms, 60_000);
    }
}
