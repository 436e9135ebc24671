use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Checking,
    Online,
    Offline,
}

/// Latest classified result for one probe target. Overwritten in place on
/// every execution; `status_code` is present only when a response was
/// actually received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub key: String,
    pub display_name: String,
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    AllOnline,
    SomeOffline,
    Unknown,
}

/// Read-only view published to subscribers after every recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub outcomes: HashMap<String, ProbeOutcome>,
    pub aggregate: AggregateStatus,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Offline dominates; AllOnline needs every registered key present and
/// online; anything else is Unknown.
pub fn aggregate(outcomes: &HashMap<String, ProbeOutcome>, registry_size: usize) -> AggregateStatus {
    if outcomes.values().any(|o| o.status == ProbeStatus::Offline) {
        return AggregateStatus::SomeOffline;
    }
    if outcomes.len() == registry_size && outcomes.values().all(|o| o.status == ProbeStatus::Online) {
        return AggregateStatus::AllOnline;
    }
    AggregateStatus::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(key: &str, status: ProbeStatus) -> ProbeOutcome {
        ProbeOutcome {
            key: key.to_string(),
            display_name: key.to_string(),
            status,
            status_code: None,
            message: None,
            observed_at: Utc::now(),
        }
    }

    fn map(entries: &[(&str, ProbeStatus)]) -> HashMap<String, ProbeOutcome> {
        entries
            .iter()
            .map(|(key, status)| (key.to_string(), outcome(key, *status)))
            .collect()
    }

    #[test]
    fn never_checked_is_unknown() {
        assert_eq!(aggregate(&HashMap::new(), 3), AggregateStatus::Unknown);
    }

    #[test]
    fn all_online_requires_full_registry_coverage() {
        let outcomes = map(&[("stations", ProbeStatus::Online), ("customers", ProbeStatus::Online)]);
        assert_eq!(aggregate(&outcomes, 2), AggregateStatus::AllOnline);
        // one registered target never probed
        assert_eq!(aggregate(&outcomes, 3), AggregateStatus::Unknown);
    }

    #[test]
    fn offline_dominates_checking_and_online() {
        let outcomes = map(&[
            ("stations", ProbeStatus::Online),
            ("customers", ProbeStatus::Checking),
            ("pricing", ProbeStatus::Offline),
        ]);
        assert_eq!(aggregate(&outcomes, 4), AggregateStatus::SomeOffline);
    }

    #[test]
    fn offline_dominates_even_when_incomplete() {
        let outcomes = map(&[("reports", ProbeStatus::Offline)]);
        assert_eq!(aggregate(&outcomes, 4), AggregateStatus::SomeOffline);
    }

    #[test]
    fn all_checking_is_unknown() {
        let outcomes = map(&[("stations", ProbeStatus::Checking), ("customers", ProbeStatus::Checking)]);
        assert_eq!(aggregate(&outcomes, 2), AggregateStatus::Unknown);
    }

    #[test]
    fn empty_registry_is_vacuously_all_online() {
        assert_eq!(aggregate(&HashMap::new(), 0), AggregateStatus::AllOnline);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = map(&[
            ("stations", ProbeStatus::Online),
            ("customers", ProbeStatus::Offline),
            ("pricing", ProbeStatus::Checking),
        ]);
        let reverse = map(&[
            ("pricing", ProbeStatus::Checking),
            ("customers", ProbeStatus::Offline),
            ("stations", ProbeStatus::Online),
        ]);
        assert_eq!(aggregate(&forward, 3), aggregate(&reverse, 3));
    }
}
