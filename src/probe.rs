use std::time::Duration;

use chrono::Utc;
use reqwest::header::ACCEPT;

use crate::config::ProbeTarget;
use crate::models::{ProbeOutcome, ProbeStatus};

/// Runs one GET probe against a target and classifies the transport-level
/// result. Every failure path resolves to an outcome, so callers can fan
/// these out without per-call guarding. Dropping the request future on
/// timeout cancels the in-flight request.
pub async fn execute(client: &reqwest::Client, target: &ProbeTarget, timeout: Duration) -> ProbeOutcome {
    let observed_at = Utc::now();
    let request = client
        .get(&target.endpoint_url)
        .header(ACCEPT, "application/json")
        .send();

    let (status, status_code, message) = match tokio::time::timeout(timeout, request).await {
        Ok(Ok(response)) => {
            let code = response.status().as_u16();
            if response.status().is_success() {
                (ProbeStatus::Online, Some(code), "API is operational".to_string())
            } else {
                (ProbeStatus::Offline, Some(code), format!("HTTP {}", code))
            }
        }
        Ok(Err(err)) if err.is_timeout() => {
            (ProbeStatus::Offline, None, "Request timeout".to_string())
        }
        Ok(Err(_)) => (ProbeStatus::Offline, None, "Network error".to_string()),
        Err(_) => (ProbeStatus::Offline, None, "Request timeout".to_string()),
    };

    ProbeOutcome {
        key: target.key.clone(),
        display_name: target.display_name.clone(),
        status,
        status_code,
        message: Some(message),
        observed_at,
    }
}
