use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{MonitorConfig, ProbeTarget};
use crate::models::{aggregate, AggregateStatus, ProbeOutcome, ProbeStatus, StatusSnapshot};
use crate::probe;

/// Owns the target registry and the latest-outcomes state, runs probe
/// sweeps, and publishes a fresh snapshot to subscribers after every
/// recomputation. One long-lived instance per process.
pub struct HealthMonitor {
    pub config: MonitorConfig,
    http_client: reqwest::Client,
    state: Mutex<MonitorState>,
    // Held for the duration of a full fan-out; try_lock at entry is the
    // in-progress flag that keeps concurrent sweeps from stacking requests.
    fanout_gate: Mutex<()>,
    updates: watch::Sender<StatusSnapshot>,
    panel_open: AtomicBool,
    periodic_running: AtomicBool,
}

struct MonitorState {
    outcomes: HashMap<String, ProbeOutcome>,
    // Last settled (non-Checking) status per key, for transition detection.
    settled: HashMap<String, ProbeStatus>,
    // Keys with an outstanding probe; the channel resolves to its result.
    inflight: HashMap<String, watch::Receiver<Option<ProbeOutcome>>>,
    last_checked: Option<DateTime<Utc>>,
}

enum Claim {
    Acquired(watch::Sender<Option<ProbeOutcome>>),
    Pending(watch::Receiver<Option<ProbeOutcome>>),
}

impl HealthMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        for target in &config.targets {
            anyhow::ensure!(
                seen.insert(target.key.as_str()),
                "Duplicate probe target key: {}",
                target.key
            );
        }
        if config.targets.is_empty() {
            warn!("No probe targets configured; aggregate will report all_online");
        }

        let initial = StatusSnapshot {
            outcomes: HashMap::new(),
            aggregate: aggregate(&HashMap::new(), config.targets.len()),
            last_checked: None,
        };
        let (updates, _) = watch::channel(initial);

        Ok(Self {
            config,
            http_client: reqwest::Client::new(),
            state: Mutex::new(MonitorState {
                outcomes: HashMap::new(),
                settled: HashMap::new(),
                inflight: HashMap::new(),
                last_checked: None,
            }),
            fanout_gate: Mutex::new(()),
            updates,
            panel_open: AtomicBool::new(false),
            periodic_running: AtomicBool::new(false),
        })
    }

    pub fn targets(&self) -> &[ProbeTarget] {
        &self.config.targets
    }

    /// Current outcomes and aggregate, without touching the network. Reports
    /// empty outcomes / unknown before the first sweep completes.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.updates.borrow().clone()
    }

    /// Subscribers receive a fresh snapshot after every recomputation.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.updates.subscribe()
    }

    /// Signalled by the host while the status panel is open; the panel
    /// drives its own rechecks, so the periodic tick stands down.
    pub fn set_status_panel_open(&self, open: bool) {
        self.panel_open.store(open, Ordering::Relaxed);
    }

    /// Probes every registered target concurrently and returns the
    /// recomputed aggregate once all of them have settled. A call arriving
    /// while a sweep is in flight issues no requests; it waits for that
    /// sweep and reuses its results.
    pub async fn check_all(self: &Arc<Self>) -> AggregateStatus {
        let _gate = match self.fanout_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _settled = self.fanout_gate.lock().await;
                return self.snapshot().aggregate;
            }
        };

        let sweep_started = std::time::Instant::now();
        let mut claimed = Vec::with_capacity(self.config.targets.len());
        {
            let mut state = self.state.lock().await;
            let now = Utc::now();
            for target in &self.config.targets {
                state
                    .outcomes
                    .insert(target.key.clone(), checking_outcome(target, now));
                // A key still being probed by check_one keeps its claim; its
                // result lands on its own.
                if !state.inflight.contains_key(&target.key) {
                    let (tx, rx) = watch::channel(None);
                    state.inflight.insert(target.key.clone(), rx);
                    claimed.push((target.clone(), tx));
                }
            }
        }
        // Every key must read Checking before the first result can land.
        self.publish().await;

        let mut tasks = FuturesUnordered::new();
        for (target, tx) in claimed {
            let monitor = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                let outcome =
                    probe::execute(&monitor.http_client, &target, monitor.probe_timeout()).await;
                monitor.store_outcome(outcome.clone()).await;
                monitor.settle(&target.key, tx, outcome).await;
            }));
        }

        let total = tasks.len();
        while let Some(joined) = tasks.next().await {
            if let Err(err) = joined {
                warn!("Probe task aborted: {}", err);
            }
        }

        {
            let mut state = self.state.lock().await;
            state.last_checked = Some(Utc::now());
        }
        let aggregate = self.publish().await;
        info!(
            "Status sweep finished {} probes in {:.2}s -> {:?}",
            total,
            sweep_started.elapsed().as_secs_f64(),
            aggregate
        );
        aggregate
    }

    /// On-demand re-check of a single target; `None` for an unregistered
    /// key. If a probe for the key is already outstanding, no new request is
    /// issued and the in-flight probe's eventual result is returned.
    pub async fn check_one(self: &Arc<Self>, key: &str) -> Option<ProbeOutcome> {
        let target = self.config.targets.iter().find(|t| t.key == key)?.clone();

        let claim = {
            let mut state = self.state.lock().await;
            match state.inflight.get(&target.key) {
                Some(rx) => Claim::Pending(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.inflight.insert(target.key.clone(), rx);
                    state
                        .outcomes
                        .insert(target.key.clone(), checking_outcome(&target, Utc::now()));
                    Claim::Acquired(tx)
                }
            }
        };

        match claim {
            Claim::Pending(mut rx) => loop {
                let settled = rx.borrow_and_update().clone();
                if let Some(outcome) = settled {
                    return Some(outcome);
                }
                if rx.changed().await.is_err() {
                    return rx.borrow().clone();
                }
            },
            Claim::Acquired(tx) => {
                self.publish().await;
                let outcome =
                    probe::execute(&self.http_client, &target, self.probe_timeout()).await;
                self.store_outcome(outcome.clone()).await;
                self.settle(&target.key, tx, outcome.clone()).await;
                Some(outcome)
            }
        }
    }

    /// Runs `check_all` on a fixed interval after an initial startup delay,
    /// until `stop_periodic`. Ticks stand down while the status panel is
    /// open; ticks landing during a manual sweep ride the fan-out gate
    /// instead of doubling requests.
    pub fn start_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        self.periodic_running.store(true, Ordering::Relaxed);
        let monitor = Arc::clone(self);
        info!(
            "Periodic status sweep every {}s (initial delay {}ms)",
            interval.as_secs(),
            monitor.config.initial_delay_ms
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(monitor.config.initial_delay_ms)).await;
            if monitor.periodic_running.load(Ordering::Relaxed) {
                monitor.check_all().await;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            while monitor.periodic_running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !monitor.periodic_running.load(Ordering::Relaxed) {
                    break;
                }
                if monitor.panel_open.load(Ordering::Relaxed) {
                    continue;
                }
                monitor.check_all().await;
            }
            info!("Periodic status sweep stopped");
        })
    }

    pub fn stop_periodic(&self) {
        self.periodic_running.store(false, Ordering::Relaxed);
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.config.probe_timeout_ms)
    }

    async fn publish(&self) -> AggregateStatus {
        let snapshot = {
            let state = self.state.lock().await;
            StatusSnapshot {
                outcomes: state.outcomes.clone(),
                aggregate: aggregate(&state.outcomes, self.config.targets.len()),
                last_checked: state.last_checked,
            }
        };
        let aggregate = snapshot.aggregate;
        self.updates.send_replace(snapshot);
        aggregate
    }

    async fn store_outcome(self: &Arc<Self>, outcome: ProbeOutcome) {
        let previous = {
            let mut state = self.state.lock().await;
            let previous = state.settled.insert(outcome.key.clone(), outcome.status);
            state.outcomes.insert(outcome.key.clone(), outcome.clone());
            previous
        };
        self.publish().await;

        let old = match previous {
            Some(old) if old != outcome.status => old,
            None if outcome.status == ProbeStatus::Offline => ProbeStatus::Online,
            _ => return,
        };

        let line = format!(
            "[CHANGE] {} ({}) -> {:?}",
            outcome.display_name, outcome.key, outcome.status
        );
        if outcome.status == ProbeStatus::Offline {
            error!("{}", line);
        } else {
            warn!("{}", line);
        }

        if self.config.webhook_url.is_some() {
            let monitor = Arc::clone(self);
            tokio::spawn(async move { monitor.send_webhook(outcome, old).await; });
        }
    }

    async fn settle(
        &self,
        key: &str,
        tx: watch::Sender<Option<ProbeOutcome>>,
        outcome: ProbeOutcome,
    ) {
        self.state.lock().await.inflight.remove(key);
        tx.send_replace(Some(outcome));
    }

    async fn send_webhook(&self, outcome: ProbeOutcome, old: ProbeStatus) {
        if let Some(url) = &self.config.webhook_url {
            let endpoint = self
                .config
                .targets
                .iter()
                .find(|t| t.key == outcome.key)
                .map(|t| t.endpoint_url.clone())
                .unwrap_or_default();
            let color = if outcome.status == ProbeStatus::Online { 0x2ECC71 } else { 0xE74C3C };
            let payload = serde_json::json!({
                "username": "GridPulse Monitor",
                "embeds": [{
                    "title": "Endpoint Status Transition",
                    "color": color,
                    "fields": [
                        { "name": "Service", "value": outcome.display_name, "inline": true },
                        { "name": "Endpoint", "value": endpoint, "inline": true },
                        { "name": "Transition", "value": format!("{:?} \u{2192} {:?}", old, outcome.status), "inline": true },
                        { "name": "Status Code", "value": outcome.status_code.map_or("N/A".to_string(), |c| c.to_string()), "inline": true },
                        { "name": "Reason", "value": outcome.message.unwrap_or_else(|| "OK".into()), "inline": false }
                    ],
                    "timestamp": Utc::now().to_rfc3339(),
                    "footer": { "text": "GridPulse Charging Network Telemetry" }
                }]
            });
            let _ = self.http_client.post(url).json(&payload).send().await;
        }
    }
}

fn checking_outcome(target: &ProbeTarget, now: DateTime<Utc>) -> ProbeOutcome {
    ProbeOutcome {
        key: target.key.clone(),
        display_name: target.display_name.clone(),
        status: ProbeStatus::Checking,
        status_code: None,
        message: None,
        observed_at: now,
    }
}
