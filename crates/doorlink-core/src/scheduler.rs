// ── Configuration scheduler ──
//
// Polls the configuration list, keeps the `active` flag in line with
// `enabled`, and starts at most one reconciliation run per configuration.
// A run owns its in-flight slot through the cycle and the refresh sleep
// that follows it; ticks that find the slot taken are dropped.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::Configuration;
use crate::reconcile::Reconciler;
use crate::store::MappingStore;

// ── In-flight guard ─────────────────────────────────────────────────

/// Set of configuration ids with a run in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<DashSet<i64>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `config_id`, or `None` if it is taken.
    pub fn try_acquire(&self, config_id: i64) -> Option<InFlightGuard> {
        self.keys.insert(config_id).then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            config_id,
        })
    }

    pub fn contains(&self, config_id: i64) -> bool {
        self.keys.contains(&config_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Releases the slot on drop, including on panics and early returns.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashSet<i64>>,
    config_id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.config_id);
    }
}

// ── TickReport ──────────────────────────────────────────────────────

/// What one scheduler tick did, by configuration id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub started: Vec<i64>,
    pub busy: Vec<i64>,
    pub disabled: Vec<i64>,
    pub activated: Vec<i64>,
    pub deactivated: Vec<i64>,
}

// ── Scheduler ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn MappingStore>,
    reconciler: Reconciler,
    in_flight: InFlight,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn MappingStore>,
        reconciler: Reconciler,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            reconciler,
            in_flight: InFlight::new(),
            cancel,
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Load all configurations and process them.
    ///
    /// A store error skips the tick; the caller logs it and tries again
    /// on the next poll.
    pub async fn tick(&self) -> Result<TickReport, CoreError> {
        let configs = self.store.list_configs().await?;
        Ok(self.tick_with(configs).await)
    }

    /// Process an explicit snapshot of configurations.
    pub async fn tick_with(&self, configs: Vec<Configuration>) -> TickReport {
        let mut report = TickReport::default();

        for config in configs {
            if !config.enabled {
                if config.active {
                    self.persist_active(config.id, false).await;
                    info!(config_id = config.id, "configuration disabled, deactivated");
                    report.deactivated.push(config.id);
                }
                report.disabled.push(config.id);
                continue;
            }

            if !config.active {
                self.persist_active(config.id, true).await;
                info!(config_id = config.id, "configuration activated");
                report.activated.push(config.id);
            }

            let Some(guard) = self.in_flight.try_acquire(config.id) else {
                debug!(config_id = config.id, "previous run still in flight, skipping");
                report.busy.push(config.id);
                continue;
            };

            report.started.push(config.id);
            let reconciler = self.reconciler.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(run_once(reconciler, config, guard, cancel));
        }

        report
    }

    async fn persist_active(&self, config_id: i64, active: bool) {
        if let Err(e) = self.store.set_active(config_id, active).await {
            warn!(config_id, active, error = %e, "failed to persist active flag");
        }
    }

    /// Tick every `poll_interval` until cancelled.
    pub async fn run(self, poll_interval: Duration) {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "scheduler tick skipped, could not load configurations");
                    }
                }
            }
        }
        debug!("scheduler stopped");
    }
}

/// One reconciliation run followed by the refresh sleep, holding the slot.
async fn run_once(
    reconciler: Reconciler,
    config: Configuration,
    guard: InFlightGuard,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = reconciler.run_cycle(&config) => {
            if let Err(e) = result {
                warn!(config_id = config.id, error = %e, "reconciliation cycle failed");
            }
        }
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(config.refresh_interval()) => {}
    }
    drop(guard);
}
