// ── Door actuator ──
//
// Turns `open == 1` attribute events into eAccess open commands. Each
// door asset moves through `Idle -> Opening -> Open -> Closing -> Idle`;
// only an idle door can be opened, which makes duplicate events inside
// the open window harmless. Closes are driven by the close queue.

mod close_queue;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use doorlink_api::DataSubtype;

pub use close_queue::PendingClose;

use close_queue::{CloseJob, CloseQueue};

use crate::convert::{is_open_request, openable_payload, parse_duration_override, reports_opened};
use crate::error::CoreError;
use crate::model::{DeviceMapping, DoorState, MAX_OPENABLE_DURATION_SECS, Openable};
use crate::platform::{AttributeEvent, Platform};
use crate::store::MappingStore;
use crate::vendor::{Vendor, VendorConnector};

/// Why an event did not lead to an open command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The payload is not `open == 1`.
    NotOpenRequest,
    /// No mapping points at the event's asset.
    UnknownAsset,
    /// The door is already being handled.
    Busy(DoorState),
    /// The last `openable` input is 1.
    AlreadyOpen,
    /// The resolved duration is zero.
    ZeroDuration,
}

/// Result of handling one attribute event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Opened { asset_id: i32, duration_secs: u64 },
    OpenFailed { asset_id: i32 },
}

// ── DoorActuator ────────────────────────────────────────────────────

/// Cheaply cloneable via `Arc<ActuatorInner>`.
#[derive(Clone)]
pub struct DoorActuator {
    inner: Arc<ActuatorInner>,
}

struct ActuatorInner {
    store: Arc<dyn MappingStore>,
    platform: Arc<dyn Platform>,
    connector: Arc<dyn VendorConnector>,
    doors: Arc<DashMap<i32, DoorState>>,
    closes: CloseQueue,
}

impl DoorActuator {
    /// Create the actuator and spawn its close queue on the current runtime.
    pub fn new(
        store: Arc<dyn MappingStore>,
        platform: Arc<dyn Platform>,
        connector: Arc<dyn VendorConnector>,
        cancel: CancellationToken,
    ) -> Self {
        let doors: Arc<DashMap<i32, DoorState>> = Arc::new(DashMap::new());

        let close_platform = Arc::clone(&platform);
        let close_doors = Arc::clone(&doors);
        let closes = CloseQueue::spawn(cancel, move |job| {
            tokio::spawn(close_door(
                Arc::clone(&close_platform),
                Arc::clone(&close_doors),
                job,
            ));
        });

        Self {
            inner: Arc::new(ActuatorInner {
                store,
                platform,
                connector,
                doors,
                closes,
            }),
        }
    }

    /// Current state of a door asset.
    pub fn door_state(&self, asset_id: i32) -> DoorState {
        self.inner
            .doors
            .get(&asset_id)
            .map_or(DoorState::Idle, |s| *s)
    }

    /// Closes waiting to fire, soonest first.
    pub fn pending_closes(&self) -> Vec<PendingClose> {
        self.inner.closes.pending()
    }

    /// Drop the pending close of an asset without sending the close command.
    ///
    /// The door returns to `Idle`.
    pub fn cancel_close(&self, asset_id: i32) -> Option<PendingClose> {
        let cancelled = self.inner.closes.cancel(asset_id)?;
        self.inner.doors.insert(asset_id, DoorState::Idle);
        info!(asset_id, "pending close cancelled");
        Some(cancelled)
    }

    // ── Event loop ───────────────────────────────────────────────────

    /// Pull events until the channel closes or `cancel` fires.
    ///
    /// Each event is handled on its own task, so different doors do not
    /// wait on each other.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<AttributeEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("event stream closed");
                        break;
                    };
                    let actuator = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = actuator.handle_event(event).await {
                            warn!(error = %e, "door event aborted");
                        }
                    });
                }
            }
        }
    }

    /// Handle one attribute event to completion.
    ///
    /// Returns once the open command was answered; the close runs later
    /// from the close queue.
    #[instrument(name = "door_event", skip_all, fields(asset_id = event.asset_id))]
    pub async fn handle_event(&self, event: AttributeEvent) -> Result<EventOutcome, CoreError> {
        if event.subtype != DataSubtype::Output || !is_open_request(&event.data) {
            return Ok(EventOutcome::Ignored(IgnoreReason::NotOpenRequest));
        }

        let asset_id = event.asset_id;
        let Some(mapping) = self.inner.store.mapping_by_asset(asset_id).await? else {
            debug!("asset is not a mapped door");
            return Ok(EventOutcome::Ignored(IgnoreReason::UnknownAsset));
        };

        if let Err(state) = self.claim(asset_id) {
            debug!(%state, "door busy, ignoring open request");
            return Ok(EventOutcome::Ignored(IgnoreReason::Busy(state)));
        }

        let result = self.open_claimed(&mapping).await;
        if !matches!(result, Ok(EventOutcome::Opened { .. })) {
            self.inner.doors.insert(asset_id, DoorState::Idle);
        }
        result
    }

    /// Move an idle door to `Opening`, or report the state blocking it.
    fn claim(&self, asset_id: i32) -> Result<(), DoorState> {
        let mut state = self.inner.doors.entry(asset_id).or_default();
        if *state != DoorState::Idle {
            return Err(*state);
        }
        *state = DoorState::Opening;
        Ok(())
    }

    async fn open_claimed(&self, mapping: &DeviceMapping) -> Result<EventOutcome, CoreError> {
        let inner = &self.inner;
        let asset_id = mapping.asset_id;

        let latest = inner
            .platform
            .latest_telemetry(asset_id, DataSubtype::Input)
            .await?;
        if latest.as_ref().is_some_and(reports_opened) {
            debug!("door already reported open");
            return Ok(EventOutcome::Ignored(IgnoreReason::AlreadyOpen));
        }

        let config = inner
            .store
            .get_config(mapping.config_id)
            .await?
            .ok_or(CoreError::ConfigurationNotFound {
                config_id: mapping.config_id,
            })?;
        let vendor = inner.connector.connect(&config)?;

        let duration_secs = resolve_duration(
            vendor.as_ref(),
            &mapping.location_id,
            config.default_openable_duration_secs,
        )
        .await?;
        if duration_secs == 0 {
            return Ok(EventOutcome::Ignored(IgnoreReason::ZeroDuration));
        }

        match vendor.open(&mapping.location_id, duration_secs).await {
            Ok(true) => {
                inner.doors.insert(asset_id, DoorState::Open);
                info!(location_id = %mapping.location_id, duration_secs, "door opened");
                push_openable(inner.platform.as_ref(), asset_id, Openable::Opened).await;
                let job = CloseJob {
                    asset_id,
                    config_id: config.id,
                    location_id: mapping.location_id.clone(),
                    vendor,
                };
                if let Err(job) = inner.closes.schedule(job, Duration::from_secs(duration_secs)) {
                    warn!(duration_secs, "close could not be scheduled, closing now");
                    tokio::spawn(close_door(
                        Arc::clone(&inner.platform),
                        Arc::clone(&inner.doors),
                        job,
                    ));
                }
                Ok(EventOutcome::Opened {
                    asset_id,
                    duration_secs,
                })
            }
            Ok(false) => {
                warn!(location_id = %mapping.location_id, "open command rejected");
                push_openable(inner.platform.as_ref(), asset_id, Openable::Failed).await;
                Ok(EventOutcome::OpenFailed { asset_id })
            }
            Err(e) => {
                warn!(location_id = %mapping.location_id, error = %e, "open command failed");
                push_openable(inner.platform.as_ref(), asset_id, Openable::Failed).await;
                Ok(EventOutcome::OpenFailed { asset_id })
            }
        }
    }
}

/// Per-location override if set and usable, the configured default otherwise.
///
/// Both are capped at [`MAX_OPENABLE_DURATION_SECS`].
async fn resolve_duration(
    vendor: &dyn Vendor,
    location_id: &str,
    default_secs: u64,
) -> Result<u64, CoreError> {
    let default_secs = default_secs.min(MAX_OPENABLE_DURATION_SECS);
    let Some(raw) = vendor.openable_duration(location_id).await? else {
        return Ok(default_secs);
    };
    Ok(parse_duration_override(&raw).unwrap_or_else(|| {
        warn!(location_id, %raw, "unusable openable duration override, using default");
        default_secs
    }))
}

/// Force the door closed with a zero-duration open command.
async fn close_door(
    platform: Arc<dyn Platform>,
    doors: Arc<DashMap<i32, DoorState>>,
    job: CloseJob,
) {
    let asset_id = job.asset_id;
    doors.insert(asset_id, DoorState::Closing);

    let outcome = match job.vendor.open(&job.location_id, 0).await {
        Ok(true) => {
            info!(asset_id, location_id = %job.location_id, "door closed");
            Openable::Closed
        }
        Ok(false) => {
            warn!(asset_id, location_id = %job.location_id, "close command rejected");
            Openable::Failed
        }
        Err(e) => {
            warn!(asset_id, location_id = %job.location_id, error = %e, "close command failed");
            Openable::Failed
        }
    };

    push_openable(platform.as_ref(), asset_id, outcome).await;
    doors.insert(asset_id, DoorState::Idle);
}

async fn push_openable(platform: &dyn Platform, asset_id: i32, value: Openable) {
    if let Err(e) = platform
        .upsert_telemetry(asset_id, DataSubtype::Input, openable_payload(value), Utc::now())
        .await
    {
        warn!(asset_id, %value, error = %e, "failed to record door status");
    }
}
