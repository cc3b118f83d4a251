// ── Service facade ──
//
// Wires the scheduler, the reconciler and the door actuator to shared
// collaborators and owns their background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::actuator::DoorActuator;
use crate::dashboard::{Dashboard, door_dashboard};
use crate::error::CoreError;
use crate::model::DeviceMapping;
use crate::platform::Platform;
use crate::reconcile::Reconciler;
use crate::scheduler::Scheduler;
use crate::store::MappingStore;
use crate::vendor::VendorConnector;

/// Runtime settings of the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often the scheduler reloads configurations.
    pub poll_interval: Duration,
    /// Whether to consume the platform event stream.
    pub listen_events: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            listen_events: true,
        }
    }
}

/// The main entry point for the binary.
///
/// Cheaply cloneable via `Arc<ServiceInner>`. Construct inside a Tokio
/// runtime: the door actuator spawns its close queue immediately.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: ServiceConfig,
    store: Arc<dyn MappingStore>,
    platform: Arc<dyn Platform>,
    scheduler: Scheduler,
    actuator: DoorActuator,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn MappingStore>,
        platform: Arc<dyn Platform>,
        connector: Arc<dyn VendorConnector>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&platform),
            Arc::clone(&connector),
        );
        let scheduler = Scheduler::new(Arc::clone(&store), reconciler, cancel.clone());
        let actuator = DoorActuator::new(
            Arc::clone(&store),
            Arc::clone(&platform),
            connector,
            cancel.clone(),
        );

        Self {
            inner: Arc::new(ServiceInner {
                config,
                store,
                platform,
                scheduler,
                actuator,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.inner.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn actuator(&self) -> &DoorActuator {
        &self.inner.actuator
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reset every configuration to inactive and spawn the background tasks.
    ///
    /// The first scheduler tick re-activates the enabled configurations.
    pub async fn start(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        inner.store.set_all_inactive().await?;

        let mut handles = inner.task_handles.lock().await;

        let scheduler = inner.scheduler.clone();
        handles.push(tokio::spawn(scheduler.run(inner.config.poll_interval)));

        if inner.config.listen_events {
            let events = inner.platform.subscribe_events(inner.cancel.clone())?;
            let actuator = inner.actuator.clone();
            let cancel = inner.cancel.clone();
            handles.push(tokio::spawn(async move {
                actuator.run(events, cancel).await;
            }));
        }

        info!(
            poll_interval_secs = inner.config.poll_interval.as_secs(),
            listen_events = inner.config.listen_events,
            "service started"
        );
        Ok(())
    }

    /// Cancel background tasks and wait for them to finish.
    ///
    /// Pending closes are dropped with the close queue.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("service stopped");
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Device mappings of one configuration, or of all.
    pub async fn devices(&self, config_id: Option<i64>) -> Result<Vec<DeviceMapping>, CoreError> {
        Ok(self.inner.store.list_mappings(config_id).await?)
    }

    /// The door dashboard template of a project.
    pub async fn dashboard(&self, project_id: &str) -> Result<Dashboard, CoreError> {
        let mappings = self.inner.store.list_mappings(None).await?;
        Ok(door_dashboard(project_id, &mappings))
    }
}
