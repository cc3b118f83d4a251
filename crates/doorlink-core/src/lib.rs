//! Synchronization and door-actuation engine between Glutz eAccess door
//! controllers and the Eliona platform.
//!
//! - **[`Service`]**: facade owning the background tasks.
//!   [`start()`](Service::start) resets every configuration to inactive, then
//!   spawns the scheduler loop and the event-driven door actuator.
//!
//! - **[`Scheduler`]**: polls the configuration list, keeps `active` in line
//!   with `enabled` and runs at most one reconciliation per configuration.
//!
//! - **[`Reconciler`]**: one fetch-map-push cycle: device inventory and status
//!   from eAccess, asset mappings in the [`MappingStore`], telemetry to the
//!   platform.
//!
//! - **[`DoorActuator`]**: turns `open == 1` events into open commands and
//!   schedules the forced close in a delay queue.
//!
//! The remote systems sit behind the [`Vendor`] / [`VendorConnector`] and
//! [`Platform`] traits, with production implementations on top of
//! `doorlink-api`.

pub mod actuator;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod platform;
pub mod reconcile;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod vendor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use actuator::{DoorActuator, EventOutcome, IgnoreReason, PendingClose};
pub use dashboard::Dashboard;
pub use error::{CoreError, StoreError};
pub use model::{Configuration, Device, DeviceMapping, DoorState, Openable};
pub use platform::{ASSET_TYPE, AttributeEvent, ElionaPlatform, Platform};
pub use reconcile::{CycleReport, Reconciler};
pub use scheduler::{InFlight, Scheduler, TickReport};
pub use service::{Service, ServiceConfig};
pub use store::{InMemoryStore, MappingStore};
pub use vendor::{EAccessConnector, Vendor, VendorConnector};
