#![allow(clippy::unwrap_used)]
// Door actuator tests. Time is paused so the deferred close can be
// driven deterministically.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use doorlink_core::model::MAX_OPENABLE_DURATION_SECS;
use doorlink_core::{
    DeviceMapping, DoorActuator, DoorState, EventOutcome, IgnoreReason, InMemoryStore,
    MappingStore, Platform,
};

use common::{FakeConnector, FakePlatform, FakeVendor, mapped_door, open_event};

const ASSET: i32 = 501;

fn actuator(
    store: &Arc<InMemoryStore>,
    platform: &Arc<FakePlatform>,
    vendor: &Arc<FakeVendor>,
) -> DoorActuator {
    DoorActuator::new(
        Arc::clone(store) as Arc<dyn MappingStore>,
        Arc::clone(platform) as Arc<dyn Platform>,
        Arc::new(FakeConnector(Arc::clone(vendor))),
        CancellationToken::new(),
    )
}

/// Let spawned tasks run without moving the clock.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ── Open / close cycle ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn opens_for_default_duration_then_closes() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Opened {
            asset_id: ASSET,
            duration_secs: 30
        }
    );
    assert_eq!(vendor.opens(), vec![("AP-D1".to_owned(), 30)]);
    assert_eq!(platform.openable_history(ASSET), vec![1]);
    assert_eq!(actuator.door_state(ASSET), DoorState::Open);
    assert_eq!(actuator.pending_closes().len(), 1);

    tokio::time::sleep(Duration::from_secs(29)).await;
    settle().await;
    assert_eq!(vendor.opens().len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(
        vendor.opens(),
        vec![("AP-D1".to_owned(), 30), ("AP-D1".to_owned(), 0)]
    );
    assert_eq!(platform.openable_history(ASSET), vec![1, 0]);
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
    assert!(actuator.pending_closes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_events_open_and_close_once() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let second = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert!(matches!(second, EventOutcome::Ignored(_)));

    tokio::time::sleep(Duration::from_secs(40)).await;
    settle().await;

    let opens = vendor.opens();
    assert_eq!(opens.iter().filter(|(_, d)| *d > 0).count(), 1);
    assert_eq!(opens.iter().filter(|(_, d)| *d == 0).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn location_override_wins() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.duration_override = Some("10".into()));
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Opened {
            asset_id: ASSET,
            duration_secs: 10
        }
    );

    tokio::time::sleep(Duration::from_secs(11)).await;
    settle().await;
    assert_eq!(vendor.opens().last(), Some(&("AP-D1".to_owned(), 0)));
}

#[tokio::test(start_paused = true)]
async fn unparsable_override_falls_back_to_default() {
    let (store, _) = mapped_door(12, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.duration_override = Some("soon".into()));
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Opened {
            asset_id: ASSET,
            duration_secs: 12
        }
    );
}

#[tokio::test(start_paused = true)]
async fn oversized_override_falls_back_and_doors_keep_closing() {
    let (store, config) = mapped_door(10, "D1", ASSET).await;
    store
        .insert_mapping(DeviceMapping {
            config_id: config.id,
            project_id: "1".into(),
            device_id: "D2".into(),
            asset_id: ASSET + 1,
            location_id: "AP-D2".into(),
        })
        .await
        .unwrap();
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.duration_override = Some("100000000".into()));
    let actuator = actuator(&store, &platform, &vendor);

    let first = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(
        first,
        EventOutcome::Opened {
            asset_id: ASSET,
            duration_secs: 10
        }
    );

    vendor.update(|s| s.duration_override = Some(u64::MAX.to_string()));
    let second = actuator
        .handle_event(open_event(ASSET + 1, 1.0))
        .await
        .unwrap();
    assert_eq!(
        second,
        EventOutcome::Opened {
            asset_id: ASSET + 1,
            duration_secs: 10
        }
    );

    tokio::time::sleep(Duration::from_secs(11)).await;
    settle().await;
    let mut closed: Vec<String> = vendor
        .opens()
        .into_iter()
        .filter(|(_, secs)| *secs == 0)
        .map(|(loc, _)| loc)
        .collect();
    closed.sort();
    assert_eq!(closed, vec!["AP-D1".to_owned(), "AP-D2".to_owned()]);
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
    assert_eq!(actuator.door_state(ASSET + 1), DoorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn default_duration_is_capped_at_one_day() {
    let (store, _) = mapped_door(MAX_OPENABLE_DURATION_SECS * 1000, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Opened {
            asset_id: ASSET,
            duration_secs: MAX_OPENABLE_DURATION_SECS
        }
    );

    tokio::time::sleep(Duration::from_secs(MAX_OPENABLE_DURATION_SECS + 1)).await;
    settle().await;
    assert_eq!(vendor.opens().last(), Some(&("AP-D1".to_owned(), 0)));
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
}

// ── Guards ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn already_open_door_is_not_reopened() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    platform.set_openable(ASSET, 1);
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();

    assert_eq!(outcome, EventOutcome::Ignored(IgnoreReason::AlreadyOpen));
    assert!(vendor.opens().is_empty());
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn non_open_payloads_and_unknown_assets_are_ignored() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    assert_eq!(
        actuator.handle_event(open_event(ASSET, 0.0)).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::NotOpenRequest)
    );
    assert_eq!(
        actuator.handle_event(open_event(999, 1.0)).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::UnknownAsset)
    );
    assert!(vendor.opens().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_duration_issues_no_command() {
    let (store, _) = mapped_door(0, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    assert_eq!(
        actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap(),
        EventOutcome::Ignored(IgnoreReason::ZeroDuration)
    );
    assert!(vendor.opens().is_empty());
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn open_failure_records_marker_and_schedules_nothing() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.open_errors = true);
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();

    assert_eq!(outcome, EventOutcome::OpenFailed { asset_id: ASSET });
    assert_eq!(platform.openable_history(ASSET), vec![2]);
    assert!(actuator.pending_closes().is_empty());
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(vendor.opens().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_open_counts_as_failure() {
    let (store, _) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.open_ok = false);
    let actuator = actuator(&store, &platform, &vendor);

    let outcome = actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    assert_eq!(outcome, EventOutcome::OpenFailed { asset_id: ASSET });
    assert_eq!(platform.openable_history(ASSET), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn close_failure_records_marker() {
    let (store, _) = mapped_door(5, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    vendor.update(|s| s.close_ok = false);
    let actuator = actuator(&store, &platform, &vendor);

    actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(platform.openable_history(ASSET), vec![1, 2]);
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);
}

// ── Close queue control ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancelled_close_returns_door_to_idle() {
    let (store, config) = mapped_door(30, "D1", ASSET).await;
    let platform = FakePlatform::new();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);

    actuator.handle_event(open_event(ASSET, 1.0)).await.unwrap();
    settle().await;

    let pending = actuator.cancel_close(ASSET).unwrap();
    assert_eq!(pending.config_id, config.id);
    assert_eq!(pending.location_id, "AP-D1");
    assert_eq!(actuator.door_state(ASSET), DoorState::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(vendor.opens().len(), 1);
    assert_eq!(platform.openable_history(ASSET), vec![1]);
}

// ── Event loop ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn run_loop_handles_doors_independently() {
    let (store, config) = mapped_door(30, "D1", ASSET).await;
    store
        .insert_mapping(DeviceMapping {
            config_id: config.id,
            project_id: "1".into(),
            device_id: "D2".into(),
            asset_id: ASSET + 1,
            location_id: "AP-D2".into(),
        })
        .await
        .unwrap();

    let (platform, events) = FakePlatform::with_events();
    let vendor = FakeVendor::with_devices(&[]);
    let actuator = actuator(&store, &platform, &vendor);
    let cancel = CancellationToken::new();

    let rx = platform.subscribe_events(cancel.clone()).unwrap();
    let loop_actuator = actuator.clone();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move { loop_actuator.run(rx, loop_cancel).await });

    events.send(open_event(ASSET, 1.0)).await.unwrap();
    events.send(open_event(ASSET + 1, 1.0)).await.unwrap();
    events.send(open_event(ASSET, 1.0)).await.unwrap();
    settle().await;

    let mut opened: Vec<String> = vendor.opens().into_iter().map(|(loc, _)| loc).collect();
    opened.sort();
    assert_eq!(opened, vec!["AP-D1".to_owned(), "AP-D2".to_owned()]);
    assert_eq!(actuator.pending_closes().len(), 2);

    cancel.cancel();
    handle.await.unwrap();
}
