//! Background plate resolution.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockTransport, plate_json};
use nanodlp_adapter::PlateResolver;
use nanodlp_adapter::cache::{PLATES_PATH, PlateListCache};
use serde_json::json;

fn resolver(mock: &MockTransport, guard: Duration) -> PlateResolver {
    let plates = Arc::new(PlateListCache::new(Arc::new(mock.clone())));
    PlateResolver::with_startup_guard(plates, guard)
}

fn device_with_cube() -> MockTransport {
    let mock = MockTransport::new();
    mock.respond_json(
        PLATES_PATH,
        json!([plate_json(7, "cube.sl1", 100), plate_json(8, "gear.sl1", 200)]),
    );
    mock
}

/// Let detached tasks run to completion.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn idle_device_never_touches_plate_list() {
    let mock = device_with_cube();
    let resolver = resolver(&mock, Duration::ZERO);

    assert!(resolver.resolve(7, false).is_none());
    settle().await;

    assert!(resolver.resolve(7, false).is_none());
    assert_eq!(mock.calls(PLATES_PATH), 0);
}

#[tokio::test(start_paused = true)]
async fn startup_guard_defers_resolution() {
    let mock = device_with_cube();
    let resolver = resolver(&mock, Duration::from_secs(2));

    assert!(resolver.resolve(7, true).is_none());
    settle().await;
    assert_eq!(mock.calls(PLATES_PATH), 0);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(resolver.resolve(7, true).is_none());
    settle().await;

    let record = resolver.resolve(7, true).expect("resolved after guard");
    assert_eq!(record.name, "cube.sl1");
    assert_eq!(mock.calls(PLATES_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve_does_not_wait_for_slow_list() {
    let mock = device_with_cube();
    mock.delay(PLATES_PATH, Duration::from_secs(1));
    let resolver = resolver(&mock, Duration::ZERO);

    let started = tokio::time::Instant::now();
    assert!(resolver.resolve(7, true).is_none());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(resolver.is_resolving());

    // Repeated polls while the lookup runs schedule nothing new.
    assert!(resolver.resolve(7, true).is_none());
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!resolver.is_resolving());
    assert_eq!(resolver.resolve(7, true).unwrap().plate_id, Some(7));
    assert_eq!(mock.calls(PLATES_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn resolved_slot_answers_only_its_plate() {
    let mock = device_with_cube();
    let resolver = resolver(&mock, Duration::ZERO);

    resolver.resolve(7, true);
    settle().await;
    assert!(resolver.resolve(7, true).is_some());

    // A different plate misses the slot and resolves from the cached list.
    assert!(resolver.resolve(8, true).is_none());
    settle().await;
    assert_eq!(resolver.resolve(8, true).unwrap().name, "gear.sl1");
    assert_eq!(mock.calls(PLATES_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_plate_stays_unresolved() {
    let mock = device_with_cube();
    let resolver = resolver(&mock, Duration::ZERO);

    resolver.resolve(99, true);
    settle().await;

    assert!(resolver.resolve(99, true).is_none());
    assert!(resolver.resolve(99, false).is_none());
}

#[tokio::test]
async fn find_by_path_ignores_case_and_leading_slash() {
    let mock = device_with_cube();
    let resolver = resolver(&mock, Duration::ZERO);

    let found = resolver.find_by_path("/CUBE.sl1").await.unwrap();
    assert_eq!(found.plate_id, Some(7));
    assert!(resolver.find_by_path("missing.sl1").await.is_none());
    assert_eq!(resolver.find_by_id(8).await.unwrap().path, "gear.sl1");
}
