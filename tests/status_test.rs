//! Status polling: retry, enrichment and normalization.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockTransport, plate_json};
use nanodlp_adapter::cache::{PLATES_PATH, PlateListCache};
use nanodlp_adapter::status::STATUS_PATH;
use nanodlp_adapter::{
    AdapterError, NanoDlpStateMachine, PlateResolver, RetryConfig, StatusPoller,
};
use serde_json::json;

fn poller(mock: &MockTransport) -> StatusPoller {
    let transport = Arc::new(mock.clone());
    let plates = Arc::new(PlateListCache::new(transport.clone()));
    let resolver = PlateResolver::with_startup_guard(plates, Duration::ZERO);
    StatusPoller::new(
        transport,
        resolver,
        Arc::new(NanoDlpStateMachine::new()),
        RetryConfig::new(),
    )
}

fn printing_status() -> serde_json::Value {
    json!({
        "Printing": true,
        "Paused": false,
        "PlateID": 7,
        "LayerID": 12,
        "LayersCount": 48,
        "CurrentHeight": 600,
    })
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_retried_once() {
    let mock = MockTransport::new();
    mock.fail_once(STATUS_PATH, AdapterError::Http("connection refused".into()))
        .respond_json(STATUS_PATH, json!({"Printing": false}));

    let started = tokio::time::Instant::now();
    let status = poller(&mock).get_status().await.unwrap();

    assert_eq!(status["status"], "Idle");
    assert_eq!(mock.calls(STATUS_PATH), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn second_failure_propagates() {
    let mock = MockTransport::new();
    mock.fail(STATUS_PATH, AdapterError::Timeout(Duration::from_secs(5)));

    let err = poller(&mock).get_status().await.unwrap_err();
    assert!(matches!(err, AdapterError::Timeout(_)));
    assert_eq!(mock.calls(STATUS_PATH), 2);
}

#[tokio::test(start_paused = true)]
async fn device_error_is_retried() {
    let mock = MockTransport::new();
    mock.respond_once(STATUS_PATH, 503, "busy")
        .respond_json(STATUS_PATH, json!({"Printing": false}));

    assert!(poller(&mock).get_status().await.is_ok());
    assert_eq!(mock.calls(STATUS_PATH), 2);
}

#[tokio::test(start_paused = true)]
async fn malformed_status_is_not_retried() {
    let mock = MockTransport::new();
    mock.respond(STATUS_PATH, 200, "{ not json");

    let err = poller(&mock).get_status().await.unwrap_err();
    assert!(matches!(err, AdapterError::Decode(_)));
    assert_eq!(mock.calls(STATUS_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn plate_is_resolved_in_background() {
    let mock = MockTransport::new();
    mock.respond_json(STATUS_PATH, printing_status())
        .respond_json(PLATES_PATH, json!([plate_json(7, "cube.sl1", 100)]));
    let poller = poller(&mock);

    // The first poll does not wait for the plate list.
    let first = poller.get_status().await.unwrap();
    assert_eq!(first["status"], "Printing");
    assert_eq!(first["print_data"]["plate_id"], 7);
    assert!(first["print_data"]["file_data"].is_null());

    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = poller.get_status().await.unwrap();
    assert_eq!(second["print_data"]["file_data"]["name"], "cube.sl1");
    assert_eq!(second["print_data"]["layer_id"], 12);
    assert_eq!(second["print_data"]["total_layers"], 48);
    assert_eq!(second["print_data"]["progress"], 0.25);
    assert_eq!(second["z"], 0.6);
    assert_eq!(mock.calls(PLATES_PATH), 1);
}

#[tokio::test(start_paused = true)]
async fn embedded_file_data_skips_resolution() {
    let mock = MockTransport::new();
    let mut status = printing_status();
    status["file"] = json!({"Path": "jobs/embedded.sl1", "PlateID": 7});
    mock.respond_json(STATUS_PATH, status);

    let map = poller(&mock).get_status().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(map["print_data"]["file_data"]["name"], "embedded.sl1");
    assert_eq!(mock.calls(PLATES_PATH), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_poll_does_not_fetch_plates() {
    let mock = MockTransport::new();
    mock.respond_json(STATUS_PATH, json!({"Printing": false, "PlateID": 7}));
    let poller = poller(&mock);

    poller.get_status().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    poller.get_status().await.unwrap();

    assert_eq!(mock.calls(PLATES_PATH), 0);
}

#[tokio::test(start_paused = true)]
async fn fill_areas_are_dropped() {
    let mock = MockTransport::new();
    let areas: Vec<Vec<u32>> = (0..10_000).map(|i| vec![i, i + 1, i + 2]).collect();
    mock.respond_json(
        STATUS_PATH,
        json!({"Printing": false, "FillAreas": areas, "Status": "Idle"}),
    );

    let map = poller(&mock).get_status().await.unwrap();
    assert!(!map.contains_key("FillAreas"));
    assert_eq!(map["device_status_message"], "Idle");
}

#[tokio::test(start_paused = true)]
async fn finished_edge_is_reported_once() {
    let mock = MockTransport::new();
    mock.respond_once(STATUS_PATH, 200, printing_status().to_string())
        .respond_json(STATUS_PATH, json!({"Printing": false}));
    let poller = poller(&mock);

    assert_eq!(poller.get_status().await.unwrap()["finished"], false);
    assert_eq!(poller.get_status().await.unwrap()["finished"], true);
    assert_eq!(poller.get_status().await.unwrap()["finished"], false);
}
