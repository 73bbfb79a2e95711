//! Wiremock integration tests for the HTTP transport.

use std::time::Duration;

use nanodlp_adapter::transport::{Request, ReqwestTransport, TimeoutTransport, Transport};
use nanodlp_adapter::AdapterError;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Printing":false}"#))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(format!("{}/", server.uri())).unwrap();
    let response = transport.send(Request::get("/status")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), r#"{"Printing":false}"#);
}

#[tokio::test]
async fn non_success_is_a_response_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/printer/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_string("not printing"))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(server.uri()).unwrap();
    let response = transport.send(Request::get("/printer/stop")).await.unwrap();
    assert_eq!(response.status, 500);

    match response.error_for_status() {
        Err(AdapterError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "not printing");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn post_sends_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gcode"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("gcode=G28"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new(server.uri()).unwrap();
    let response = transport
        .send(Request::post_form(
            "/gcode",
            vec![("gcode".to_string(), "G28".to_string())],
        ))
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn slow_device_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let transport = TimeoutTransport::with_timeout(
        ReqwestTransport::new(server.uri()).unwrap(),
        Duration::from_millis(50),
    );
    let err = transport.send(Request::get("/status")).await.unwrap_err();

    assert!(matches!(err, AdapterError::Timeout(d) if d == Duration::from_millis(50)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn unreachable_device_is_an_http_error() {
    // Bind and drop a listener to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let transport = ReqwestTransport::new(format!("http://127.0.0.1:{port}")).unwrap();
    let err = transport.send(Request::get("/status")).await.unwrap_err();
    assert!(matches!(err, AdapterError::Http(_)));
}
