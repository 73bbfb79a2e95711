//! Shared fixtures: an in-process scripted device.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use nanodlp_adapter::transport::{Request, Response, Transport};
use nanodlp_adapter::{AdapterError, Result};

#[derive(Clone)]
enum Reply {
    Respond(u16, Bytes),
    Fail(AdapterError),
}

#[derive(Default)]
struct Route {
    /// Consumed first, one per call.
    script: VecDeque<Reply>,
    fallback: Option<Reply>,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, Route>,
    calls: HashMap<String, usize>,
    requests: Vec<Request>,
}

/// Scripted [`Transport`] that counts calls per path.
///
/// Paths without a route answer 404 with an empty body. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, path: &str, f: impl FnOnce(&mut Route)) -> &Self {
        let mut state = self.state.lock().unwrap();
        f(state.routes.entry(path.to_string()).or_default());
        self
    }

    /// Answer every call to `path` with `status` and `body`.
    pub fn respond(&self, path: &str, status: u16, body: impl Into<Bytes>) -> &Self {
        let reply = Reply::Respond(status, body.into());
        self.route(path, |r| r.fallback = Some(reply))
    }

    /// Answer every call to `path` with a JSON body.
    pub fn respond_json(&self, path: &str, value: Value) -> &Self {
        self.respond(path, 200, value.to_string())
    }

    /// Fail the next call to `path` with `error`.
    pub fn fail_once(&self, path: &str, error: AdapterError) -> &Self {
        self.route(path, |r| r.script.push_back(Reply::Fail(error)))
    }

    /// Fail every call to `path` with `error`.
    pub fn fail(&self, path: &str, error: AdapterError) -> &Self {
        self.route(path, |r| r.fallback = Some(Reply::Fail(error)))
    }

    /// Answer the next call to `path` with `status` and `body`.
    pub fn respond_once(&self, path: &str, status: u16, body: impl Into<Bytes>) -> &Self {
        let reply = Reply::Respond(status, body.into());
        self.route(path, |r| r.script.push_back(reply))
    }

    /// Delay every answer on `path`.
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        self.route(path, |r| r.delay = delay)
    }

    /// Number of calls made to `path`.
    pub fn calls(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across all paths.
    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let (reply, delay) = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(request.path.clone()).or_default() += 1;
            state.requests.push(request.clone());
            match state.routes.get_mut(&request.path) {
                Some(route) => {
                    let reply = route
                        .script
                        .pop_front()
                        .or_else(|| route.fallback.clone())
                        .unwrap_or(Reply::Respond(404, Bytes::new()));
                    (reply, route.delay)
                }
                None => (Reply::Respond(404, Bytes::new()), Duration::ZERO),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Respond(status, body) => Ok(Response::new(status, body)),
            Reply::Fail(error) => Err(error),
        }
    }
}

/// Plate list entry as the device reports it.
pub fn plate_json(id: i64, path: &str, last_modified: i64) -> Value {
    serde_json::json!({
        "PlateID": id,
        "Path": path,
        "LastModified": last_modified,
        "LayersCount": 120,
        "Preview": true,
    })
}

/// Decode a PNG and return its dimensions.
pub fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).expect("valid PNG");
    (image.width(), image.height())
}
