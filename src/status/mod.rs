//! Status polling.
//!
//! [`StatusPoller::get_status`] performs one poll: `GET /status` with a
//! single retry, lean decoding, plate enrichment from already-resolved
//! data, canonicalization, and flattening into the map consumed by the UI.

pub mod canonical;

pub use canonical::{CanonicalState, JobStatus, NanoDlpStateMachine, StateCanonicalizer};

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value, json};

use crate::Result;
use crate::resolver::PlateResolver;
use crate::retry::{RetryConfig, with_retry};
use crate::telemetry;
use crate::transport::{Request, Transport};
use crate::types::{StatusPayload, StatusSnapshot};

/// Endpoint reporting device and job status.
pub const STATUS_PATH: &str = "/status";

/// Normalized status as handed to callers.
pub type StatusMap = Map<String, Value>;

/// Orchestrates status polls.
pub struct StatusPoller {
    transport: Arc<dyn Transport>,
    resolver: PlateResolver,
    canonicalizer: Arc<dyn StateCanonicalizer>,
    retry: RetryConfig,
}

impl StatusPoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: PlateResolver,
        canonicalizer: Arc<dyn StateCanonicalizer>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            resolver,
            canonicalizer,
            retry,
        }
    }

    /// Poll the device once and return the normalized status map.
    ///
    /// Fails only when both attempts at `GET /status` fail (or the payload
    /// is not a JSON object). Plate enrichment never blocks: it uses what
    /// the resolver already knows and lets it resolve in the background.
    pub async fn get_status(&self) -> Result<StatusMap> {
        let started = Instant::now();
        let result = self.poll().await;
        metrics::histogram!(telemetry::STATUS_POLL_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn poll(&self) -> Result<StatusMap> {
        let mut snapshot = self.fetch_snapshot().await?;
        self.enrich(&mut snapshot);
        let canonical = self.canonicalizer.canonicalize(&snapshot);
        Ok(normalize(&snapshot, &canonical))
    }

    /// Fetch and parse a fresh snapshot, with the poller's retry policy.
    ///
    /// Nothing here is cached; motion commands use this to read the true
    /// current Z position.
    pub async fn fetch_snapshot(&self) -> Result<StatusSnapshot> {
        let payload = with_retry(&self.retry, "status", || self.fetch_payload()).await?;
        Ok(payload.snapshot())
    }

    async fn fetch_payload(&self) -> Result<StatusPayload> {
        let response = self
            .transport
            .send(Request::get(STATUS_PATH))
            .await?
            .error_for_status()?;
        Ok(StatusPayload::from_slice(&response.body)?)
    }

    /// Splice an already-resolved plate into a snapshot lacking file data.
    fn enrich(&self, snapshot: &mut StatusSnapshot) {
        if snapshot.has_file_metadata() {
            return;
        }
        let Some(plate_id) = snapshot.plate_id else {
            return;
        };
        if let Some(record) = self.resolver.resolve(plate_id, snapshot.printing) {
            snapshot.file = Some(record);
        }
    }

    /// Canonicalizer used by this poller.
    pub fn canonicalizer(&self) -> &Arc<dyn StateCanonicalizer> {
        &self.canonicalizer
    }
}

/// Flatten a snapshot and its canonical state into the status map.
///
/// `print_data` is present while a job is active or a plate is known;
/// `file_data` inside it is `null` until the plate is resolved.
pub fn normalize(snapshot: &StatusSnapshot, canonical: &CanonicalState) -> StatusMap {
    let mut map = Map::new();
    map.insert("status".into(), json!(canonical.status.as_str()));
    map.insert("paused".into(), json!(canonical.paused));
    map.insert("cancel_latched".into(), json!(canonical.cancel_latched));
    map.insert("finished".into(), json!(canonical.finished));
    map.insert("printing".into(), json!(snapshot.printing));
    map.insert("state".into(), json!(snapshot.state));

    let job_active = snapshot.printing || snapshot.plate_id.is_some() || snapshot.file.is_some();
    let print_data = if job_active {
        let file_data = snapshot
            .file
            .as_ref()
            .map(|f| serde_json::to_value(f).unwrap_or_default())
            .unwrap_or(Value::Null);
        json!({
            "layer_id": snapshot.layer_id,
            "total_layers": snapshot.layers_count,
            "progress": snapshot.progress(),
            "plate_id": snapshot.plate_id,
            "file_data": file_data,
        })
    } else {
        Value::Null
    };
    map.insert("print_data".into(), print_data);

    map.insert("temperatures".into(), json!(snapshot.temperatures));
    map.insert("z".into(), json!(snapshot.z_mm));
    map.insert("curing".into(), json!(snapshot.curing));
    map.insert(
        "device_status_message".into(),
        json!(snapshot.device_status),
    );
    map
}
