//! Job control, motion and cure commands.
//!
//! Commands are never cached or retried. A non-2xx answer is returned as
//! [`AdapterError::Api`], except for [`NanoDlpAdapter::emergency_stop`].

use std::fmt;

use tracing::{debug, info, warn};

use super::NanoDlpAdapter;
use crate::resolver;
use crate::transport::Request;
use crate::types::PlateRecord;
use crate::{AdapterError, Result};

/// Direction of a relative Z move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZDirection {
    Up,
    Down,
}

impl ZDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZDirection::Up => "up",
            ZDirection::Down => "down",
        }
    }
}

impl fmt::Display for ZDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative move needed to get from `current_mm` to `target_mm`, in whole
/// microns. `None` when already there.
pub(crate) fn z_delta(current_mm: f64, target_mm: f64) -> Option<(ZDirection, u64)> {
    let delta = ((target_mm - current_mm) * 1000.0).round() as i64;
    match delta {
        0 => None,
        d if d > 0 => Some((ZDirection::Up, d.unsigned_abs())),
        d => Some((ZDirection::Down, d.unsigned_abs())),
    }
}

impl NanoDlpAdapter {
    async fn command(&self, request: Request) -> Result<()> {
        let path = request.path.clone();
        self.transport.send(request).await?.error_for_status()?;
        debug!(path = %path, "command accepted");
        Ok(())
    }

    /// Start printing the plate stored at `file_path`.
    ///
    /// The plate list is force-refreshed once if the path is unknown, and
    /// again after the start so the new job's plate is visible.
    pub async fn start_print(&self, file_path: &str) -> Result<PlateRecord> {
        let plate = match self.resolver.find_by_path(file_path).await {
            Some(plate) => plate,
            None => {
                let plates = self.plates.get(true).await;
                resolver::find_by_path(&plates, file_path)
                    .cloned()
                    .ok_or_else(|| AdapterError::NotFound(format!("no plate for {file_path}")))?
            }
        };
        let plate_id = plate.plate_id.ok_or_else(|| {
            AdapterError::NotFound(format!("plate {file_path} has no ID yet"))
        })?;

        self.start_plate(plate_id).await?;
        info!(plate_id, path = file_path, "print started");
        Ok(plate)
    }

    /// Start printing plate `plate_id`.
    pub async fn start_plate(&self, plate_id: i64) -> Result<()> {
        self.command(Request::get(format!("/printer/start/{plate_id}")))
            .await?;
        self.plates.get(true).await;
        Ok(())
    }

    /// Stop the running job. Status reads Canceling until the device stops.
    pub async fn stop_print(&self) -> Result<()> {
        self.command(Request::get("/printer/stop")).await?;
        self.poller.canonicalizer().note_cancel_requested();
        Ok(())
    }

    pub async fn pause_print(&self) -> Result<()> {
        self.command(Request::get("/printer/pause")).await
    }

    pub async fn resume_print(&self) -> Result<()> {
        self.command(Request::get("/printer/unpause")).await
    }

    /// Halt the device immediately.
    ///
    /// Any HTTP answer counts as success: the device is known to report
    /// errors even when the stop took effect. Transport failures still
    /// propagate, since then the request may never have arrived.
    pub async fn emergency_stop(&self) -> Result<()> {
        let response = self.transport.send(Request::get("/printer/force-stop")).await?;
        if !response.is_success() {
            warn!(status = response.status, "device reported an error on force stop");
        }
        self.poller.canonicalizer().note_cancel_requested();
        Ok(())
    }

    /// Move the build plate by `microns` in `direction`.
    pub async fn move_z(&self, direction: ZDirection, microns: u64) -> Result<()> {
        self.command(Request::get(format!(
            "/z-axis/move/{direction}/micron/{microns}"
        )))
        .await
    }

    /// Move the build plate to an absolute height in millimetres.
    ///
    /// Reads the current Z from a fresh status poll; if that fails the
    /// move fails. Nothing is sent when already at the target.
    pub async fn move_to_height(&self, target_mm: f64) -> Result<()> {
        if !target_mm.is_finite() || target_mm < 0.0 {
            return Err(AdapterError::InvalidInput(format!(
                "target height must be a non-negative number, got {target_mm}"
            )));
        }

        let snapshot = self.poller.fetch_snapshot().await?;
        let current_mm = snapshot
            .z_mm
            .ok_or_else(|| AdapterError::Decode("status did not report a Z position".into()))?;

        match z_delta(current_mm, target_mm) {
            Some((direction, microns)) => {
                debug!(current_mm, target_mm, %direction, microns, "moving to height");
                self.move_z(direction, microns).await
            }
            None => Ok(()),
        }
    }

    pub async fn move_to_top(&self) -> Result<()> {
        self.command(Request::get("/z-axis/top")).await
    }

    pub async fn move_to_bottom(&self) -> Result<()> {
        self.command(Request::get("/z-axis/bottom")).await
    }

    pub async fn calibrate_z(&self) -> Result<()> {
        self.command(Request::get("/z-axis/calibrate")).await
    }

    pub async fn projector_on(&self) -> Result<()> {
        self.command(Request::get("/projector/on")).await
    }

    pub async fn projector_blank(&self) -> Result<()> {
        self.command(Request::get("/projector/blank")).await
    }

    /// Run raw G-code on the device.
    pub async fn send_gcode(&self, gcode: &str) -> Result<()> {
        if gcode.trim().is_empty() {
            return Err(AdapterError::InvalidInput("gcode must not be empty".into()));
        }
        self.command(Request::post_form(
            "/gcode",
            vec![("gcode".to_string(), gcode.to_string())],
        ))
        .await
    }
}
