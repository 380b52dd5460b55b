//! Outreach pause/resume control and status polling.
//!
//! The engine is the source of truth for outreach state; this module holds
//! only point-in-time snapshots. Pause and resume are idempotent from the
//! caller's side — pausing an already-paused engine simply returns the
//! current status. The pause [`watchdog`] re-derives its warning from every
//! fetched snapshot instead of trusting whatever flag the engine last
//! computed.

pub mod watchdog;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GateConfig;
use crate::gateway::{EngineGateway, GatewayError, GatewayRequest};

/// Whether the engine's outreach loop is sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachState {
    /// The loop is sending.
    Active,
    /// The loop is paused and the queue frozen.
    Paused,
}

/// Snapshot of the engine's outreach loop.
///
/// Wire shape matches the engine's `GET /api/outreach/status` response. The
/// `warning_due` field is re-derived locally after every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachStatus {
    /// Loop state (`status` on the wire).
    #[serde(rename = "status")]
    pub state: OutreachState,
    /// When the current pause began, if paused.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Scheduled automatic resume time, if one was requested.
    #[serde(default)]
    pub resume_at: Option<DateTime<Utc>>,
    /// Engine-rendered pause duration, informational only.
    #[serde(default)]
    pub duration: Option<String>,
    /// Whether the send queue is frozen. True whenever paused.
    #[serde(default)]
    pub queue_frozen: bool,
    /// Drafts waiting in the queue.
    #[serde(default)]
    pub queued_count: u64,
    /// Sends currently in flight.
    #[serde(default)]
    pub in_flight_count: u64,
    /// Start of the next sending block, if scheduled.
    #[serde(default)]
    pub next_block_at: Option<DateTime<Utc>>,
    /// Whether the pause has exceeded the safety threshold.
    #[serde(default)]
    pub warning_due: bool,
}

/// Optional arguments for a pause request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PauseRequest {
    /// Operator-supplied reason, forwarded to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Requested automatic resume time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<DateTime<Utc>>,
}

/// Pause/resume/status operations against the engine's outreach loop.
pub struct OutreachControl {
    gateway: Arc<EngineGateway>,
    warning_threshold: chrono::Duration,
}

impl OutreachControl {
    /// Build the control loop from configuration and a shared gateway.
    pub fn new(config: &GateConfig, gateway: Arc<EngineGateway>) -> Self {
        Self {
            gateway,
            warning_threshold: config.pause_warning_threshold(),
        }
    }

    /// Pause the outreach loop.
    ///
    /// Idempotent: pausing an already-paused engine is not an error; the
    /// engine returns the status it already holds.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`]; the engine's own detail is preserved on refusal.
    pub async fn pause(&self, request: &PauseRequest) -> Result<OutreachStatus, GatewayError> {
        let body = serde_json::to_value(request)
            .map_err(|e| GatewayError::Transport(format!("failed to encode pause request: {e}")))?;
        let result = self
            .gateway
            .call(GatewayRequest::post("api/outreach/pause").with_body(body))
            .await?
            .into_success()?;
        tracing::info!(reason = request.reason.as_deref(), "outreach pause requested");
        self.finalize(result)
    }

    /// Resume the outreach loop. Idempotent, like [`OutreachControl::pause`].
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`]; the engine's own detail is preserved on refusal.
    pub async fn resume(&self) -> Result<OutreachStatus, GatewayError> {
        let result = self
            .gateway
            .call(GatewayRequest::post("api/outreach/resume").with_body(json!({})))
            .await?
            .into_success()?;
        tracing::info!("outreach resume requested");
        self.finalize(result)
    }

    /// Fetch the current outreach status.
    ///
    /// Side-effect free and safe to poll at the configured interval.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn status(&self) -> Result<OutreachStatus, GatewayError> {
        let result = self
            .gateway
            .call(GatewayRequest::get("api/outreach/status"))
            .await?
            .into_success()?;
        self.finalize(result)
    }

    /// Decode an engine status body and re-derive the watchdog warning.
    fn finalize(&self, body: serde_json::Value) -> Result<OutreachStatus, GatewayError> {
        let status: OutreachStatus = serde_json::from_value(body)
            .map_err(|_| GatewayError::Transport("engine returned malformed status".to_owned()))?;
        Ok(self.with_local_warning(status, Utc::now()))
    }

    /// Replace the engine's `warning_due` flag with the local derivation.
    ///
    /// Split out from [`OutreachControl::finalize`] so the derivation can be
    /// exercised with a pinned clock.
    pub fn with_local_warning(&self, mut status: OutreachStatus, now: DateTime<Utc>) -> OutreachStatus {
        status.warning_due =
            watchdog::warning_due(status.state, status.paused_at, now, self.warning_threshold);
        status
    }

    /// The threshold after which a persisting pause warns.
    pub fn warning_threshold(&self) -> chrono::Duration {
        self.warning_threshold
    }
}
