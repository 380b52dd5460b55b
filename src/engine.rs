//! Typed front over the rest of the engine's consumed HTTP surface.
//!
//! Each method is a thin authenticated passthrough: the upstream status and
//! body come back verbatim in the [`GatewayResult`], and the caller decides
//! whether a non-2xx answer is fatal. Connection lifecycle and outreach
//! control have richer homes in [`crate::providers`] and [`crate::outreach`].

use std::sync::Arc;

use serde_json::Value;

use crate::gateway::{EngineGateway, GatewayError, GatewayRequest, GatewayResult};

/// Thin typed client for the engine endpoints the dashboard consumes.
pub struct EngineClient {
    gateway: Arc<EngineGateway>,
}

impl EngineClient {
    /// Wrap a shared gateway.
    pub fn new(gateway: Arc<EngineGateway>) -> Self {
        Self { gateway }
    }

    /// `GET /health` — engine liveness.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn health(&self) -> Result<GatewayResult, GatewayError> {
        self.gateway.call(GatewayRequest::get("health")).await
    }

    /// `GET /api/settings` for one user.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn settings(&self, user_email: &str) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(GatewayRequest::get("api/settings").with_query("user_email", user_email))
            .await
    }

    /// `POST /api/settings` — update user preferences.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn update_settings(&self, body: Value) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(GatewayRequest::post("api/settings").with_body(body))
            .await
    }

    /// `GET /api/contacts` — the outreach contact list.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn contacts(&self) -> Result<GatewayResult, GatewayError> {
        self.gateway.call(GatewayRequest::get("api/contacts")).await
    }

    /// `GET /api/signals` — buying signals feed.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn signals(&self) -> Result<GatewayResult, GatewayError> {
        self.gateway.call(GatewayRequest::get("api/signals")).await
    }

    /// `POST /api/drafts/action` — approve, reject, or regenerate a draft.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn draft_action(&self, body: Value) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(GatewayRequest::post("api/drafts/action").with_body(body))
            .await
    }

    /// `POST /api/email/send` — send an approved draft.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn send_email(&self, body: Value) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(GatewayRequest::post("api/email/send").with_body(body))
            .await
    }

    /// `POST /api/refinery/run` — trigger a refinery pass.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`].
    pub async fn run_refinery(&self) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(GatewayRequest::post("api/refinery/run"))
            .await
    }
}
