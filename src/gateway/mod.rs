//! Authenticated request gateway to the outreach engine.
//!
//! Every outbound call carries a freshly minted service credential in the
//! internal-probe header. Upstream responses come back as structured results
//! whether or not the engine reported success: a non-2xx status is a failed
//! logical call but a completed HTTP exchange, and its JSON body is preserved
//! for diagnostics instead of being flattened into a generic message.
//!
//! The gateway is stateless between calls apart from the minter's credential
//! cache; it never retries.

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::GateConfig;
use crate::credentials::CredentialMinter;

/// Header carrying the service credential on every engine call.
pub const PROBE_HEADER: &str = "x-scout-internal-probe";

/// Longest upstream error text preserved in a failure detail.
const MAX_DETAIL_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure taxonomy for calls through the gateway.
///
/// The three kinds matter to callers for different reasons:
/// `Configuration` is fatal and must not be retried, `Upstream` carries the
/// engine's own status and body so the operator sees the real cause, and
/// `Transport` is a reachability problem with a deliberately generic message.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or invalid credential material or base URL. Never retried.
    #[error("gateway configuration error: {0}")]
    Configuration(String),

    /// The engine was reachable and answered with a non-success status.
    #[error("engine returned status {status}")]
    Upstream {
        /// Upstream HTTP status code, forwarded verbatim.
        status: u16,
        /// Upstream JSON body (or sanitized text when the body was not JSON).
        detail: Value,
    },

    /// Network, timeout, or malformed-response failure. No stack traces,
    /// no upstream internals — a short safe message only.
    #[error("engine request failed: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Classify a `reqwest` failure without leaking its internals.
    fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection to engine failed"
        } else if err.is_body() || err.is_decode() {
            "engine response could not be read"
        } else {
            "request could not be completed"
        };
        Self::Transport(message.to_owned())
    }

    /// The HTTP status an edge layer should answer with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration(_) | Self::Transport(_) => 500,
            Self::Upstream { status, .. } => *status,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Result
// ---------------------------------------------------------------------------

/// One outbound engine call, constructed per request and consumed by
/// [`EngineGateway::call`].
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// HTTP method.
    pub method: Method,
    /// Engine path, e.g. `api/outreach/status`.
    pub path: String,
    /// Query parameters appended to the target URL.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Extra headers beyond the credential and content type.
    pub headers: Vec<(String, String)>,
}

impl GatewayRequest {
    /// A request with no query, body, or extra headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    /// A `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append an extra header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Snapshot of a completed HTTP exchange with the engine.
///
/// Immutable once returned. A non-2xx status is represented here too, so the
/// caller can forward the engine's status and body verbatim or harden it into
/// a [`GatewayError::Upstream`] via [`GatewayResult::into_success`].
#[derive(Debug, Clone)]
pub struct GatewayResult {
    status: u16,
    body: Value,
}

impl GatewayResult {
    /// Build a result from status and parsed body.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Upstream HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Parsed response body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Whether the engine reported logical success (2xx).
    pub fn is_success(&self) -> bool {
        StatusCode::from_u16(self.status).is_ok_and(|s| s.is_success())
    }

    /// Require logical success, converting a non-2xx exchange into
    /// [`GatewayError::Upstream`] that keeps the status and body.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Upstream` when the engine answered non-2xx.
    pub fn into_success(self) -> Result<Value, GatewayError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(GatewayError::Upstream {
                status: self.status,
                detail: self.body,
            })
        }
    }
}

/// Raw passthrough of an engine response acting as a protocol intermediary.
///
/// Used by the OAuth callback relay: status code, body, and `Location` header
/// are preserved exactly as the engine sent them.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    /// Upstream status code, unmodified.
    pub status: u16,
    /// Upstream body text, unmodified.
    pub body: String,
    /// Upstream `Location` header, if present.
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Wraps outbound engine calls with credential minting, error shaping, and
/// status passthrough.
pub struct EngineGateway {
    base_url: Url,
    minter: CredentialMinter,
    client: reqwest::Client,
    relay_client: reqwest::Client,
    probe_key: Option<String>,
}

impl std::fmt::Debug for EngineGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineGateway")
            .field("base_url", &self.base_url.as_str())
            .field("minter", &self.minter)
            .field("probe_key", &self.probe_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl EngineGateway {
    /// Build a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the base URL does not
    /// parse or the HTTP client cannot be constructed.
    pub fn new(config: &GateConfig) -> Result<Self, GatewayError> {
        let mut base_url = Url::parse(&config.backend_base_url).map_err(|e| {
            GatewayError::Configuration(format!(
                "invalid backend base URL {:?}: {e}",
                config.backend_base_url
            ))
        })?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build http client: {e}")))?;

        // Redirects are handed back to the caller untouched, so the relay
        // client must not follow them.
        let relay_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build http client: {e}")))?;

        Ok(Self {
            base_url,
            minter: CredentialMinter::new(config),
            client,
            relay_client,
            probe_key: config.probe_key.clone(),
        })
    }

    /// Resolve an engine path plus query parameters against the base URL.
    fn endpoint(&self, path: &str, query: &[(String, String)]) -> Result<Url, GatewayError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Configuration(format!("invalid engine path {path:?}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Execute one authenticated call against the engine.
    ///
    /// Mints a credential, attaches it as the probe header, sets
    /// `Content-Type: application/json` when a body is present, and returns
    /// the exchange as a [`GatewayResult`] — including non-2xx answers, whose
    /// JSON bodies are preserved for diagnostics.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Configuration`] — no credential material; the
    ///   network is never touched.
    /// - [`GatewayError::Transport`] — network failure, timeout, or a 2xx
    ///   answer whose body was not valid JSON.
    pub async fn call(&self, request: GatewayRequest) -> Result<GatewayResult, GatewayError> {
        let credential = self.minter.mint()?;
        let url = self.endpoint(&request.path, &request.query)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(PROBE_HEADER, credential.token());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        tracing::debug!(
            path = %request.path,
            method = %request.method,
            status = status.as_u16(),
            "engine call completed"
        );

        let body = self.parse_body(status, &text)?;
        Ok(GatewayResult::new(status.as_u16(), body))
    }

    /// Relay a `GET` to the engine without reinterpreting the response.
    ///
    /// Used for OAuth callbacks: status code, body, and `Location` come back
    /// exactly as sent, and redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when no credential can be
    /// minted and [`GatewayError::Transport`] on network failure.
    pub async fn relay(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<RelayResponse, GatewayError> {
        let credential = self.minter.mint()?;
        let url = self.endpoint(path, query)?;

        let response = self
            .relay_client
            .get(url)
            .header(PROBE_HEADER, credential.token())
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::from_transport(&e))?;

        tracing::debug!(path, status, redirect = location.is_some(), "relay completed");

        Ok(RelayResponse {
            status,
            body,
            location,
        })
    }

    /// Parse a response body according to the exchange outcome.
    ///
    /// A 2xx answer must be JSON (empty bodies parse to null). A non-2xx
    /// answer keeps whatever the engine sent: parsed JSON when possible,
    /// otherwise the sanitized raw text, so diagnostic detail survives.
    fn parse_body(&self, status: StatusCode, text: &str) -> Result<Value, GatewayError> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(_) if status.is_success() => Err(GatewayError::Transport(
                "engine returned malformed JSON".to_owned(),
            )),
            Err(_) => Ok(Value::String(sanitize_detail(
                text,
                self.probe_key.as_deref(),
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Detail sanitization
// ---------------------------------------------------------------------------

/// Make raw upstream error text safe to surface to the operator.
///
/// Collapses whitespace, redacts the probe secret and OAuth-token-shaped
/// substrings, and truncates.
fn sanitize_detail(raw: &str, secret: Option<&str>) -> String {
    let mut sanitized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(secret) = secret.map(str::trim).filter(|s| !s.is_empty()) {
        sanitized = sanitized.replace(secret, "[REDACTED]");
    }

    for pattern in [
        // Google OAuth access tokens.
        r"ya29\.[A-Za-z0-9_\-.]{20,}",
        // JWTs (Microsoft identity platform tokens among them).
        r"eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_DETAIL_CHARS {
        let shortened = sanitized.chars().take(MAX_DETAIL_CHARS).collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
