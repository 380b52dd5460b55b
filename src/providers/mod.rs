//! Mailbox provider connection lifecycle.
//!
//! One [`ConnectionManager`] per provider (Gmail, Outlook) drives the OAuth
//! connect / callback / disconnect / probe flow against the engine. The
//! engine owns the durable connection record and the OAuth tokens; what lives
//! here is the lifecycle state machine the dashboard reasons about:
//!
//! ```text
//! Disconnected ──authorization_url──▶ AuthorizationPending
//! AuthorizationPending ──callback ok──▶ Connected
//! AuthorizationPending ──callback err─▶ Error
//! any ──disconnect ok──▶ Disconnected
//! ```
//!
//! The authorization callback itself is a pure protocol relay: the engine's
//! status code, body, and `Location` header pass through unmodified.

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::gateway::{EngineGateway, GatewayError, GatewayRequest, GatewayResult, RelayResponse};

// ---------------------------------------------------------------------------
// Provider identity
// ---------------------------------------------------------------------------

/// A mailbox provider whose connection the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gmail.
    Gmail,
    /// Microsoft Outlook.
    Outlook,
}

impl Provider {
    /// Wire name used in engine paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
        }
    }

    /// Engine path returning the OAuth authorization URL.
    fn auth_url_path(self) -> String {
        format!("api/{}/auth-url", self.as_str())
    }

    /// Engine path exchanging the authorization code.
    fn callback_path(self) -> String {
        format!("api/{}/callback", self.as_str())
    }

    /// Engine path tearing down the connection.
    ///
    /// The engine's surface is asymmetric here: Gmail exposes a `connection`
    /// resource, Outlook a `disconnect` action.
    fn disconnect_path(self) -> String {
        match self {
            Self::Gmail => "api/gmail/connection".to_owned(),
            Self::Outlook => "api/outlook/disconnect".to_owned(),
        }
    }

    /// Engine path probing connection health.
    fn test_connection_path(self) -> String {
        format!("api/{}/test-connection", self.as_str())
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "outlook" => Ok(Self::Outlook),
            other => Err(GatewayError::Configuration(format!(
                "unknown provider {other:?}, expected gmail or outlook"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle state of a provider connection as observed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection exists.
    Disconnected,
    /// An authorization URL was issued; waiting on the OAuth callback.
    AuthorizationPending,
    /// The engine verified the connection for a known account.
    Connected,
    /// The last authorization attempt failed.
    Error,
}

/// Point-in-time snapshot of one provider connection.
///
/// `Connected` is only constructible with an account identifier; a connection
/// without a verified account can never report itself connected.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConnection {
    /// Which provider this describes.
    pub provider: Provider,
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Verified account email, present iff the state is `Connected`.
    pub account: Option<String>,
    /// When the engine last verified the connection.
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl ProviderConnection {
    /// A disconnected snapshot.
    fn disconnected(provider: Provider) -> Self {
        Self {
            provider,
            state: ConnectionState::Disconnected,
            account: None,
            last_verified_at: None,
        }
    }
}

/// What a relayed authorization callback meant, derived from the response the
/// engine handed back.
#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    /// Engine confirmed the connection for this account.
    Connected(String),
    /// Engine reported the exchange failed.
    Failed,
    /// Engine answered but named no account; authorization is still open.
    Inconclusive,
}

/// Interpret a relayed callback response.
///
/// The engine redirects back to the dashboard with the verdict encoded in
/// the `Location` query (`email=` on success, `error=`/`message=` on
/// failure). Non-redirect error statuses count as failures too.
fn callback_outcome(relay: &RelayResponse) -> CallbackOutcome {
    if relay.status >= 400 {
        return CallbackOutcome::Failed;
    }

    let Some(location) = relay.location.as_deref() else {
        return CallbackOutcome::Inconclusive;
    };

    // Location may be relative; resolve against a throwaway base.
    let Ok(base) = Url::parse("http://relay.invalid/") else {
        return CallbackOutcome::Inconclusive;
    };
    let Ok(target) = base.join(location) else {
        return CallbackOutcome::Inconclusive;
    };

    let mut account = None;
    for (key, value) in target.query_pairs() {
        match key.as_ref() {
            "error" | "message" => return CallbackOutcome::Failed,
            "email" if !value.trim().is_empty() => account = Some(value.into_owned()),
            _ => {}
        }
    }

    account.map_or(CallbackOutcome::Inconclusive, CallbackOutcome::Connected)
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Per-provider connection lifecycle, built on the gateway.
pub struct ConnectionManager {
    provider: Provider,
    gateway: Arc<EngineGateway>,
    connection: RwLock<ProviderConnection>,
}

impl ConnectionManager {
    /// Create a manager for one provider, starting disconnected.
    pub fn new(provider: Provider, gateway: Arc<EngineGateway>) -> Self {
        Self {
            provider,
            gateway,
            connection: RwLock::new(ProviderConnection::disconnected(provider)),
        }
    }

    /// Which provider this manager drives.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Current connection snapshot.
    pub fn snapshot(&self) -> ProviderConnection {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_connection(&self, update: impl FnOnce(&mut ProviderConnection)) {
        let mut connection = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut connection);
    }

    /// Fetch the OAuth authorization URL from the engine.
    ///
    /// On success the connection moves to `AuthorizationPending` and the URL
    /// is returned for the operator's browser to follow.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`]; an engine answer without a `url` field counts as
    /// a transport-level malformation. State is unchanged on failure.
    pub async fn authorization_url(&self) -> Result<String, GatewayError> {
        let body = self
            .gateway
            .call(GatewayRequest::get(self.provider.auth_url_path()))
            .await?
            .into_success()?;

        let url = body
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                GatewayError::Transport("engine returned no authorization url".to_owned())
            })?
            .to_owned();

        self.set_connection(|c| {
            c.state = ConnectionState::AuthorizationPending;
            c.account = None;
            c.last_verified_at = None;
        });

        tracing::info!(provider = %self.provider, "authorization url issued");
        Ok(url)
    }

    /// Exchange an authorization code by relaying the engine's callback.
    ///
    /// A missing code is answered locally with a 400 relay — the engine is
    /// not contacted. Otherwise the engine's response passes through
    /// unmodified (status, body, `Location`), and the connection state moves
    /// according to the verdict encoded in it. An inconclusive answer leaves
    /// authorization pending rather than inventing a connected account.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for credential or transport failures of the
    /// relay itself; engine-reported exchange failures come back as a normal
    /// relay response with the engine's own detail.
    pub async fn complete_authorization(
        &self,
        code: &str,
    ) -> Result<RelayResponse, GatewayError> {
        if code.trim().is_empty() {
            return Ok(RelayResponse {
                status: 400,
                body: json!({"error": "Missing 'code' parameter"}).to_string(),
                location: None,
            });
        }

        let relay = self
            .gateway
            .relay(
                &self.provider.callback_path(),
                &[("code".to_owned(), code.to_owned())],
            )
            .await?;

        match callback_outcome(&relay) {
            CallbackOutcome::Connected(account) => {
                tracing::info!(provider = %self.provider, "authorization completed");
                self.set_connection(|c| {
                    c.state = ConnectionState::Connected;
                    c.account = Some(account.clone());
                    c.last_verified_at = Some(Utc::now());
                });
            }
            CallbackOutcome::Failed => {
                tracing::warn!(provider = %self.provider, status = relay.status, "authorization failed");
                self.set_connection(|c| {
                    c.state = ConnectionState::Error;
                    c.account = None;
                });
            }
            CallbackOutcome::Inconclusive => {
                self.set_connection(|c| c.state = ConnectionState::AuthorizationPending);
            }
        }

        Ok(relay)
    }

    /// Tear down the provider connection.
    ///
    /// Idempotent: disconnecting while already disconnected succeeds — the
    /// engine treats the `DELETE` as a no-op and so does this manager. On
    /// upstream failure the local state stays unchanged and the engine's
    /// detail is surfaced.
    ///
    /// # Errors
    ///
    /// Any [`GatewayError`], including `Upstream` with the engine's own
    /// status and body when the engine refuses the disconnect.
    pub async fn disconnect(&self) -> Result<(), GatewayError> {
        let mut request = GatewayRequest::delete(self.provider.disconnect_path());
        if let Some(account) = self.snapshot().account {
            request = request.with_query("email", account);
        }

        self.gateway.call(request).await?.into_success()?;

        self.set_connection(|c| *c = ProviderConnection::disconnected(c.provider));
        tracing::info!(provider = %self.provider, "disconnected");
        Ok(())
    }

    /// Probe connection health for an account.
    ///
    /// Read-only: never mutates the lifecycle state, and the engine's verdict
    /// (connected / expired / invalid) comes back verbatim with its status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for credential or transport failures only;
    /// non-2xx verdicts are part of the returned result.
    pub async fn test_connection(&self, account: &str) -> Result<GatewayResult, GatewayError> {
        self.gateway
            .call(
                GatewayRequest::get(self.provider.test_connection_path())
                    .with_query("email", account),
            )
            .await
    }
}
