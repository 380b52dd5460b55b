//! Service-credential minting for server-to-server engine calls.
//!
//! The minted credential is the internal-probe secret wrapped in a validity
//! window. It authenticates the dashboard's server side to the engine and is
//! distinct from any end-user session: it is never persisted, never sent to
//! the browser, and never logged.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::config::GateConfig;
use crate::gateway::GatewayError;

/// How long before expiry a cached credential is proactively re-minted.
const REFRESH_MARGIN_SECS: i64 = 30;

/// A short-lived bearer credential for calls to the engine.
///
/// Owned exclusively by the [`CredentialMinter`]; callers receive clones and
/// must not hold one past its expiry.
#[derive(Clone)]
pub struct ServiceCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl ServiceCredential {
    /// The opaque bearer value. Attach to a request header; never log it.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When this credential stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the credential is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the credential is close enough to expiry to re-mint.
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        self.expires_at
            .checked_sub_signed(margin)
            .is_none_or(|deadline| now >= deadline)
    }
}

/// Mints service credentials from the configured probe secret.
///
/// Minting is cheap, so credentials are produced fresh per outbound call; a
/// small cache avoids re-reading the secret under concurrent load. The cache
/// is replaced whole under a write lock, so no caller can observe a torn
/// credential, and a credential inside its refresh margin is never served.
pub struct CredentialMinter {
    probe_key: Option<String>,
    ttl: chrono::Duration,
    cache: RwLock<Option<ServiceCredential>>,
}

impl std::fmt::Debug for CredentialMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMinter")
            .field("probe_key", &self.probe_key.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CredentialMinter {
    /// Build a minter from gateway configuration.
    pub fn new(config: &GateConfig) -> Self {
        Self {
            probe_key: config
                .probe_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_owned),
            ttl: config.credential_ttl(),
            cache: RwLock::new(None),
        }
    }

    /// Mint a credential valid from now.
    ///
    /// Serves a cached credential only while it is outside its refresh
    /// margin; otherwise mints a fresh one and atomically replaces the cache.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the probe secret is
    /// absent or empty. This is fatal and must not be retried.
    pub fn mint(&self) -> Result<ServiceCredential, GatewayError> {
        let now = Utc::now();

        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(credential) = cache.as_ref() {
                if !credential.needs_refresh(now) {
                    return Ok(credential.clone());
                }
            }
        }

        let key = self.probe_key.as_deref().ok_or_else(|| {
            GatewayError::Configuration("internal probe key is not configured".to_owned())
        })?;

        let credential = ServiceCredential {
            token: key.to_owned(),
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *cache = Some(credential.clone());
        Ok(credential)
    }
}
