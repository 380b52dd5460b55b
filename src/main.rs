#![allow(missing_docs)]

//! Scoutgate operator CLI.
//!
//! Thin wrapper over the library: every subcommand builds the gateway from
//! configuration, performs one authenticated engine interaction, and prints
//! the structured result as JSON. `watch` runs the status poll loop with the
//! pause watchdog.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};

use scoutgate::config::GateConfig;
use scoutgate::engine::EngineClient;
use scoutgate::gateway::{EngineGateway, GatewayError};
use scoutgate::logging;
use scoutgate::outreach::{OutreachControl, PauseRequest};
use scoutgate::providers::{ConnectionManager, Provider};

#[derive(Parser)]
#[command(name = "scoutgate", version, about = "Operator gateway to the outreach engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check engine liveness.
    Health,
    /// Fetch the current outreach status.
    Status,
    /// Pause the outreach loop.
    Pause {
        /// Reason recorded with the pause.
        #[arg(long)]
        reason: Option<String>,
        /// Automatic resume time (RFC 3339).
        #[arg(long)]
        until: Option<String>,
    },
    /// Resume the outreach loop.
    Resume,
    /// Fetch an OAuth authorization URL for a provider.
    Connect {
        /// Provider: gmail or outlook.
        provider: String,
    },
    /// Relay an OAuth authorization code to the engine.
    Callback {
        /// Provider: gmail or outlook.
        provider: String,
        /// Authorization code from the provider redirect.
        #[arg(long)]
        code: String,
    },
    /// Disconnect a provider. Safe to repeat.
    Disconnect {
        /// Provider: gmail or outlook.
        provider: String,
    },
    /// Probe a provider connection without mutating it.
    TestConnection {
        /// Provider: gmail or outlook.
        provider: String,
        /// Account email to probe.
        #[arg(long)]
        email: String,
    },
    /// Poll outreach status at the configured interval and log warnings.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = GateConfig::load().context("failed to load configuration")?;

    // Watch mode logs to file as well; everything else is a one-shot.
    let _logging_guard = match cli.command {
        Command::Watch => Some(logging::init_watch(std::path::Path::new("logs"))?),
        _ => {
            logging::init_cli();
            None
        }
    };

    let gateway = Arc::new(EngineGateway::new(&config).map_err(render_failure)?);

    match cli.command {
        Command::Health => {
            let client = EngineClient::new(gateway);
            let result = client.health().await.map_err(render_failure)?;
            print_json(&json!({"status": result.status(), "body": result.body()}))
        }
        Command::Status => {
            let control = OutreachControl::new(&config, gateway);
            let status = control.status().await.map_err(render_failure)?;
            print_json(&serde_json::to_value(&status)?)
        }
        Command::Pause { reason, until } => {
            let resume_at = until
                .map(|raw| {
                    raw.parse()
                        .with_context(|| format!("invalid --until timestamp {raw:?}"))
                })
                .transpose()?;
            let control = OutreachControl::new(&config, gateway);
            let status = control
                .pause(&PauseRequest { reason, resume_at })
                .await
                .map_err(render_failure)?;
            print_json(&serde_json::to_value(&status)?)
        }
        Command::Resume => {
            let control = OutreachControl::new(&config, gateway);
            let status = control.resume().await.map_err(render_failure)?;
            print_json(&serde_json::to_value(&status)?)
        }
        Command::Connect { provider } => {
            let manager = manager_for(&provider, gateway)?;
            let url = manager.authorization_url().await.map_err(render_failure)?;
            print_json(&json!({"url": url, "state": manager.snapshot().state}))
        }
        Command::Callback { provider, code } => {
            let manager = manager_for(&provider, gateway)?;
            let relay = manager
                .complete_authorization(&code)
                .await
                .map_err(render_failure)?;
            print_json(&json!({
                "status": relay.status,
                "location": relay.location,
                "state": manager.snapshot().state,
            }))
        }
        Command::Disconnect { provider } => {
            let manager = manager_for(&provider, gateway)?;
            manager.disconnect().await.map_err(render_failure)?;
            print_json(&json!({"success": true, "provider": manager.provider()}))
        }
        Command::TestConnection { provider, email } => {
            let manager = manager_for(&provider, gateway)?;
            let result = manager
                .test_connection(&email)
                .await
                .map_err(render_failure)?;
            print_json(&json!({"status": result.status(), "body": result.body()}))
        }
        Command::Watch => watch(&config, gateway).await,
    }
}

/// Build a connection manager from a provider CLI argument.
fn manager_for(provider: &str, gateway: Arc<EngineGateway>) -> Result<ConnectionManager> {
    let provider: Provider = provider.parse().map_err(render_failure)?;
    Ok(ConnectionManager::new(provider, gateway))
}

/// Poll the outreach status at the configured interval until interrupted.
async fn watch(config: &GateConfig, gateway: Arc<EngineGateway>) -> Result<()> {
    let control = OutreachControl::new(config, gateway);
    let mut ticker = tokio::time::interval(config.status_poll_interval());

    info!(
        interval_secs = config.status_poll_interval_secs,
        threshold_secs = config.pause_warning_threshold_secs,
        "watching outreach status"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                return Ok(());
            }
        }

        match control.status().await {
            Ok(status) => {
                info!(
                    state = ?status.state,
                    queued = status.queued_count,
                    in_flight = status.in_flight_count,
                    queue_frozen = status.queue_frozen,
                    "outreach status"
                );
                if status.warning_due {
                    warn!(
                        paused_at = ?status.paused_at,
                        "outreach has been paused past the safety threshold; resume it or keep it paused deliberately"
                    );
                }
            }
            Err(err) => warn!(error = %err, "status poll failed"),
        }
    }
}

/// Shape a gateway failure the way the dashboard's edge responses do:
/// an `error` string plus optional upstream `details`.
fn render_failure(err: GatewayError) -> anyhow::Error {
    let body = match &err {
        GatewayError::Configuration(message) => {
            json!({"error": "Server configuration error", "details": message})
        }
        GatewayError::Upstream { status, detail } => {
            json!({"error": "Engine request failed", "status": status, "details": detail})
        }
        GatewayError::Transport(message) => {
            json!({"error": "Server proxy error", "details": message})
        }
    };
    anyhow::anyhow!("{body}")
}

/// Print a JSON value for the operator.
fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
