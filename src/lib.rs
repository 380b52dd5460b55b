//! Scoutgate — trust and control gateway for the Scout operator dashboard.
//!
//! Mediates every externally authenticated, stateful interaction between the
//! dashboard's server side and the outreach engine:
//!
//! - [`credentials`] mints the short-lived service credential attached to
//!   every engine call (never a user session).
//! - [`gateway`] wraps outbound engine calls with the credential, uniform
//!   error shaping, and upstream status passthrough.
//! - [`providers`] drives the per-provider (Gmail/Outlook) OAuth connection
//!   lifecycle: connect, callback relay, disconnect, connection probe.
//! - [`outreach`] exposes pause/resume/status and the pause watchdog.
//!
//! Durable state lives in the engine; this crate is a stateless mediator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod engine;
pub mod gateway;
pub mod logging;
pub mod outreach;
pub mod providers;
