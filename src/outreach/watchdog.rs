//! Pause watchdog — a pure derivation, not a timer.
//!
//! Whether a warning is due is recomputed from `(state, paused_at, now)` on
//! every status poll. Nothing is latched: an operator who chooses to keep
//! outreach paused will see the warning again on the next poll, because the
//! engine's `paused_at` is untouched and the derivation has no memory.

use chrono::{DateTime, Duration, Utc};

use super::OutreachState;

/// Whether the pause has persisted long enough to warn the operator.
///
/// True iff the state is paused, the pause start is known, and
/// `now − paused_at ≥ threshold`. The boundary is inclusive: a pause exactly
/// at the threshold warns.
pub fn warning_due(
    state: OutreachState,
    paused_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    if state != OutreachState::Paused {
        return false;
    }
    let Some(paused_at) = paused_at else {
        return false;
    };
    now.signed_duration_since(paused_at) >= threshold
}

/// How long outreach has been paused, if it is paused.
pub fn paused_for(
    state: OutreachState,
    paused_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if state != OutreachState::Paused {
        return None;
    }
    paused_at.map(|at| now.signed_duration_since(at))
}
