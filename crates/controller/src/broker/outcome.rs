//! # Outcome Classification
//!
//! Maps a broker call failure onto what the reconciler should do about it,
//! and decides when a retried operation has run out its window.

use super::BrokerError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// What a broker call result means for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The broker performed the operation.
    Success,
    /// The broker rejected the request before performing any side effect.
    /// Terminal; no compensating action is needed.
    DefiniteFailure,
    /// It cannot be determined whether the broker performed the side effect.
    /// A bind with this outcome needs orphan mitigation.
    AmbiguousFailure,
    /// The response never arrived. Retried until the retry window expires.
    TransportFailure,
}

/// Classify a broker call failure.
///
/// A 2xx protocol error (malformed success) and 5xx/408 leave genuine doubt
/// about whether the broker acted; 3xx and the rest of 4xx indicate the
/// request was rejected up front. Plain transport errors are retried rather
/// than mitigated.
#[must_use]
pub fn classify_broker_error(err: &BrokerError) -> Outcome {
    match err {
        BrokerError::Transport(_) => Outcome::TransportFailure,
        BrokerError::Protocol { status, .. } => match *status {
            200 => Outcome::DefiniteFailure,
            201..=299 => Outcome::AmbiguousFailure,
            408 => Outcome::AmbiguousFailure,
            300..=499 => Outcome::DefiniteFailure,
            500.. => Outcome::AmbiguousFailure,
            // 1xx never carries a broker response body; treat as rejected.
            _ => Outcome::DefiniteFailure,
        },
    }
}

/// Whether an operation that started at `start_time` (RFC3339) has been
/// retried past the configured window. An unset or unparsable start time
/// never expires the window.
#[must_use]
pub fn retry_window_expired(start_time: Option<&str>, window: Duration) -> bool {
    let Some(started) = start_time.and_then(|t| t.parse::<DateTime<Utc>>().ok()) else {
        return false;
    };
    let elapsed = Utc::now().signed_duration_since(started);
    elapsed.to_std().is_ok_and(|elapsed| elapsed > window)
}
