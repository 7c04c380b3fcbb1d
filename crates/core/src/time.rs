//! Wall-clock helpers.
//!
//! The protocol's `timestamp` field and the one-way latency diagnostic
//! (§4.4) both want nanoseconds since the Unix epoch, not a monotonic
//! clock — two hosts' monotonic clocks aren't comparable.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in nanoseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch, which callers
/// already treat as "no timestamp" (see [`SessionRecord::record_latency`](crate::registry::SessionRecord::record_latency)).
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
