// crates/lti-toolbox-core/src/core/time.rs
// ============================================================================
// Module: LTI Toolbox Time
// Description: Wall-clock helpers shared by stores and logs.
// Purpose: Express timestamps as unix milliseconds.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Timestamps are unix epoch milliseconds stored as `i64` so they fit SQLite
//! integer columns without conversion.

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current unix time in milliseconds.
///
/// Clocks before the epoch clamp to zero; far-future clocks clamp to `i64::MAX`.
#[must_use]
pub fn now_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

/// Returns the expiry instant for a time-to-live measured from `now_ms`.
#[must_use]
pub fn expiry_after(now_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(ttl_ms)
}
