/// Snapshot staleness detection.
///
/// The flood estimate runs off the provider's current snapshot. A snapshot
/// that has stopped updating still looks plausible, so the coordinator
/// checks its age and logs a warning before using it.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so tests are deterministic.

use crate::model::CurrentSnapshot;
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the snapshot is older than `max_age_minutes` relative
/// to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// A snapshot stamped in the future is never stale.
pub fn is_snapshot_stale_at(
    snapshot: &CurrentSnapshot,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> bool {
    let age_minutes = (now - snapshot.timestamp).num_minutes();
    age_minutes > 0 && age_minutes as u64 > max_age_minutes
}

/// Convenience wrapper that uses the real current time.
pub fn is_snapshot_stale(snapshot: &CurrentSnapshot, max_age_minutes: u64) -> bool {
    is_snapshot_stale_at(snapshot, max_age_minutes, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
