use chrono::{DateTime, Utc};

use crate::database::models::RequestStatus;

/// Whether a request has silently lapsed: still awaiting action (PENDING or
/// ACCEPTED) but past its validity window. Pure function of
/// (status, expiresAt, now); the engine consults it before every action and
/// the background sweep applies the same rule through the store's stale
/// query. APPROVED does not lapse: the swap is already committed and only the
/// calendar confirmation is outstanding.
pub fn is_expired(status: &RequestStatus, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status.is_actionable() && now > expires_at
}
