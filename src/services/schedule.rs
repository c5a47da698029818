use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::models::{RescheduleRequest, Shift};

/// Interface boundary to the shift/calendar service, the authority over shift
/// records and committed assignments. The engine never mutates assignments
/// directly; approval signals `commit_swap` and the calendar's confirmation
/// drives APPROVED -> COMPLETED.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn get_shift(&self, id: Uuid) -> Result<Option<Shift>>;

    /// Fresh read of the staff member's committed shifts overlapping the
    /// given range. Callers must not cache the result across transition
    /// points; the committed schedule may drift between accept and approve.
    async fn committed_shifts_overlapping(
        &self,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Shift>>;

    /// Applies the approved swap to the actual assignments. Returning `Ok`
    /// is the calendar's confirmation that the swap took effect.
    async fn commit_swap(&self, request: &RescheduleRequest) -> Result<()>;
}
