use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::Shift;
use crate::services::schedule::ScheduleService;

/// Schedule-conflict detection against the external calendar. Stateless; a
/// check is only valid for the instant it ran, so accept and approve each run
/// their own.
#[derive(Clone)]
pub struct ConflictDetector {
    schedule: Arc<dyn ScheduleService>,
}

impl ConflictDetector {
    pub fn new(schedule: Arc<dyn ScheduleService>) -> Self {
        Self { schedule }
    }

    /// True when `staff_id` already holds a committed shift overlapping
    /// `candidate`. `shedding` names a shift the staff member is giving up in
    /// the same trade; holding it does not count as a conflict.
    pub async fn has_conflict(
        &self,
        staff_id: Uuid,
        candidate: &Shift,
        shedding: Option<Uuid>,
    ) -> Result<bool> {
        let committed = self
            .schedule
            .committed_shifts_overlapping(staff_id, candidate.start_time, candidate.end_time)
            .await?;

        Ok(committed
            .iter()
            .any(|existing| existing.id != candidate.id && Some(existing.id) != shedding))
    }
}
