use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::database::models::{RescheduleRequest, Shift, SwapType};
use crate::services::schedule::ScheduleService;

/// Calendar collaborator backed by the monolith's own shift tables.
#[derive(Clone)]
pub struct SqliteScheduleService {
    pool: SqlitePool,
}

impl SqliteScheduleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleService for SqliteScheduleService {
    async fn get_shift(&self, id: Uuid) -> Result<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>(
            "SELECT id, branch_id, title, start_time, end_time FROM shifts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    async fn committed_shifts_overlapping(
        &self,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Shift>> {
        // Inclusive boundaries excluded: existing.start < end AND start < existing.end
        let shifts = sqlx::query_as::<_, Shift>(
            r#"
            SELECT
                s.id, s.branch_id, s.title, s.start_time, s.end_time
            FROM
                shifts s
                JOIN shift_assignments sa ON sa.shift_id = s.id
            WHERE
                sa.staff_id = ?
                AND sa.status = 'committed'
                AND s.start_time < ?
                AND ? < s.end_time
            "#,
        )
        .bind(staff_id)
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await?;

        Ok(shifts)
    }

    async fn commit_swap(&self, request: &RescheduleRequest) -> Result<()> {
        let taker = request
            .target_staff_id
            .context("approved request has no target staff bound")?;

        let mut tx = self.pool.begin().await?;

        // The taker picks up the source shift from the requester.
        sqlx::query(
            "UPDATE shift_assignments SET staff_id = ? WHERE shift_id = ? AND staff_id = ?",
        )
        .bind(taker)
        .bind(request.source_shift_id)
        .bind(request.requester_staff_id)
        .execute(&mut *tx)
        .await?;

        // A reciprocal SWAP hands the target shift back to the requester.
        if request.swap_type == SwapType::Swap {
            if let Some(target_shift_id) = request.target_shift_id {
                sqlx::query(
                    "UPDATE shift_assignments SET staff_id = ? WHERE shift_id = ? AND staff_id = ?",
                )
                .bind(request.requester_staff_id)
                .bind(target_shift_id)
                .bind(taker)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
