use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, sqlite::SqlitePool};
use uuid::Uuid;

use crate::database::models::{
    Page, RequestStatus, RescheduleFilter, RescheduleInput, RescheduleRequest, Sort,
    TransitionChange,
};

const ALL_COLUMNS: &str = "id, requester_staff_id, target_staff_id, branch_id, swap_type, \
     source_shift_id, target_shift_id, reason, priority, status, expires_at, \
     accepted_by, accepted_at, approved_by, approved_at, rejected_by, rejected_at, \
     rejection_reason, cancelled_at, conflict_detected, version, created_at, updated_at";

/// Durable store for reschedule requests. Holds no business logic; the one
/// guarantee it provides is the compare-and-swap in `commit_transition`, which
/// serializes concurrent writers of the same request.
#[derive(Clone)]
pub struct RescheduleRepository {
    pool: SqlitePool,
}

impl RescheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        branch_id: Uuid,
        requester_staff_id: Uuid,
        input: &RescheduleInput,
    ) -> Result<RescheduleRequest, sqlx::Error> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let request = sqlx::query_as::<_, RescheduleRequest>(&format!(
            r#"
            INSERT INTO
                reschedule_requests (
                    id,
                    requester_staff_id,
                    target_staff_id,
                    branch_id,
                    swap_type,
                    source_shift_id,
                    target_shift_id,
                    reason,
                    priority,
                    status,
                    expires_at,
                    conflict_detected,
                    version,
                    created_at,
                    updated_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?, ?)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(requester_staff_id)
        .bind(input.target_staff_id)
        .bind(branch_id)
        .bind(input.swap_type.clone())
        .bind(input.source_shift_id)
        .bind(input.target_shift_id)
        .bind(input.reason.clone())
        .bind(input.priority.clone())
        .bind(RequestStatus::Pending)
        .bind(input.expires_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RescheduleRequest>> {
        let request = sqlx::query_as::<_, RescheduleRequest>(&format!(
            "SELECT {ALL_COLUMNS} FROM reschedule_requests WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Whether a non-terminal request already holds the source shift. The
    /// partial unique index backs this up at commit time.
    pub async fn has_open_for_shift(&self, source_shift_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reschedule_requests
            WHERE source_shift_id = ? AND status IN ('pending', 'accepted')
            "#,
        )
        .bind(source_shift_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn list(
        &self,
        filter: &RescheduleFilter,
        page: Page,
        sort: &Sort,
    ) -> Result<Vec<RescheduleRequest>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ALL_COLUMNS} FROM reschedule_requests WHERE 1 = 1"
        ));

        if let Some(staff_id) = filter.staff_id {
            query
                .push(" AND (requester_staff_id = ")
                .push_bind(staff_id)
                .push(" OR target_staff_id = ")
                .push_bind(staff_id)
                .push(")");
        }
        if !filter.branch_ids.is_empty() {
            query.push(" AND branch_id IN (");
            let mut separated = query.separated(", ");
            for branch_id in &filter.branch_ids {
                separated.push_bind(*branch_id);
            }
            query.push(")");
        }
        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.clone());
        } else if !filter.include_expired {
            query
                .push(" AND status != ")
                .push_bind(RequestStatus::Expired);
        }
        if let Some(swap_type) = &filter.swap_type {
            query.push(" AND swap_type = ").push_bind(swap_type.clone());
        }
        if let Some(priority) = &filter.priority {
            query.push(" AND priority = ").push_bind(priority.clone());
        }
        if let Some(after) = filter.created_after {
            query.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at <= ").push_bind(before);
        }

        query.push(" ORDER BY ");
        query.push(sort.key.as_str());
        query.push(if sort.descending { " DESC" } else { " ASC" });
        query
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let requests = query
            .build_query_as::<RescheduleRequest>()
            .fetch_all(&self.pool)
            .await?;

        Ok(requests)
    }

    /// Compare-and-swap commit of one transition. Returns `None` when
    /// `expected_version` is stale — the caller lost the race and nothing was
    /// written. Set-once fields go through COALESCE so earlier transitions'
    /// values survive.
    pub async fn commit_transition(
        &self,
        id: Uuid,
        expected_version: i64,
        change: &TransitionChange,
    ) -> Result<Option<RescheduleRequest>> {
        let now = Utc::now();

        let request = sqlx::query_as::<_, RescheduleRequest>(&format!(
            r#"
            UPDATE
                reschedule_requests
            SET
                status = ?,
                target_staff_id = COALESCE(?, target_staff_id),
                accepted_by = COALESCE(?, accepted_by),
                accepted_at = COALESCE(?, accepted_at),
                approved_by = COALESCE(?, approved_by),
                approved_at = COALESCE(?, approved_at),
                rejected_by = COALESCE(?, rejected_by),
                rejected_at = COALESCE(?, rejected_at),
                rejection_reason = COALESCE(?, rejection_reason),
                cancelled_at = COALESCE(?, cancelled_at),
                conflict_detected = COALESCE(?, conflict_detected),
                version = version + 1,
                updated_at = ?
            WHERE
                id = ? AND version = ?
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(change.status.clone())
        .bind(change.target_staff_id)
        .bind(change.accepted_by)
        .bind(change.accepted_at)
        .bind(change.approved_by)
        .bind(change.approved_at)
        .bind(change.rejected_by)
        .bind(change.rejected_at)
        .bind(change.rejection_reason.clone())
        .bind(change.cancelled_at)
        .bind(change.conflict_detected)
        .bind(now)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Non-terminal requests whose window has lapsed, for the periodic sweep.
    pub async fn find_stale(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RescheduleRequest>> {
        let requests = sqlx::query_as::<_, RescheduleRequest>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM reschedule_requests
            WHERE status IN ('pending', 'accepted') AND expires_at < ?
            ORDER BY expires_at ASC
            LIMIT ?
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    /// Hard delete. Restricted to terminal requests by the engine; the store
    /// itself just removes the row.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reschedule_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
