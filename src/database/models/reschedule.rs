use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::macros::string_enum;

/// A shift reschedule/swap request. The `version` column is the
/// compare-and-swap token: every committed transition increments it, and a
/// transition submitted against a stale version loses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub id: Uuid,
    pub requester_staff_id: Uuid,
    pub target_staff_id: Option<Uuid>,
    pub branch_id: Uuid,
    #[serde(rename = "type")]
    pub swap_type: SwapType,
    pub source_shift_id: Uuid,
    pub target_shift_id: Option<Uuid>,
    pub reason: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub conflict_detected: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RescheduleRequest {
    /// An open giveaway has no target bound yet; any eligible staff in the
    /// branch may accept it.
    pub fn is_open_giveaway(&self) -> bool {
        self.swap_type == SwapType::Giveaway && self.target_staff_id.is_none()
    }

    pub fn involves(&self, staff_id: Uuid) -> bool {
        self.requester_staff_id == staff_id || self.target_staff_id == Some(staff_id)
    }
}

string_enum! {
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum SwapType {
        Swap => "swap",                   // trade with a named staff member
        Giveaway => "giveaway",           // shed a shift, open to the branch
        CoverRequest => "cover_request",  // named staff covers, no trade back
    }
}

string_enum! {
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum RequestPriority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

string_enum! {
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "snake_case")]
    pub enum RequestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Approved => "approved",
        Completed => "completed",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Expired => "expired",
    }
}

impl RequestStatus {
    /// Terminal states admit no further transitions. APPROVED is not terminal:
    /// the calendar service's confirmation still moves it to COMPLETED.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed
                | RequestStatus::Rejected
                | RequestStatus::Cancelled
                | RequestStatus::Expired
        )
    }

    /// PENDING or ACCEPTED: still open to accept/approve/reject/cancel.
    pub fn is_actionable(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Accepted)
    }
}

/// Validated input for creating a request. Enum fields are already parsed at
/// the HTTP boundary; the engine performs the remaining validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleInput {
    pub source_shift_id: Uuid,
    pub target_staff_id: Option<Uuid>,
    pub target_shift_id: Option<Uuid>,
    pub swap_type: SwapType,
    pub priority: RequestPriority,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

/// Field mutation applied by a single state transition. Set-once fields are
/// `None` when untouched; the store writes them through COALESCE so an earlier
/// transition's values are never clobbered.
#[derive(Debug, Clone)]
pub struct TransitionChange {
    pub status: RequestStatus,
    pub target_staff_id: Option<Uuid>,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub conflict_detected: Option<bool>,
}

impl TransitionChange {
    fn bare(status: RequestStatus) -> Self {
        Self {
            status,
            target_staff_id: None,
            accepted_by: None,
            accepted_at: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            cancelled_at: None,
            conflict_detected: None,
        }
    }

    /// Initial PENDING state, used only for the creation event snapshot.
    pub fn created() -> Self {
        Self::bare(RequestStatus::Pending)
    }

    /// PENDING -> ACCEPTED. Binds the target staff when the request was an
    /// open giveaway.
    pub fn accepted(by: Uuid, bind_target: bool, at: DateTime<Utc>) -> Self {
        Self {
            target_staff_id: bind_target.then_some(by),
            accepted_by: Some(by),
            accepted_at: Some(at),
            conflict_detected: Some(false),
            ..Self::bare(RequestStatus::Accepted)
        }
    }

    pub fn approved(by: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            approved_by: Some(by),
            approved_at: Some(at),
            conflict_detected: Some(false),
            ..Self::bare(RequestStatus::Approved)
        }
    }

    pub fn completed() -> Self {
        Self::bare(RequestStatus::Completed)
    }

    pub fn rejected(by: Uuid, reason: String, at: DateTime<Utc>) -> Self {
        Self {
            rejected_by: Some(by),
            rejected_at: Some(at),
            rejection_reason: Some(reason),
            ..Self::bare(RequestStatus::Rejected)
        }
    }

    pub fn cancelled(at: DateTime<Utc>) -> Self {
        Self {
            cancelled_at: Some(at),
            ..Self::bare(RequestStatus::Cancelled)
        }
    }

    pub fn expired() -> Self {
        Self::bare(RequestStatus::Expired)
    }

    /// Records a failed conflict check without moving the status.
    pub fn conflict_flagged(current: RequestStatus) -> Self {
        Self {
            conflict_detected: Some(true),
            ..Self::bare(current)
        }
    }

    /// Wire names of the fields this change touches, for the event snapshot.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["status"];
        if self.target_staff_id.is_some() {
            fields.push("targetStaffId");
        }
        if self.accepted_by.is_some() {
            fields.push("acceptedBy");
            fields.push("acceptedAt");
        }
        if self.approved_by.is_some() {
            fields.push("approvedBy");
            fields.push("approvedAt");
        }
        if self.rejected_by.is_some() {
            fields.push("rejectedBy");
            fields.push("rejectedAt");
            fields.push("rejectionReason");
        }
        if self.cancelled_at.is_some() {
            fields.push("cancelledAt");
        }
        if self.conflict_detected.is_some() {
            fields.push("conflictDetected");
        }
        fields
    }
}

/// Filters for the list queries. An empty `branch_ids` means no branch
/// restriction; `staff_id` matches requester or target involvement.
#[derive(Debug, Clone, Default)]
pub struct RescheduleFilter {
    pub staff_id: Option<Uuid>,
    pub branch_ids: Vec<Uuid>,
    pub status: Option<RequestStatus>,
    pub swap_type: Option<SwapType>,
    pub priority: Option<RequestPriority>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub include_expired: bool,
}

string_enum! {
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "snake_case")]
    pub enum SortKey {
        CreatedAt => "created_at",
        ExpiresAt => "expires_at",
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
