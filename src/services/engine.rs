use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{
    Actor, Page, RequestStatus, RescheduleFilter, RescheduleInput, RescheduleRequest, Sort,
    SwapType, TransitionChange,
};
use crate::database::repositories::RescheduleRepository;
use crate::error::{AppError, EngineError};
use crate::services::authorization;
use crate::services::conflict::ConflictDetector;
use crate::services::directory::StaffDirectory;
use crate::services::expiry;
use crate::services::notifications::NotificationHub;
use crate::services::schedule::ScheduleService;

pub const MAX_REASON_LEN: usize = 500;

const SWEEP_BATCH: i64 = 100;

/// Which edge a caller attempted, for mapping a lost compare-and-swap race to
/// its specific error code.
#[derive(Debug, Clone, Copy)]
enum Attempt {
    Accept,
    Approve,
    Reject,
    Cancel,
}

/// The transition executor: validates every requested edge against the
/// current state, the authorization guard, and a fresh conflict check, then
/// commits it atomically through the store's compare-and-swap. Exactly one
/// concurrent writer wins; everyone else gets a typed state error and no
/// partial effect.
#[derive(Clone)]
pub struct RescheduleEngine {
    repo: RescheduleRepository,
    directory: Arc<dyn StaffDirectory>,
    schedule: Arc<dyn ScheduleService>,
    conflicts: ConflictDetector,
    hub: NotificationHub,
    min_advance_notice: Duration,
}

impl RescheduleEngine {
    pub fn new(
        repo: RescheduleRepository,
        directory: Arc<dyn StaffDirectory>,
        schedule: Arc<dyn ScheduleService>,
        hub: NotificationHub,
        min_advance_notice_hours: i64,
    ) -> Self {
        Self {
            repo,
            directory,
            conflicts: ConflictDetector::new(schedule.clone()),
            schedule,
            hub,
            min_advance_notice: Duration::hours(min_advance_notice_hours),
        }
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Opens a new request in PENDING. Validation short-circuits before any
    /// state is written.
    pub async fn create(
        &self,
        actor: &Actor,
        input: RescheduleInput,
    ) -> Result<RescheduleRequest, AppError> {
        let now = Utc::now();

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(EngineError::ReasonRequired.into());
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(EngineError::ReasonTooLong.into());
        }

        let source_shift = self
            .schedule
            .get_shift(input.source_shift_id)
            .await?
            .ok_or(EngineError::ShiftNotFound)?;
        let branch_id = source_shift.branch_id;

        if !actor.in_branch(branch_id) {
            return Err(EngineError::BranchAccess.into());
        }
        if source_shift.start_time - now < self.min_advance_notice {
            return Err(EngineError::AdvanceNoticeRequired.into());
        }
        if input.expires_at <= now || input.expires_at > source_shift.start_time {
            return Err(EngineError::ExpiryInvalid.into());
        }

        match input.swap_type {
            SwapType::Swap | SwapType::CoverRequest => {
                if input.target_staff_id.is_none() {
                    return Err(EngineError::TargetStaffRequired.into());
                }
            }
            SwapType::Giveaway => {}
        }
        if let Some(target_staff_id) = input.target_staff_id {
            self.directory
                .get_staff(target_staff_id)
                .await?
                .ok_or(EngineError::TargetStaffNotFound)?;
        }
        if let Some(target_shift_id) = input.target_shift_id {
            self.schedule
                .get_shift(target_shift_id)
                .await?
                .ok_or(EngineError::TargetShiftNotFound)?;
        }

        if self.repo.has_open_for_shift(input.source_shift_id).await? {
            return Err(EngineError::AlreadyExists.into());
        }

        let request = match self.repo.create(branch_id, actor.staff_id, &input).await {
            Ok(request) => request,
            // the partial unique index catches a racing creator
            Err(err) if is_unique_violation(&err) => {
                return Err(EngineError::AlreadyExists.into());
            }
            Err(err) => return Err(err.into()),
        };

        self.notify(&request, &TransitionChange::created()).await;
        Ok(request)
    }

    /// Fetches a request, force-expiring it first when its window has lapsed.
    /// Every engine operation goes through this, so expiry always precedes
    /// the requested action.
    async fn load_fresh(&self, id: Uuid) -> Result<RescheduleRequest, AppError> {
        let request = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(EngineError::RescheduleRequestNotFound)?;

        if !expiry::is_expired(&request.status, request.expires_at, Utc::now()) {
            return Ok(request);
        }

        let change = TransitionChange::expired();
        match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(expired) => {
                self.notify(&expired, &change).await;
                Ok(expired)
            }
            // someone else transitioned it in the meantime; their result stands
            None => self
                .repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| EngineError::RescheduleRequestNotFound.into()),
        }
    }

    /// A single request, visible to involved parties and branch approvers.
    pub async fn get_request(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<RescheduleRequest, AppError> {
        let request = self.load_fresh(id).await?;

        let is_branch_approver = actor.has_approver_role() && actor.in_branch(request.branch_id);
        if !request.involves(actor.staff_id) && !is_branch_approver {
            return Err(EngineError::BranchAccess.into());
        }
        Ok(request)
    }

    /// PENDING -> ACCEPTED by the target staff member (or any branch staff
    /// for an open giveaway), with a fresh conflict check first.
    pub async fn accept(&self, actor: &Actor, id: Uuid) -> Result<RescheduleRequest, AppError> {
        let now = Utc::now();
        let request = self.load_fresh(id).await?;
        if request.status == RequestStatus::Expired {
            return Err(EngineError::Expired.into());
        }
        authorization::ensure_can_accept(actor, &request, now)?;

        let source_shift = self
            .schedule
            .get_shift(request.source_shift_id)
            .await?
            .ok_or(EngineError::ShiftNotFound)?;

        // The acceptor takes over the source shift; in a reciprocal swap they
        // shed the target shift at the same time.
        if self
            .conflicts
            .has_conflict(actor.staff_id, &source_shift, request.target_shift_id)
            .await?
        {
            self.flag_conflict(&request).await;
            return Err(EngineError::ConflictDetected.into());
        }

        let change = TransitionChange::accepted(actor.staff_id, request.is_open_giveaway(), now);
        match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(updated) => {
                self.notify(&updated, &change).await;
                Ok(updated)
            }
            None => Err(self.stale_error(id, Attempt::Accept).await),
        }
    }

    /// {PENDING, ACCEPTED} -> APPROVED by a branch approver. Re-runs the
    /// conflict check — the committed schedule may have drifted since accept
    /// — then signals the calendar service to commit the actual swap. The
    /// calendar's confirmation drives APPROVED -> COMPLETED.
    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<RescheduleRequest, AppError> {
        let now = Utc::now();
        let request = self.load_fresh(id).await?;
        if request.status == RequestStatus::Expired {
            return Err(EngineError::Expired.into());
        }
        authorization::ensure_can_approve(actor, &request, now)?;

        let taker = request
            .target_staff_id
            .ok_or(EngineError::CannotApprove)?;
        let source_shift = self
            .schedule
            .get_shift(request.source_shift_id)
            .await?
            .ok_or(EngineError::ShiftNotFound)?;

        if self
            .conflicts
            .has_conflict(taker, &source_shift, request.target_shift_id)
            .await?
        {
            self.flag_conflict(&request).await;
            return Err(EngineError::ConflictDetected.into());
        }
        if let Some(target_shift_id) = request.target_shift_id {
            let target_shift = self
                .schedule
                .get_shift(target_shift_id)
                .await?
                .ok_or(EngineError::TargetShiftNotFound)?;
            if self
                .conflicts
                .has_conflict(
                    request.requester_staff_id,
                    &target_shift,
                    Some(request.source_shift_id),
                )
                .await?
            {
                self.flag_conflict(&request).await;
                return Err(EngineError::ConflictDetected.into());
            }
        }

        let change = TransitionChange::approved(actor.staff_id, now);
        let approved = match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(updated) => updated,
            None => return Err(self.stale_error(id, Attempt::Approve).await),
        };
        self.notify(&approved, &change).await;

        match self.schedule.commit_swap(&approved).await {
            Ok(()) => {
                if let Err(err) = self.confirm_completed(approved.id).await {
                    log::warn!(
                        "calendar confirmed swap for request {} but completion was not recorded: {}",
                        approved.id,
                        err
                    );
                }
            }
            Err(err) => {
                log::error!(
                    "calendar swap commit failed for request {}: {:#}",
                    approved.id,
                    err
                );
            }
        }

        Ok(approved)
    }

    /// APPROVED -> COMPLETED, on the calendar service's confirmation that the
    /// swap took effect on the actual assignments.
    pub async fn confirm_completed(&self, id: Uuid) -> Result<RescheduleRequest, AppError> {
        let request = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(EngineError::RescheduleRequestNotFound)?;
        if request.status != RequestStatus::Approved {
            return Err(EngineError::InvalidStatus.into());
        }

        let change = TransitionChange::completed();
        match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(updated) => {
                self.notify(&updated, &change).await;
                Ok(updated)
            }
            None => Err(EngineError::InvalidStatus.into()),
        }
    }

    /// Any non-terminal state -> REJECTED by a branch approver; a rejection
    /// reason is mandatory. No conflict check.
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: &str,
    ) -> Result<RescheduleRequest, AppError> {
        let now = Utc::now();
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::ReasonRequired.into());
        }

        let request = self.load_fresh(id).await?;
        if request.status == RequestStatus::Expired {
            return Err(EngineError::Expired.into());
        }
        authorization::ensure_can_reject(actor, &request, now)?;

        let change = TransitionChange::rejected(actor.staff_id, reason.to_string(), now);
        match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(updated) => {
                self.notify(&updated, &change).await;
                Ok(updated)
            }
            None => Err(self.stale_error(id, Attempt::Reject).await),
        }
    }

    /// Any non-terminal state -> CANCELLED, by the requester only.
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<RescheduleRequest, AppError> {
        let now = Utc::now();
        let request = self.load_fresh(id).await?;
        if request.status == RequestStatus::Expired {
            return Err(EngineError::Expired.into());
        }
        authorization::ensure_can_cancel(actor, &request, now)?;

        let change = TransitionChange::cancelled(now);
        match self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await?
        {
            Some(updated) => {
                self.notify(&updated, &change).await;
                Ok(updated)
            }
            None => Err(self.stale_error(id, Attempt::Cancel).await),
        }
    }

    /// Hard delete of a terminal request, by the requester or a branch owner.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let request = self.load_fresh(id).await?;
        authorization::ensure_can_delete(actor, &request)?;
        self.repo.delete(id).await?;
        Ok(())
    }

    /// The requester's own requests, newest first by default.
    pub async fn list_my_requests(
        &self,
        actor: &Actor,
        mut filter: RescheduleFilter,
        page: Page,
        sort: &Sort,
    ) -> Result<Vec<RescheduleRequest>, AppError> {
        filter.staff_id = Some(actor.staff_id);
        filter.branch_ids.clear();
        Ok(self.repo.list(&filter, page, sort).await?)
    }

    /// Branch-scoped queue for approvers. A requested branch outside the
    /// actor's memberships is refused; with no branch given, all of the
    /// actor's branches are in scope.
    pub async fn list_for_approval(
        &self,
        actor: &Actor,
        mut filter: RescheduleFilter,
        page: Page,
        sort: &Sort,
    ) -> Result<Vec<RescheduleRequest>, AppError> {
        if !actor.has_approver_role() {
            return Err(EngineError::ApproverPermission.into());
        }
        if filter.branch_ids.is_empty() {
            filter.branch_ids = actor.branch_ids.clone();
        } else if filter.branch_ids.iter().any(|b| !actor.in_branch(*b)) {
            return Err(EngineError::ApproverBranch.into());
        }
        filter.staff_id = None;
        Ok(self.repo.list(&filter, page, sort).await?)
    }

    /// Proactively converts lapsed requests to EXPIRED so list views do not
    /// wait for an access attempt. Returns how many were expired; requests
    /// that raced with a concurrent transition are skipped.
    pub async fn sweep_expired(&self) -> Result<usize, AppError> {
        let now = Utc::now();
        let stale = self.repo.find_stale(now, SWEEP_BATCH).await?;

        let mut expired = 0;
        for request in stale {
            let change = TransitionChange::expired();
            if let Some(updated) = self
                .repo
                .commit_transition(request.id, request.version, &change)
                .await?
            {
                self.notify(&updated, &change).await;
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Records a failed conflict check on the request without moving its
    /// status. Best-effort; losing this CAS only loses the flag.
    async fn flag_conflict(&self, request: &RescheduleRequest) {
        let change = TransitionChange::conflict_flagged(request.status.clone());
        if let Err(err) = self
            .repo
            .commit_transition(request.id, request.version, &change)
            .await
        {
            log::warn!(
                "could not record conflict flag on request {}: {:#}",
                request.id,
                err
            );
        }
    }

    /// Fan-out after a committed transition. Never fails the commit path.
    async fn notify(&self, request: &RescheduleRequest, change: &TransitionChange) {
        let approvers = match self.directory.approvers_for_branch(request.branch_id).await {
            Ok(approvers) => approvers,
            Err(err) => {
                log::warn!(
                    "approver lookup failed for branch {}; notifying direct parties only: {:#}",
                    request.branch_id,
                    err
                );
                Vec::new()
            }
        };
        self.hub
            .publish(NotificationHub::fan_out(request, change, &approvers));
    }

    /// Maps a lost compare-and-swap to the error the caller should see, based
    /// on where the request actually ended up.
    async fn stale_error(&self, id: Uuid, attempted: Attempt) -> AppError {
        let current = match self.repo.find_by_id(id).await {
            Ok(Some(current)) => current,
            Ok(None) => return EngineError::RescheduleRequestNotFound.into(),
            Err(err) => return err.into(),
        };

        let err = if current.status == RequestStatus::Expired {
            EngineError::Expired
        } else {
            match attempted {
                Attempt::Accept if current.status != RequestStatus::Pending => {
                    EngineError::CannotAccept
                }
                Attempt::Approve if !current.status.is_actionable() => EngineError::CannotApprove,
                Attempt::Reject if !current.status.is_actionable() => EngineError::CannotReject,
                Attempt::Cancel if !current.status.is_actionable() => EngineError::CannotCancel,
                _ => EngineError::InvalidStatus,
            }
        };
        err.into()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
