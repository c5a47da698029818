use chrono::{DateTime, Utc};

use crate::database::models::{Actor, RequestStatus, RescheduleRequest, StaffRole};
use crate::error::EngineError;
use crate::services::expiry;

/// Actions an actor may take on a reschedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Accept,
    Approve,
    Reject,
    Cancel,
    Delete,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Capability::Accept => 1 << 0,
            Capability::Approve => 1 << 1,
            Capability::Reject => 1 << 2,
            Capability::Cancel => 1 << 3,
            Capability::Delete => 1 << 4,
        }
    }
}

/// The capability set an actor holds over one request at one instant. This is
/// the single place authorization is decided; handlers and the engine never
/// re-derive role checks at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const EMPTY: Capabilities = Capabilities(0);

    pub fn allows(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Computes the full capability set for (actor, request) at `now`.
pub fn capabilities(actor: &Actor, request: &RescheduleRequest, now: DateTime<Utc>) -> Capabilities {
    let mut caps = Capabilities::EMPTY;
    if ensure_can_accept(actor, request, now).is_ok() {
        caps.insert(Capability::Accept);
    }
    if ensure_can_approve(actor, request, now).is_ok() {
        caps.insert(Capability::Approve);
    }
    if ensure_can_reject(actor, request, now).is_ok() {
        caps.insert(Capability::Reject);
    }
    if ensure_can_cancel(actor, request, now).is_ok() {
        caps.insert(Capability::Cancel);
    }
    if ensure_can_delete(actor, request).is_ok() {
        caps.insert(Capability::Delete);
    }
    caps
}

/// Accept: the named target staff member, or for an open giveaway any staff
/// in the request's branch, while the request is PENDING and unexpired.
pub fn ensure_can_accept(
    actor: &Actor,
    request: &RescheduleRequest,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if expiry::is_expired(&request.status, request.expires_at, now) {
        return Err(EngineError::Expired);
    }
    if request.status != RequestStatus::Pending {
        return Err(EngineError::CannotAccept);
    }
    if request.is_open_giveaway() {
        if actor.staff_id == request.requester_staff_id {
            return Err(EngineError::CannotAccept);
        }
        if !actor.in_branch(request.branch_id) {
            return Err(EngineError::BranchAccess);
        }
        return Ok(());
    }
    if request.target_staff_id != Some(actor.staff_id) {
        return Err(EngineError::CannotAccept);
    }
    Ok(())
}

/// Approve: owner/manager role within the request's branch, request PENDING
/// or ACCEPTED with a counterparty bound.
pub fn ensure_can_approve(
    actor: &Actor,
    request: &RescheduleRequest,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if !actor.has_approver_role() {
        return Err(EngineError::ApproverPermission);
    }
    if !actor.in_branch(request.branch_id) {
        return Err(EngineError::ApproverBranch);
    }
    if expiry::is_expired(&request.status, request.expires_at, now) {
        return Err(EngineError::Expired);
    }
    if !request.status.is_actionable() {
        return Err(EngineError::CannotApprove);
    }
    // An open giveaway has nobody to hand the shift to yet.
    if request.target_staff_id.is_none() {
        return Err(EngineError::CannotApprove);
    }
    Ok(())
}

/// Reject: same actor gate as approve; a rejection reason is demanded by the
/// engine, not here.
pub fn ensure_can_reject(
    actor: &Actor,
    request: &RescheduleRequest,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if !actor.has_approver_role() {
        return Err(EngineError::ApproverPermission);
    }
    if !actor.in_branch(request.branch_id) {
        return Err(EngineError::ApproverBranch);
    }
    if expiry::is_expired(&request.status, request.expires_at, now) {
        return Err(EngineError::Expired);
    }
    if !request.status.is_actionable() {
        return Err(EngineError::CannotReject);
    }
    Ok(())
}

/// Cancel: the requester only, while the request is still PENDING or
/// ACCEPTED.
pub fn ensure_can_cancel(
    actor: &Actor,
    request: &RescheduleRequest,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if actor.staff_id != request.requester_staff_id {
        return Err(EngineError::CancelOwnOnly);
    }
    if expiry::is_expired(&request.status, request.expires_at, now) {
        return Err(EngineError::Expired);
    }
    if !request.status.is_actionable() {
        return Err(EngineError::CannotCancel);
    }
    Ok(())
}

/// Delete: terminal requests only; the requester, or an owner with membership
/// in the request's branch.
pub fn ensure_can_delete(actor: &Actor, request: &RescheduleRequest) -> Result<(), EngineError> {
    if !request.status.is_terminal() {
        return Err(EngineError::InvalidStatus);
    }
    if actor.staff_id == request.requester_staff_id {
        return Ok(());
    }
    if actor.role == StaffRole::Owner && actor.in_branch(request.branch_id) {
        return Ok(());
    }
    Err(EngineError::OwnerOnly)
}
