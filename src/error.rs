use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::handlers::shared::ApiResponse;

/// Failure outcomes of the reschedule engine. Each variant carries a stable
/// string code; callers translate codes into user-facing text, the engine
/// never formats prose.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // Validation
    #[error("REASON_REQUIRED")]
    ReasonRequired,
    #[error("REASON_TOO_LONG")]
    ReasonTooLong,
    #[error("INVALID_PRIORITY")]
    InvalidPriority,
    #[error("INVALID_TYPE")]
    InvalidType,
    #[error("EXPIRY_INVALID")]
    ExpiryInvalid,
    #[error("ADVANCE_NOTICE_REQUIRED")]
    AdvanceNoticeRequired,
    #[error("TARGET_STAFF_REQUIRED")]
    TargetStaffRequired,

    // Not found
    #[error("RESCHEDULE_REQUEST_NOT_FOUND")]
    RescheduleRequestNotFound,
    #[error("SHIFT_NOT_FOUND")]
    ShiftNotFound,
    #[error("TARGET_SHIFT_NOT_FOUND")]
    TargetShiftNotFound,
    #[error("TARGET_STAFF_NOT_FOUND")]
    TargetStaffNotFound,

    // Conflict
    #[error("ALREADY_EXISTS")]
    AlreadyExists,
    #[error("CONFLICT_DETECTED")]
    ConflictDetected,

    // Authorization
    #[error("OWNER_ONLY")]
    OwnerOnly,
    #[error("CANCEL_OWN_ONLY")]
    CancelOwnOnly,
    #[error("BRANCH_ACCESS")]
    BranchAccess,
    #[error("APPROVER_PERMISSION")]
    ApproverPermission,
    #[error("APPROVER_BRANCH")]
    ApproverBranch,

    // State
    #[error("INVALID_STATUS")]
    InvalidStatus,
    #[error("CANNOT_ACCEPT")]
    CannotAccept,
    #[error("CANNOT_APPROVE")]
    CannotApprove,
    #[error("CANNOT_REJECT")]
    CannotReject,
    #[error("CANNOT_CANCEL")]
    CannotCancel,
    #[error("EXPIRED")]
    Expired,
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ReasonRequired => "REASON_REQUIRED",
            EngineError::ReasonTooLong => "REASON_TOO_LONG",
            EngineError::InvalidPriority => "INVALID_PRIORITY",
            EngineError::InvalidType => "INVALID_TYPE",
            EngineError::ExpiryInvalid => "EXPIRY_INVALID",
            EngineError::AdvanceNoticeRequired => "ADVANCE_NOTICE_REQUIRED",
            EngineError::TargetStaffRequired => "TARGET_STAFF_REQUIRED",
            EngineError::RescheduleRequestNotFound => "RESCHEDULE_REQUEST_NOT_FOUND",
            EngineError::ShiftNotFound => "SHIFT_NOT_FOUND",
            EngineError::TargetShiftNotFound => "TARGET_SHIFT_NOT_FOUND",
            EngineError::TargetStaffNotFound => "TARGET_STAFF_NOT_FOUND",
            EngineError::AlreadyExists => "ALREADY_EXISTS",
            EngineError::ConflictDetected => "CONFLICT_DETECTED",
            EngineError::OwnerOnly => "OWNER_ONLY",
            EngineError::CancelOwnOnly => "CANCEL_OWN_ONLY",
            EngineError::BranchAccess => "BRANCH_ACCESS",
            EngineError::ApproverPermission => "APPROVER_PERMISSION",
            EngineError::ApproverBranch => "APPROVER_BRANCH",
            EngineError::InvalidStatus => "INVALID_STATUS",
            EngineError::CannotAccept => "CANNOT_ACCEPT",
            EngineError::CannotApprove => "CANNOT_APPROVE",
            EngineError::CannotReject => "CANNOT_REJECT",
            EngineError::CannotCancel => "CANNOT_CANCEL",
            EngineError::Expired => "EXPIRED",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::ReasonRequired
            | EngineError::ReasonTooLong
            | EngineError::InvalidPriority
            | EngineError::InvalidType
            | EngineError::ExpiryInvalid
            | EngineError::AdvanceNoticeRequired
            | EngineError::TargetStaffRequired => StatusCode::BAD_REQUEST,

            EngineError::RescheduleRequestNotFound
            | EngineError::ShiftNotFound
            | EngineError::TargetShiftNotFound
            | EngineError::TargetStaffNotFound => StatusCode::NOT_FOUND,

            EngineError::OwnerOnly
            | EngineError::CancelOwnOnly
            | EngineError::BranchAccess
            | EngineError::ApproverPermission
            | EngineError::ApproverBranch => StatusCode::FORBIDDEN,

            EngineError::AlreadyExists
            | EngineError::ConflictDetected
            | EngineError::InvalidStatus
            | EngineError::CannotAccept
            | EngineError::CannotApprove
            | EngineError::CannotReject
            | EngineError::CannotCancel
            | EngineError::Expired => StatusCode::CONFLICT,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Internal server error{}", .0.as_ref().map_or("".to_string(), |s| format!(": {}", s)))]
    InternalServerError(Option<String>),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Engine(err) => err.status_code(),
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        let response_body = match self {
            AppError::Engine(err) => {
                log::debug!("Request rejected with code {}", err.code());
                ApiResponse::<()>::error_code(err.code())
            }
            other => {
                log::error!("Request failed with status {}: {}", status_code, other);
                ApiResponse::<()>::error(&other.to_string())
            }
        };

        HttpResponse::build(status_code).json(response_body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        log::error!("Database error: {}", error);
        AppError::DatabaseError(error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<EngineError>() {
            Ok(engine_err) => return AppError::Engine(engine_err),
            Err(other) => other,
        };

        let error = match error.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => return AppError::DatabaseError(sqlx_err),
            Err(other) => other,
        };

        log::error!("Internal error: {}", error);
        AppError::InternalServerError(Some(error.to_string()))
    }
}
