use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::database::models::{
    Page, RequestPriority, RequestStatus, RescheduleFilter, RescheduleInput, Sort, SortKey,
    SwapType,
};
use crate::error::{AppError, EngineError};
use crate::handlers::shared::ApiResponse;
use crate::services::auth::Claims;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRescheduleBody {
    pub source_shift_id: Uuid,
    pub target_staff_id: Option<Uuid>,
    pub target_shift_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub swap_type: String,
    pub priority: Option<String>,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub swap_type: Option<String>,
    pub priority: Option<String>,
    pub branch_id: Option<Uuid>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub include_expired: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

impl RescheduleQuery {
    /// Query-string enums are parsed here so bad values surface as the
    /// validation codes, before any state is read.
    fn filter(&self) -> Result<RescheduleFilter, AppError> {
        let status = match &self.status {
            Some(raw) => Some(
                raw.parse::<RequestStatus>()
                    .map_err(|_| EngineError::InvalidStatus)?,
            ),
            None => None,
        };
        let swap_type = match &self.swap_type {
            Some(raw) => Some(
                raw.parse::<SwapType>()
                    .map_err(|_| EngineError::InvalidType)?,
            ),
            None => None,
        };
        let priority = match &self.priority {
            Some(raw) => Some(
                raw.parse::<RequestPriority>()
                    .map_err(|_| EngineError::InvalidPriority)?,
            ),
            None => None,
        };

        Ok(RescheduleFilter {
            staff_id: None,
            branch_ids: self.branch_id.into_iter().collect(),
            status,
            swap_type,
            priority,
            created_after: self.created_after,
            created_before: self.created_before,
            include_expired: self.include_expired.unwrap_or(false),
        })
    }

    fn page(&self) -> Page {
        let default = Page::default();
        Page {
            limit: self.limit.unwrap_or(default.limit).clamp(1, 200),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }

    fn sort(&self) -> Sort {
        let key = self
            .sort_by
            .as_deref()
            .and_then(|raw| raw.parse::<SortKey>().ok())
            .unwrap_or(SortKey::CreatedAt);
        let descending = !matches!(self.order.as_deref(), Some("asc"));
        Sort { key, descending }
    }
}

/// Create a new reschedule request
pub async fn create_request(
    claims: Claims,
    state: web::Data<AppState>,
    body: web::Json<CreateRescheduleBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let swap_type = body
        .swap_type
        .parse::<SwapType>()
        .map_err(|_| EngineError::InvalidType)?;
    let priority = match &body.priority {
        Some(raw) => raw
            .parse::<RequestPriority>()
            .map_err(|_| EngineError::InvalidPriority)?,
        None => RequestPriority::Normal,
    };

    let input = RescheduleInput {
        source_shift_id: body.source_shift_id,
        target_staff_id: body.target_staff_id,
        target_shift_id: body.target_shift_id,
        swap_type,
        priority,
        reason: body.reason,
        expires_at: body.expires_at,
    };

    let request = state.engine.create(&claims.actor(), input).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(request)))
}

/// Requests the acting staff member is involved in
pub async fn list_my_requests(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<RescheduleQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.filter()?;
    let requests = state
        .engine
        .list_my_requests(&claims.actor(), filter, query.page(), &query.sort())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(requests)))
}

/// Branch-scoped approval queue (owners/managers only)
pub async fn list_for_approval(
    claims: Claims,
    state: web::Data<AppState>,
    query: web::Query<RescheduleQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.filter()?;
    let requests = state
        .engine
        .list_for_approval(&claims.actor(), filter, query.page(), &query.sort())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(requests)))
}

/// Fetch a single request
pub async fn get_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .engine
        .get_request(&claims.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(request)))
}

/// Accept a pending request
pub async fn accept_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .engine
        .accept(&claims.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(request)))
}

/// Approve a request (owners/managers of the branch only)
pub async fn approve_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .engine
        .approve(&claims.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(request)))
}

/// Reject a request with a reason (owners/managers of the branch only)
pub async fn reject_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RejectBody>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .engine
        .reject(&claims.actor(), path.into_inner(), &body.reason)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(request)))
}

/// Cancel one's own request
pub async fn cancel_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let request = state
        .engine
        .cancel(&claims.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(request)))
}

/// Hard-delete a terminal request
pub async fn delete_request(
    claims: Claims,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    state
        .engine
        .delete(&claims.actor(), path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
        None,
        "Reschedule request deleted",
    )))
}
