use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{RefundRequest, RefundStatus},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct RefundDto {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reason: String,
    pub requested_amount_cents: i64,
    pub status: RefundStatus,
    pub refunded_amount_cents: Option<i64>,
    pub admin_notes: Option<String>,
}

impl From<RefundRequest> for RefundDto {
    fn from(request: RefundRequest) -> Self {
        Self {
            id: request.id,
            payment_id: request.payment_id,
            reason: request.reason,
            requested_amount_cents: request.requested_amount_cents,
            status: request.status,
            refunded_amount_cents: request.refunded_amount_cents,
            admin_notes: request.admin_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestRefundDto {
    pub payment_id: Uuid,
    pub requested_amount_cents: i64,
    pub reason: String,
}

pub async fn request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<RequestRefundDto>,
) -> Result<(StatusCode, Json<RefundDto>)> {
    let refund = state
        .service_context
        .refund_service
        .request_refund(
            user.actor,
            dto.payment_id,
            dto.requested_amount_cents,
            dto.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(refund.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundDto>> {
    let refund = state
        .service_context
        .refund_service
        .get(id, user.actor)
        .await?;
    Ok(Json(refund.into()))
}

#[derive(Debug, Serialize)]
pub struct RefundListResponse {
    pub refunds: Vec<RefundDto>,
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<RefundListResponse>> {
    let refunds = state.service_context.refund_service.list_pending().await?;
    Ok(Json(RefundListResponse {
        refunds: refunds.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReviewDto {
    pub approve: bool,
    pub admin_notes: Option<String>,
}

pub async fn review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<ReviewDto>,
) -> Result<Json<RefundDto>> {
    let refund = state
        .service_context
        .refund_service
        .review(id, user.actor, dto.approve, dto.admin_notes)
        .await?;
    Ok(Json(refund.into()))
}
