use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateBookingRequest, Payment, PaymentStatus, SavedPaymentMethod},
    error::Result,
};

use super::bookings::BookingDto;

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub hourly_rate_cents: i64,
    pub duration_hours: f64,
    pub platform_fee_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<String>,
}

impl From<Payment> for PaymentDto {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            booking_id: payment.booking_id,
            amount_cents: payment.amount_cents,
            hourly_rate_cents: payment.hourly_rate_cents,
            duration_hours: payment.duration_hours,
            platform_fee_cents: payment.platform_fee_cents,
            status: payment.status,
            paid_at: payment.paid_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentOutcomeResponse {
    pub booking: BookingDto,
    pub payment: PaymentDto,
}

#[derive(Debug, Deserialize)]
pub struct PayBookingDto {
    /// Tokenised provider method id, or a saved method's UUID.
    pub payment_method: String,
}

async fn resolve_method(
    state: &AppState,
    user: &CurrentUser,
    payment_method: &str,
) -> Result<String> {
    // A saved method's UUID resolves to its provider token; anything else
    // is passed through as a provider-tokenised identifier.
    if let Ok(method_id) = Uuid::parse_str(payment_method) {
        let methods = state
            .service_context
            .payment_service
            .list_methods(user.actor)
            .await?;
        if let Some(saved) = methods.into_iter().find(|m| m.id == method_id) {
            return Ok(saved.provider_method_id);
        }
    }
    Ok(payment_method.to_string())
}

pub async fn pay_booking(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(booking_id): Path<Uuid>,
    Json(dto): Json<PayBookingDto>,
) -> Result<Json<PaymentOutcomeResponse>> {
    let method = resolve_method(&state, &user, &dto.payment_method).await?;
    let (booking, payment) = state
        .service_context
        .payment_service
        .pay_booking(user.actor, booking_id, method)
        .await?;
    Ok(Json(PaymentOutcomeResponse {
        booking: booking.into(),
        payment: payment.into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct BookAndPayDto {
    pub gig_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub payment_method: String,
}

pub async fn book_and_pay(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<BookAndPayDto>,
) -> Result<(StatusCode, Json<PaymentOutcomeResponse>)> {
    let method = resolve_method(&state, &user, &dto.payment_method).await?;
    let (booking, payment) = state
        .service_context
        .payment_service
        .book_and_pay(
            user.actor,
            CreateBookingRequest {
                gig_id: dto.gig_id,
                start_time: dto.start_time,
                end_time: dto.end_time,
                notes: dto.notes,
            },
            method,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PaymentOutcomeResponse {
            booking: booking.into(),
            payment: payment.into(),
        }),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentDto>> {
    let payment = state
        .service_context
        .payment_service
        .get_payment(id, user.actor)
        .await?;
    Ok(Json(payment.into()))
}

#[derive(Debug, Deserialize)]
pub struct SaveMethodDto {
    pub method_token: String,
    #[serde(default)]
    pub make_default: bool,
}

#[derive(Debug, Serialize)]
pub struct MethodListResponse {
    pub methods: Vec<SavedPaymentMethod>,
}

pub async fn save_method(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<SaveMethodDto>,
) -> Result<(StatusCode, Json<SavedPaymentMethod>)> {
    let method = state
        .service_context
        .payment_service
        .save_method(user.actor, dto.method_token, dto.make_default)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn list_methods(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MethodListResponse>> {
    let methods = state
        .service_context
        .payment_service
        .list_methods(user.actor)
        .await?;
    Ok(Json(MethodListResponse { methods }))
}

pub async fn set_default_method(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedPaymentMethod>> {
    let method = state
        .service_context
        .payment_service
        .set_default_method(user.actor, id)
        .await?;
    Ok(Json(method))
}
