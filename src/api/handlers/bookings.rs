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
    domain::{
        Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest, MeetingHandle,
        RescheduleOutcome, RescheduleState, UserRole,
    },
    error::Result,
    service::RescheduleAction,
};

#[derive(Debug, Serialize)]
pub struct BookingDto {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub gig_id: Uuid,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: f64,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    pub reschedule: RescheduleState,
    pub previous_reschedule: RescheduleOutcome,
    pub meeting: Option<MeetingHandle>,
    pub cancellation_reason: Option<String>,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            student_id: booking.student_id,
            teacher_id: booking.teacher_id,
            gig_id: booking.gig_id,
            start_time: booking.start_time.to_rfc3339(),
            end_time: booking.end_time.to_rfc3339(),
            duration_hours: booking.duration_hours,
            status: booking.status,
            payment_status: booking.payment_status,
            reschedule: booking.reschedule,
            previous_reschedule: booking.previous_reschedule,
            meeting: booking.meeting,
            cancellation_reason: booking.cancellation_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingDto>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingDto {
    pub gig_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<CreateBookingDto>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let booking = state
        .service_context
        .booking_service
        .create(
            user.actor,
            CreateBookingRequest {
                gig_id: dto.gig_id,
                start_time: dto.start_time,
                end_time: dto.end_time,
                notes: dto.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .get(id, user.actor)
        .await?;
    Ok(Json(booking.into()))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<BookingListResponse>> {
    let bookings = match user.actor.role {
        UserRole::Teacher => {
            state
                .service_context
                .booking_service
                .list_for_teacher(user.actor.id)
                .await?
        }
        _ => {
            state
                .service_context
                .booking_service
                .list_for_student(user.actor.id)
                .await?
        }
    };
    Ok(Json(BookingListResponse {
        bookings: bookings.into_iter().map(Into::into).collect(),
    }))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .confirm(id, user.actor)
        .await?;
    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct CancelDto {
    pub reason: String,
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<CancelDto>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .cancel(id, user.actor, dto.reason)
        .await?;
    Ok(Json(booking.into()))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .complete(id, user.actor)
        .await?;
    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequestDto {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
}

pub async fn reschedule_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<RescheduleRequestDto>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .reschedule_service
        .request(id, user.actor, dto.start_time, dto.end_time, dto.reason)
        .await?;
    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRespondDto {
    pub action: RescheduleAction,
}

pub async fn reschedule_respond(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<RescheduleRespondDto>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .reschedule_service
        .respond(id, user.actor, dto.action)
        .await?;
    Ok(Json(booking.into()))
}

pub async fn reschedule_apply(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<RescheduleRequestDto>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .reschedule_service
        .apply(id, user.actor, dto.start_time, dto.end_time, dto.reason)
        .await?;
    Ok(Json(booking.into()))
}
