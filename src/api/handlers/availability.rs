use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{AvailabilitySlot, SlotSpec, TimeWindow, UserRole, WeeklySchedule},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct SlotSpecDto {
    pub day_of_week: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<SlotSpecDto> for SlotSpec {
    fn from(dto: SlotSpecDto) -> Self {
        SlotSpec {
            day_of_week: dto.day_of_week,
            specific_date: dto.specific_date,
            start_time: dto.start_time,
            end_time: dto.end_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertSlotsDto {
    pub slots: Vec<SlotSpecDto>,
}

#[derive(Debug, Serialize)]
pub struct SlotListResponse {
    pub slots: Vec<AvailabilitySlot>,
}

fn require_teacher(user: &CurrentUser) -> Result<Uuid> {
    if user.actor.role != UserRole::Teacher {
        return Err(AppError::Forbidden);
    }
    Ok(user.actor.id)
}

pub async fn upsert(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<UpsertSlotsDto>,
) -> Result<(StatusCode, Json<SlotListResponse>)> {
    let teacher_id = require_teacher(&user)?;
    let slots = state
        .service_context
        .availability_service
        .upsert_slots(teacher_id, dto.slots.into_iter().map(Into::into).collect())
        .await?;
    Ok((StatusCode::CREATED, Json(SlotListResponse { slots })))
}

pub async fn replace_weekly(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<UpsertSlotsDto>,
) -> Result<Json<SlotListResponse>> {
    let teacher_id = require_teacher(&user)?;
    let slots = state
        .service_context
        .availability_service
        .replace_weekly(teacher_id, dto.slots.into_iter().map(Into::into).collect())
        .await?;
    Ok(Json(SlotListResponse { slots }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteSlotsDto {
    pub slot_ids: Vec<Uuid>,
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<DeleteSlotsDto>,
) -> Result<StatusCode> {
    let teacher_id = require_teacher(&user)?;
    state
        .service_context
        .availability_service
        .delete_slots(teacher_id, dto.slot_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SlotListResponse>> {
    let teacher_id = require_teacher(&user)?;
    let slots = state
        .service_context
        .availability_service
        .list_for_teacher(teacher_id)
        .await?;
    Ok(Json(SlotListResponse { slots }))
}

pub async fn weekly_schedule(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
) -> Result<Json<WeeklySchedule>> {
    let schedule = state
        .service_context
        .availability_service
        .weekly_schedule(teacher_id)
        .await?;
    Ok(Json(schedule))
}

#[derive(Debug, Deserialize)]
pub struct AvailableOnParams {
    pub date: NaiveDate,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct WindowsResponse {
    pub windows: Vec<TimeWindow>,
}

pub async fn available_on(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
    Query(params): Query<AvailableOnParams>,
) -> Result<Json<WindowsResponse>> {
    let windows = state
        .service_context
        .availability_service
        .available_on(teacher_id, params.date, params.duration_minutes)
        .await?;
    Ok(Json(WindowsResponse { windows }))
}
