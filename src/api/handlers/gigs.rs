use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateGigRequest, Gig, UpdateGigRequest, UserRole},
    error::{AppError, Result},
    repository::GigRepository,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGigDto {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(range(min = 1))]
    pub hourly_rate_cents: i64,
    #[validate(range(min = 15, max = 480))]
    pub duration_minutes: i64,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<CreateGigDto>,
) -> Result<(StatusCode, Json<Gig>)> {
    if user.actor.role != UserRole::Teacher {
        return Err(AppError::Forbidden);
    }
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let gig = state
        .service_context
        .gig_repo
        .create(
            user.actor.id,
            CreateGigRequest {
                title: dto.title,
                category: dto.category,
                hourly_rate_cents: dto.hourly_rate_cents,
                duration_minutes: dto.duration_minutes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(gig)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Gig>> {
    let gig = state
        .service_context
        .gig_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;
    Ok(Json(gig))
}

pub async fn list_by_teacher(
    State(state): State<AppState>,
    Path(teacher_id): Path<Uuid>,
) -> Result<Json<Vec<Gig>>> {
    let gigs = state
        .service_context
        .gig_repo
        .list_by_teacher(teacher_id)
        .await?;
    Ok(Json(gigs))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGigDto {
    pub title: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub status: Option<crate::domain::GigStatus>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateGigDto>,
) -> Result<Json<Gig>> {
    let gig = state
        .service_context
        .gig_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;

    if gig.teacher_id != user.actor.id && !user.actor.is_admin() {
        return Err(AppError::Forbidden);
    }

    let updated = state
        .service_context
        .gig_repo
        .update(
            id,
            UpdateGigRequest {
                title: dto.title,
                hourly_rate_cents: dto.hourly_rate_cents,
                duration_minutes: dto.duration_minutes,
                status: dto.status,
            },
        )
        .await?;
    Ok(Json(updated))
}
