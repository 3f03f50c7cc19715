use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{PaymentSettings, UpdatePaymentSettingsRequest},
    error::Result,
};

pub async fn get_payment_settings(
    State(state): State<AppState>,
) -> Result<Json<PaymentSettings>> {
    let settings = state.service_context.settings_service.get().await?;
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsDto {
    pub platform_fee_percent: f64,
}

pub async fn update_payment_settings(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(dto): Json<UpdateSettingsDto>,
) -> Result<Json<PaymentSettings>> {
    let settings = state
        .service_context
        .settings_service
        .update(
            UpdatePaymentSettingsRequest {
                platform_fee_percent: dto.platform_fee_percent,
            },
            user.actor.id,
        )
        .await?;
    Ok(Json(settings))
}
