use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::{
    api::state::AppState,
    error::{AppError, Result},
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", name)))
}

/// Payment provider events. Signature verification happens inside the
/// gateway; a bad signature is rejected before any state is read.
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let signature = header(&headers, "Stripe-Signature")?;
    state
        .service_context
        .webhook_service
        .handle_payment_event(&body, signature)
        .await?;
    Ok(StatusCode::OK)
}

/// Meeting provider events (meeting.started / meeting.ended).
pub async fn zoom(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let signature = header(&headers, "x-zm-signature")?;
    let timestamp = header(&headers, "x-zm-request-timestamp")?;
    state
        .service_context
        .webhook_service
        .handle_meeting_event(&body, timestamp, signature)
        .await?;
    Ok(StatusCode::OK)
}
