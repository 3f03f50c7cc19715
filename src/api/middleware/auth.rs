use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::Actor,
    error::AppError,
    repository::UserRepository,
};

/// Bearer-token claims minted by the identity service. The role claim is
/// advisory; the users table stays authoritative.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    role: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Clone)]
pub struct CurrentUser {
    pub actor: Actor,
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn resolve_actor(state: &AppState, token: &str) -> Result<Actor, AppError> {
    let key = DecodingKey::from_secret(state.settings.auth.jwt_secret.as_bytes());
    let claims = decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| AppError::Unauthorized)?
        .claims;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let user = state
        .service_context
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Actor {
        id: user.id,
        role: user.role,
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let actor = resolve_actor(&state, token).await?;
    request.extensions_mut().insert(CurrentUser { actor });
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
    let actor = resolve_actor(&state, token).await?;
    if !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    request.extensions_mut().insert(CurrentUser { actor });
    Ok(next.run(request).await)
}
