use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use polls_types::api::Claims;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Identity of the caller on routes that work with or without a session.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Claims>);

pub fn decode_claims(headers: &HeaderMap, secret: &str) -> Result<Claims, ApiError> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized("Authentication required"))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

    Ok(token_data.claims)
}

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = decode_claims(req.headers(), &state.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Attach a [`Viewer`]; a missing or bad token just makes the caller anonymous.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = decode_claims(req.headers(), &state.jwt_secret).ok();
    req.extensions_mut().insert(Viewer(claims));
    next.run(req).await
}

/// Must run inside [`require_auth`]. Staff status is read from the database so
/// promotions and demotions apply without reissuing tokens.
pub async fn require_staff(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = req
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.sub.to_string())
        .ok_or(ApiError::Unauthorized("Authentication required"))?;

    let user = run_db(&state, move |db| db.get_user_by_id(&user_id)).await?;
    match user {
        Some(user) if user.is_staff => Ok(next.run(req).await),
        Some(_) => Err(ApiError::Forbidden),
        None => Err(ApiError::Unauthorized("Unknown user")),
    }
}
