use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use polls_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use polls_types::events::AuthEvent;

use crate::audit::ClientIp;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};

const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";

pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest("Username must be 3 to 32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".into()));
    }

    let user_id = Uuid::new_v4();
    let username = req.username.clone();

    let created = run_db(&state, move |db| {
        if db.get_user_by_username(&req.username)?.is_some() {
            return Ok(false);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        // A concurrent registration may have claimed the name since the check
        db.create_user(&user_id.to_string(), &req.username, &password_hash)
    })
    .await?;

    if !created {
        return Err(ApiError::Conflict("A user with that username already exists."));
    }

    info!("Registered user {} ({})", username, user_id);
    let token = create_token(&state.jwt_secret, user_id, &username)?;

    // Registration signs the new account in
    state.signals.send(AuthEvent::LoggedIn { username, ip });

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.clone();

    let user = run_db(&state, move |db| {
        let Some(user) = db.get_user_by_username(&req.username)? else {
            return Ok(None);
        };

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("corrupt password hash for {}: {}", user.username, e))?;
        let verified = Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_ok();

        Ok(verified.then_some(user))
    })
    .await?;

    let Some(user) = user else {
        state.signals.send(AuthEvent::LoginFailed { username, ip });
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    };

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    state.signals.send(AuthEvent::LoggedIn {
        username: user.username.clone(),
        ip,
    });

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// Tokens are stateless, so logging out only records the event; clients drop
/// the token.
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Extension(claims): Extension<Claims>,
) -> StatusCode {
    state.signals.send(AuthEvent::LoggedOut {
        username: claims.username,
        ip,
    });
    StatusCode::NO_CONTENT
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
