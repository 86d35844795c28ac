use axum::{extract::State, response::Json, Extension};
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::get_config;
use crate::entities::{
    profile::{self, Entity as Profile},
    refresh_token::{self, Entity as RefreshToken},
};
use crate::error::AppError;
use crate::middleware::auth::{AuthUser, Claims};
use crate::state::AppState;

const ACCESS_TOKEN_TTL_SECS: usize = 900;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    expires_in: usize,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LogoutRequest {
    refresh_token: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LogoutResponse {
    message: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    id: i32,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    role: profile::Role,
    created_at: chrono::NaiveDateTime,
}

fn generate_refresh_token() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill(&mut random_bytes);
    general_purpose::STANDARD.encode(random_bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn create_access_token(user: &profile::Model) -> Result<String, AppError> {
    let expiration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(format!("Clock error: {}", e)))?
        .as_secs() as usize
        + ACCESS_TOKEN_TTL_SECS;

    let claims = Claims {
        sub: user.username.clone(),
        uid: user.id,
        exp: expiration,
        role: user.role,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_config().jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encode error: {}", e)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = Profile::find()
        .filter(profile::Column::Username.eq(&payload.username))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Login failed: unknown user '{}'", payload.username);
            AppError::Unauthorized("Invalid credentials".to_string())
        })?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| AppError::InternalServerError(format!("Hash parse error: {}", e)))?;

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Login failed: bad password for '{}'", payload.username);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let access_token = create_access_token(&user)?;

    // Refresh token lives for a day and is stored hashed.
    let refresh_token_str = generate_refresh_token();
    let refresh_token_model = refresh_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        profile_id: Set(user.id),
        token_hash: Set(hash_token(&refresh_token_str)),
        expires_at: Set(chrono::Utc::now().naive_utc() + chrono::Duration::days(1)),
        created_at: Set(chrono::Utc::now().naive_utc()),
        revoked: Set(false),
    };
    refresh_token_model.insert(&state.db).await?;

    info!("Auth | login | user={}", user.username);
    Ok(Json(LoginResponse {
        access_token,
        refresh_token: refresh_token_str,
        expires_in: ACCESS_TOKEN_TTL_SECS,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let token = RefreshToken::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(&payload.refresh_token)))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid refresh token. Please re-login.".to_string())
        })?;

    if token.revoked {
        return Err(AppError::Unauthorized(
            "User logged out. Please re-login.".to_string(),
        ));
    }
    if token.expires_at < chrono::Utc::now().naive_utc() {
        return Err(AppError::Unauthorized(
            "Refresh token expired. Please re-login.".to_string(),
        ));
    }

    let user = Profile::find_by_id(token.profile_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("User not found. Please re-login.".to_string())
        })?;

    let access_token = create_access_token(&user)?;

    info!("Auth | refresh | user={}", user.username);
    Ok(Json(RefreshResponse { access_token }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out successfully", body = LogoutResponse),
        (status = 404, description = "Refresh token not found")
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    let token = RefreshToken::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_token(&payload.refresh_token)))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Refresh token not found".to_string()))?;

    let mut active_token: refresh_token::ActiveModel = token.into();
    active_token.revoked = Set(true);
    active_token.update(&state.db).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "User profile retrieved successfully", body = UserProfile),
        (status = 401, description = "Unauthorized - Invalid or missing token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserProfile>, AppError> {
    let user = Profile::find_by_id(auth_user.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    Ok(Json(UserProfile {
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role: user.role,
        created_at: user.created_at,
    }))
}
