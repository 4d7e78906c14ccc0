use axum::{extract::State, http::StatusCode, response::Json};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde_json::json;
use validator::Validate;

use crate::{
    middleware::auth::{AnyRole, Caller},
    models::user::{CreateUserRequest, LoginRequest, LoginResponse, NewUser, UserResponse, UserRole},
    repositories::RepoError,
    utils::{
        errors::AppError,
        jwt::create_jwt,
        logger::{fields, LOGGER},
    },
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.validate()?;

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|_| AppError::InternalServerError("Failed to hash password".to_string()))?;

    let new_user = NewUser {
        email: payload.email.trim().to_lowercase(),
        name: payload.name.trim().to_string(),
        password_hash,
        phone: payload.phone,
        address: payload.address,
        role: UserRole::Student,
    };

    let user = state.users.create(new_user).await.map_err(|e| match e {
        RepoError::UniqueViolation(_) => AppError::Conflict("An account with this email already exists".to_string()),
        other => other.into(),
    })?;

    LOGGER.log_business_event("user_registered", Some(user.id), fields([("role", json!(user.role))]));

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .users
        .find_by_email(&payload.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    let is_valid = verify(&payload.password, &user.password_hash)
        .map_err(|_| AppError::InternalServerError("Failed to verify password".to_string()))?;

    if !is_valid {
        return Err(invalid());
    }

    let token = create_jwt(user.id, user.role, &state.config.jwt_secret, state.config.jwt_ttl_hours)
        .map_err(|_| AppError::InternalServerError("Failed to create token".to_string()))?;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

pub async fn me(State(state): State<AppState>, caller: Caller<AnyRole>) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .find_by_id(caller.id())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}
