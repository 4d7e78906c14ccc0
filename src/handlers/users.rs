use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;

use crate::{
    middleware::auth::{AdminOnly, Caller},
    models::user::{UpdateRoleRequest, UserResponse},
    services::enrollment::EnrollmentService,
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    _admin: Caller<AdminOnly>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_role(
    State(state): State<AppState>,
    admin: Caller<AdminOnly>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if id == admin.id() {
        return Err(AppError::BadRequest("You cannot change your own role".to_string()));
    }

    let user = state
        .users
        .update_role(id, payload.role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    LOGGER.log_business_event(
        "user_role_changed",
        Some(admin.id()),
        fields([("target_user_id", json!(id)), ("role", json!(payload.role))]),
    );

    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    admin: Caller<AdminOnly>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if id == admin.id() {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    let receipts = state.payments.receipt_urls_for_user(id).await?;

    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    EnrollmentService::new(&state)
        .discard_receipts(&receipts, "user_deleted")
        .await;

    LOGGER.log_business_event("user_deleted", Some(admin.id()), fields([("target_user_id", json!(id))]));

    Ok(StatusCode::NO_CONTENT)
}
