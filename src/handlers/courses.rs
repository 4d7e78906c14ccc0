use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use validator::Validate;

use crate::{
    middleware::auth::{AnyRole, Caller, Staff},
    models::course::{Course, CourseDetailResponse, CourseSummary, CreateCourseRequest, UpdateCourseRequest},
    services::{enrollment::EnrollmentService, quiz::ensure_manages},
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

pub async fn list_courses(
    State(state): State<AppState>,
    _caller: Caller<AnyRole>,
) -> Result<Json<Vec<CourseSummary>>, AppError> {
    let courses = state.courses.list().await?;
    Ok(Json(courses.into_iter().map(CourseSummary::from).collect()))
}

pub async fn get_course(
    State(state): State<AppState>,
    caller: Caller<AnyRole>,
    Path(id): Path<i32>,
) -> Result<Json<CourseDetailResponse>, AppError> {
    let detail = EnrollmentService::new(&state)
        .course_detail(caller.id(), caller.role(), id)
        .await?;
    Ok(Json(detail))
}

pub async fn create_course(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    payload.validate()?;
    if payload.price.is_sign_negative() {
        return Err(AppError::invalid_field("price", "Price cannot be negative"));
    }

    let course = state.courses.create(caller.id(), &payload).await?;

    LOGGER.log_business_event("course_created", Some(caller.id()), fields([("course_id", json!(course.id))]));

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    payload.validate()?;
    if payload.price.map_or(false, |p| p.is_sign_negative()) {
        return Err(AppError::invalid_field("price", "Price cannot be negative"));
    }

    let course = find_managed_course(&state, &caller, id).await?;

    let updated = state
        .courses
        .update(course.id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(updated))
}

pub async fn delete_course(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let course = find_managed_course(&state, &caller, id).await?;

    let receipts = state.payments.receipt_urls_for_course(course.id).await?;

    if !state.courses.delete(course.id).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    EnrollmentService::new(&state)
        .discard_receipts(&receipts, "course_deleted")
        .await;

    LOGGER.log_business_event("course_deleted", Some(caller.id()), fields([("course_id", json!(id))]));

    Ok(StatusCode::NO_CONTENT)
}

/// Loads a course the caller owns, or any course for an admin.
pub(crate) async fn find_managed_course(
    state: &AppState,
    caller: &Caller<Staff>,
    course_id: i32,
) -> Result<Course, AppError> {
    let course = state
        .courses
        .find_by_id(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    ensure_manages(&course, caller.id(), caller.role())?;
    Ok(course)
}
