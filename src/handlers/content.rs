use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    handlers::courses::find_managed_course,
    middleware::auth::{AnyRole, Caller, Staff},
    models::content::{
        Announcement, AnnouncementQuery, CourseMaterial, CreateAnnouncementRequest, CreateMaterialRequest,
        CreatePastPaperRequest, CreateRecordingRequest, PastPaper, PastPaperQuery, Recording,
    },
    utils::errors::AppError,
    AppState,
};

pub async fn add_material(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<CourseMaterial>), AppError> {
    payload.validate()?;
    let course = find_managed_course(&state, &caller, course_id).await?;

    let material = sqlx::query_as::<_, CourseMaterial>(
        r#"
        INSERT INTO course_materials (course_id, title, file_url)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(course.id)
    .bind(&payload.title)
    .bind(&payload.file_url)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn delete_material(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let course_id = sqlx::query_scalar::<_, i32>("SELECT course_id FROM course_materials WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;
    find_managed_course(&state, &caller, course_id).await?;

    sqlx::query("DELETE FROM course_materials WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_recording(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateRecordingRequest>,
) -> Result<(StatusCode, Json<Recording>), AppError> {
    payload.validate()?;
    let course = find_managed_course(&state, &caller, course_id).await?;

    let recording = sqlx::query_as::<_, Recording>(
        r#"
        INSERT INTO recordings (course_id, title, video_url)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(course.id)
    .bind(&payload.title)
    .bind(&payload.video_url)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(recording)))
}

pub async fn delete_recording(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let course_id = sqlx::query_scalar::<_, i32>("SELECT course_id FROM recordings WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recording not found".to_string()))?;
    find_managed_course(&state, &caller, course_id).await?;

    sqlx::query("DELETE FROM recordings WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_announcements(
    State(state): State<AppState>,
    _caller: Caller<AnyRole>,
    Query(query): Query<AnnouncementQuery>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let announcements = sqlx::query_as::<_, Announcement>(
        r#"
        SELECT * FROM announcements
        WHERE ($1::INTEGER IS NULL OR course_id = $1 OR course_id IS NULL)
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.course_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(announcements))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    payload.validate()?;

    // Course-wide announcements belong to the course owner; global ones to any staff.
    if let Some(course_id) = payload.course_id {
        find_managed_course(&state, &caller, course_id).await?;
    }

    let announcement = sqlx::query_as::<_, Announcement>(
        r#"
        INSERT INTO announcements (course_id, title, content, created_by_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(payload.course_id)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(caller.id())
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM announcements WHERE id = $1 AND (created_by_id = $2 OR $3)")
        .bind(id)
        .bind(caller.id())
        .bind(caller.user.is_admin())
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Announcement not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_past_papers(
    State(state): State<AppState>,
    _caller: Caller<AnyRole>,
    Query(query): Query<PastPaperQuery>,
) -> Result<Json<Vec<PastPaper>>, AppError> {
    let papers = sqlx::query_as::<_, PastPaper>(
        r#"
        SELECT * FROM past_papers
        WHERE ($1::TEXT IS NULL OR subject = $1)
          AND ($2::INTEGER IS NULL OR year = $2)
        ORDER BY year DESC, subject ASC
        "#,
    )
    .bind(&query.subject)
    .bind(query.year)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(papers))
}

pub async fn create_past_paper(
    State(state): State<AppState>,
    _caller: Caller<Staff>,
    Json(payload): Json<CreatePastPaperRequest>,
) -> Result<(StatusCode, Json<PastPaper>), AppError> {
    payload.validate()?;

    let paper = sqlx::query_as::<_, PastPaper>(
        r#"
        INSERT INTO past_papers (subject, year, title, file_url)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&payload.subject)
    .bind(payload.year)
    .bind(&payload.title)
    .bind(&payload.file_url)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(paper)))
}

pub async fn delete_past_paper(
    State(state): State<AppState>,
    _caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM past_papers WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Past paper not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
