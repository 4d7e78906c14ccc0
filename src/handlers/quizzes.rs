use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::collections::HashMap;
use validator::Validate;

use crate::{
    middleware::auth::{AnyRole, Caller, Staff, StudentOnly},
    models::quiz::{CreateQuizRequest, Quiz, QuizSubmissionResponse, QuizView, SingleAnswerRequest, SingleAnswerResponse},
    services::quiz::QuizService,
    utils::errors::AppError,
    AppState,
};

pub async fn get_quiz(
    State(state): State<AppState>,
    caller: Caller<AnyRole>,
    Path(id): Path<i32>,
) -> Result<Json<QuizView>, AppError> {
    let view = QuizService::new(&state).view_quiz(caller.id(), caller.role(), id).await?;
    Ok(Json(view))
}

/// Body: `{ "<questionId>": <answerId>, ... }`
pub async fn submit_quiz(
    State(state): State<AppState>,
    caller: Caller<StudentOnly>,
    Path(id): Path<i32>,
    Json(answers): Json<HashMap<i32, i32>>,
) -> Result<Json<QuizSubmissionResponse>, AppError> {
    let result = QuizService::new(&state).submit(caller.id(), id, &answers).await?;
    Ok(Json(result))
}

pub async fn answer_quiz(
    State(state): State<AppState>,
    caller: Caller<StudentOnly>,
    Path(id): Path<i32>,
    Json(payload): Json<SingleAnswerRequest>,
) -> Result<Json<SingleAnswerResponse>, AppError> {
    let result = QuizService::new(&state)
        .answer_single(caller.id(), id, payload.answer_id)
        .await?;
    Ok(Json(result))
}

pub async fn create_quiz(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(course_id): Path<i32>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<(StatusCode, Json<Quiz>), AppError> {
    payload.validate()?;
    let quiz = QuizService::new(&state)
        .create_quiz(caller.id(), caller.role(), course_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    caller: Caller<Staff>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    QuizService::new(&state).delete_quiz(caller.id(), caller.role(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
