use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    middleware::auth::{AdminOnly, Caller, StudentOnly},
    models::payment::{ApprovePaymentRequest, Payment, PaymentListQuery, PaymentWithDetails, VerifyReferenceResponse},
    services::enrollment::{EnrollmentService, ReceiptUpload},
    utils::errors::AppError,
    AppState,
};

pub async fn upload_receipt(
    State(state): State<AppState>,
    caller: Caller<StudentOnly>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let mut course_id: Option<i32> = None;
    let mut receipt: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "courseId" => {
                let text = field.text().await.map_err(multipart_error)?;
                course_id = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| AppError::invalid_field("courseId", "courseId must be a number"))?,
                );
            }
            "receipt" => {
                let file_name = field.file_name().unwrap_or("receipt").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                receipt = Some((file_name, data.to_vec()));
            }
            _ => {}
        }
    }

    let course_id = course_id.ok_or_else(|| AppError::invalid_field("courseId", "courseId is required"))?;
    let (file_name, bytes) = receipt.ok_or_else(|| AppError::invalid_field("receipt", "Receipt file is required"))?;

    let payment = EnrollmentService::new(&state)
        .upload_receipt(
            caller.id(),
            ReceiptUpload {
                course_id,
                file_name,
                bytes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body is too large".to_string())
    } else {
        AppError::BadRequest(format!("Malformed multipart body: {}", error.body_text()))
    }
}

pub async fn list_payments(
    State(state): State<AppState>,
    _admin: Caller<AdminOnly>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Vec<PaymentWithDetails>>, AppError> {
    let payments = state.payments.list(query.status).await?;
    Ok(Json(payments))
}

pub async fn my_payments(
    State(state): State<AppState>,
    caller: Caller<StudentOnly>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.payments.list_for_student(caller.id()).await?;
    Ok(Json(payments))
}

pub async fn approve_payment(
    State(state): State<AppState>,
    admin: Caller<AdminOnly>,
    Path(id): Path<i32>,
    Json(payload): Json<ApprovePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    let payment = EnrollmentService::new(&state)
        .approve_payment(admin.id(), id, payload.reference_number.as_deref())
        .await?;

    Ok(Json(payment))
}

pub async fn reject_payment(
    State(state): State<AppState>,
    admin: Caller<AdminOnly>,
    Path(id): Path<i32>,
) -> Result<Json<Payment>, AppError> {
    let payment = EnrollmentService::new(&state).reject_payment(admin.id(), id).await?;
    Ok(Json(payment))
}

pub async fn verify_reference(
    State(state): State<AppState>,
    _admin: Caller<AdminOnly>,
    Path(reference): Path<String>,
) -> Result<Json<VerifyReferenceResponse>, AppError> {
    let result = EnrollmentService::new(&state).verify_reference(&reference).await?;
    Ok(Json(result))
}

pub async fn unenroll(
    State(state): State<AppState>,
    caller: Caller<StudentOnly>,
    Path(course_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    EnrollmentService::new(&state).unenroll(caller.id(), course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
