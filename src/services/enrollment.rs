use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{
        course::{can_view_content, CourseDetailResponse},
        payment::{normalize_reference, Payment, VerifyReferenceResponse},
        user::UserRole,
    },
    repositories::{
        payments::REFERENCE_NUMBER_KEY, CourseRepository, PaymentRepository, PendingOutcome, RepoError,
        UserRepository,
    },
    services::{
        notification::NotificationService,
        storage::{receipt_key, FileStore},
    },
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

const ACCEPTED_RECEIPT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif", "application/pdf"];

/// A receipt as it arrived in the multipart body.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub course_id: i32,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// File extension for an accepted receipt, judged by content rather than name.
pub fn receipt_extension(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    ACCEPTED_RECEIPT_TYPES
        .contains(&kind.mime_type())
        .then(|| kind.extension())
}

pub fn validate_receipt(bytes: &[u8], max_bytes: usize) -> Result<&'static str, AppError> {
    if bytes.is_empty() {
        return Err(AppError::invalid_field("receipt", "Receipt file is empty"));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Receipt exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        )));
    }
    receipt_extension(bytes).ok_or_else(|| {
        AppError::UnsupportedMediaType("Receipt must be an image (JPEG, PNG, WEBP, GIF) or a PDF".to_string())
    })
}

/// Course access lifecycle: receipt upload, admin verification, unenrollment.
pub struct EnrollmentService {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    payments: Arc<dyn PaymentRepository>,
    storage: Arc<dyn FileStore>,
    notifications: NotificationService,
    max_receipt_bytes: usize,
}

impl EnrollmentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            courses: state.courses.clone(),
            payments: state.payments.clone(),
            storage: state.storage.clone(),
            notifications: NotificationService::new(state.mailer.clone(), state.config.app_url.clone()),
            max_receipt_bytes: state.config.max_receipt_bytes,
        }
    }

    pub async fn upload_receipt(&self, student_id: i32, upload: ReceiptUpload) -> Result<Payment, AppError> {
        let extension = validate_receipt(&upload.bytes, self.max_receipt_bytes)?;

        if self.courses.find_by_id(upload.course_id).await?.is_none() {
            return Err(AppError::NotFound("Course not found".to_string()));
        }

        // Fail fast before touching storage; the transactional insert re-checks.
        if let Some(existing) = self.payments.find_for_enrollment(student_id, upload.course_id).await? {
            if existing.status.is_active() {
                return Err(already_active());
            }
        }

        let key = receipt_key(student_id, &upload.file_name, extension, Utc::now(), Uuid::new_v4());
        let receipt_url = self
            .storage
            .put(upload.bytes, &key)
            .await
            .map_err(|e| AppError::internal(format!("storing receipt {}: {:#}", key, e)))?;

        let outcome = match self
            .payments
            .create_pending(student_id, upload.course_id, &receipt_url)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard_file(&receipt_url, "receipt_upload_failed").await;
                return Err(e.into());
            }
        };

        match outcome {
            PendingOutcome::ActiveExists(active) => {
                if active.receipt_url != receipt_url {
                    self.discard_file(&receipt_url, "receipt_upload_conflict").await;
                }
                Err(already_active())
            }
            PendingOutcome::Created { payment, superseded } => {
                if let Some(old) = superseded {
                    self.discard_file(&old.receipt_url, "rejected_receipt_replaced").await;
                }

                LOGGER.log_business_event(
                    "receipt_uploaded",
                    Some(student_id),
                    fields([
                        ("payment_id", json!(payment.id)),
                        ("course_id", json!(payment.course_id)),
                    ]),
                );

                Ok(payment)
            }
        }
    }

    pub async fn verify_reference(&self, raw_reference: &str) -> Result<VerifyReferenceResponse, AppError> {
        let reference = normalize_reference(raw_reference)
            .ok_or_else(|| AppError::invalid_field("referenceNumber", "Reference number is required"))?;

        let usage = self.payments.find_approved_by_reference(&reference).await?;

        Ok(VerifyReferenceResponse {
            is_duplicate: usage.is_some(),
            payment: usage,
        })
    }

    pub async fn approve_payment(
        &self,
        admin_id: i32,
        payment_id: i32,
        raw_reference: Option<&str>,
    ) -> Result<Payment, AppError> {
        let reference = raw_reference
            .and_then(normalize_reference)
            .ok_or_else(|| AppError::invalid_field("referenceNumber", "Reference number is required"))?;

        if let Some(usage) = self.payments.find_approved_by_reference(&reference).await? {
            LOGGER.log_security_event(
                "duplicate_reference_detected",
                Some(admin_id),
                fields([
                    ("payment_id", json!(payment_id)),
                    ("conflicting_payment_id", json!(usage.payment_id)),
                    ("reference_number", json!(reference)),
                ]),
            );
            return Err(AppError::Conflict(format!(
                "Reference number {} is already used by {} for {}",
                reference, usage.student_name, usage.course_title
            )));
        }

        let payment = match self.payments.approve(payment_id, &reference).await {
            Ok(Some(payment)) => payment,
            Ok(None) => return Err(already_processed()),
            Err(e) if e.violates(REFERENCE_NUMBER_KEY) => {
                return Err(AppError::Conflict(format!(
                    "Reference number {} has already been used",
                    reference
                )))
            }
            Err(e) => return Err(e.into()),
        };

        LOGGER.log_business_event(
            "payment_approved",
            Some(admin_id),
            fields([
                ("payment_id", json!(payment.id)),
                ("student_id", json!(payment.student_id)),
                ("course_id", json!(payment.course_id)),
            ]),
        );

        self.send_approval_email(&payment).await;

        Ok(payment)
    }

    pub async fn reject_payment(&self, admin_id: i32, payment_id: i32) -> Result<Payment, AppError> {
        let payment = self
            .payments
            .reject(payment_id)
            .await?
            .ok_or_else(already_processed)?;

        LOGGER.log_business_event(
            "payment_rejected",
            Some(admin_id),
            fields([
                ("payment_id", json!(payment.id)),
                ("student_id", json!(payment.student_id)),
            ]),
        );

        Ok(payment)
    }

    pub async fn unenroll(&self, student_id: i32, course_id: i32) -> Result<(), AppError> {
        let payment = self
            .payments
            .delete_enrollment(student_id, course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No enrollment found for this course".to_string()))?;

        self.discard_file(&payment.receipt_url, "unenroll_receipt_cleanup").await;

        LOGGER.log_business_event(
            "unenrolled",
            Some(student_id),
            fields([
                ("course_id", json!(course_id)),
                ("previous_status", json!(payment.status)),
            ]),
        );

        Ok(())
    }

    pub async fn course_detail(
        &self,
        user_id: i32,
        role: UserRole,
        course_id: i32,
    ) -> Result<CourseDetailResponse, AppError> {
        let course = self
            .courses
            .find_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

        let enrollment_status = if role == UserRole::Student {
            self.payments
                .find_for_enrollment(user_id, course_id)
                .await?
                .map(|p| p.status)
        } else {
            None
        };

        let content = if can_view_content(&course, user_id, role, enrollment_status) {
            Some(self.courses.content(course_id).await?)
        } else {
            None
        };

        Ok(CourseDetailResponse::gated(course, enrollment_status, content))
    }

    async fn send_approval_email(&self, payment: &Payment) {
        let student = self.users.find_by_id(payment.student_id).await;
        let course = self.courses.find_by_id(payment.course_id).await;

        match (student, course) {
            (Ok(Some(student)), Ok(Some(course))) => {
                self.notifications
                    .notify_payment_approved(&student, &course, payment)
                    .await
            }
            (student, course) => tracing::warn!(
                "Skipping approval email for payment {}: student {:?}, course {:?}",
                payment.id,
                student.map(|s| s.map(|s| s.id)).map_err(describe),
                course.map(|c| c.map(|c| c.id)).map_err(describe)
            ),
        }
    }

    /// Best-effort removal of receipts whose payment rows were deleted by a cascade.
    pub async fn discard_receipts(&self, urls: &[String], reason: &str) {
        for url in urls {
            self.discard_file(url, reason).await;
        }
    }

    /// Storage is secondary to the database: failures are logged and swallowed.
    async fn discard_file(&self, url: &str, reason: &str) {
        if let Err(e) = self.storage.delete(url).await {
            LOGGER.log_error(
                &format!("{:#}", e),
                fields([
                    ("receipt_url", json!(url)),
                    ("reason", json!(reason)),
                    ("error_type", json!("storage")),
                ]),
            );
        }
    }
}

fn describe(e: RepoError) -> String {
    e.to_string()
}

fn already_active() -> AppError {
    AppError::Conflict("A payment for this course is already pending or approved".to_string())
}

fn already_processed() -> AppError {
    AppError::NotFound("Payment not found or already processed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

    #[test]
    fn accepts_images_and_pdfs_by_content() {
        assert_eq!(receipt_extension(PNG), Some("png"));
        assert_eq!(receipt_extension(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3"), Some("pdf"));
        assert_eq!(receipt_extension(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F']), Some("jpg"));
    }

    #[test]
    fn rejects_other_content() {
        assert_eq!(receipt_extension(b"just some text"), None);
        assert_eq!(receipt_extension(b"PK\x03\x04zipfile"), None);
        assert!(matches!(
            validate_receipt(b"just some text", MB),
            Err(AppError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn enforces_size_limit_and_non_empty() {
        assert!(matches!(validate_receipt(PNG, 8), Err(AppError::PayloadTooLarge(_))));
        assert!(matches!(validate_receipt(&[], MB), Err(AppError::ValidationError(_))));
        assert_eq!(validate_receipt(PNG, MB).unwrap(), "png");
    }
}
