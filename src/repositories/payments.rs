use async_trait::async_trait;
use sqlx::PgPool;

use super::{RepoError, RepoResult};
use crate::models::payment::{Payment, PaymentStatus, PaymentWithDetails, ReferenceUsage};

pub const ACTIVE_ENROLLMENT_INDEX: &str = "payments_active_enrollment_idx";
pub const REFERENCE_NUMBER_KEY: &str = "payments_reference_number_key";

/// Result of inserting a fresh PENDING payment for a (student, course) pair.
#[derive(Debug)]
pub enum PendingOutcome {
    /// The new row, plus the REJECTED row it replaced, if any.
    Created {
        payment: Payment,
        superseded: Option<Payment>,
    },
    /// A PENDING or APPROVED row already exists; nothing was written.
    ActiveExists(Payment),
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Payment>>;
    async fn find_for_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>>;
    async fn find_by_receipt_url(&self, receipt_url: &str) -> RepoResult<Option<Payment>>;
    async fn list(&self, status: Option<PaymentStatus>) -> RepoResult<Vec<PaymentWithDetails>>;
    async fn list_for_student(&self, student_id: i32) -> RepoResult<Vec<Payment>>;

    /// Atomically checks the pair, drops a REJECTED row and inserts a PENDING one.
    async fn create_pending(&self, student_id: i32, course_id: i32, receipt_url: &str) -> RepoResult<PendingOutcome>;

    /// PENDING -> APPROVED with the reference attached. `None` when the row is
    /// missing or no longer PENDING.
    async fn approve(&self, id: i32, reference_number: &str) -> RepoResult<Option<Payment>>;

    /// PENDING -> REJECTED. `None` when the row is missing or no longer PENDING.
    async fn reject(&self, id: i32) -> RepoResult<Option<Payment>>;

    async fn find_approved_by_reference(&self, reference_number: &str) -> RepoResult<Option<ReferenceUsage>>;

    /// Deletes the pair's payment and the student's attempts on the course's quizzes.
    async fn delete_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>>;

    /// Receipts whose rows go away when the user is deleted: their own payments
    /// and the payments for courses they created.
    async fn receipt_urls_for_user(&self, user_id: i32) -> RepoResult<Vec<String>>;

    async fn receipt_urls_for_course(&self, course_id: i32) -> RepoResult<Vec<String>>;
}

#[derive(Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn find_for_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>> {
        // Active rows win over a leftover REJECTED one.
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE student_id = $1 AND course_id = $2
            ORDER BY (status = 'REJECTED') ASC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn find_by_receipt_url(&self, receipt_url: &str) -> RepoResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE receipt_url = $1")
            .bind(receipt_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn list(&self, status: Option<PaymentStatus>) -> RepoResult<Vec<PaymentWithDetails>> {
        let payments = sqlx::query_as::<_, PaymentWithDetails>(
            r#"
            SELECT p.id, p.student_id, u.name AS student_name, u.email AS student_email,
                   p.course_id, c.title AS course_title, p.receipt_url, p.status,
                   p.reference_number, p.created_at, p.updated_at
            FROM payments p
            JOIN users u ON u.id = p.student_id
            JOIN courses c ON c.id = p.course_id
            WHERE ($1::payment_status IS NULL OR p.status = $1)
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn list_for_student(&self, student_id: i32) -> RepoResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE student_id = $1 ORDER BY created_at DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn create_pending(&self, student_id: i32, course_id: i32, receipt_url: &str) -> RepoResult<PendingOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE student_id = $1 AND course_id = $2 FOR UPDATE",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(active) = existing.iter().find(|p| p.status.is_active()) {
            let active = active.clone();
            tx.rollback().await?;
            return Ok(PendingOutcome::ActiveExists(active));
        }

        let superseded = existing.into_iter().find(|p| p.status == PaymentStatus::Rejected);
        if let Some(rejected) = &superseded {
            sqlx::query("DELETE FROM payments WHERE id = $1")
                .bind(rejected.id)
                .execute(&mut *tx)
                .await?;
        }

        let inserted = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (student_id, course_id, receipt_url, status)
            VALUES ($1, $2, $3, 'PENDING')
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(receipt_url)
        .fetch_one(&mut *tx)
        .await;

        let payment = match inserted {
            Ok(payment) => payment,
            Err(e) => {
                let err = RepoError::from(e);
                // A concurrent upload won the partial unique index.
                if err.violates(ACTIVE_ENROLLMENT_INDEX) {
                    tx.rollback().await?;
                    return match self.find_for_enrollment(student_id, course_id).await? {
                        Some(active) => Ok(PendingOutcome::ActiveExists(active)),
                        None => Err(err),
                    };
                }
                return Err(err);
            }
        };

        tx.commit().await?;

        Ok(PendingOutcome::Created { payment, superseded })
    }

    async fn approve(&self, id: i32, reference_number: &str) -> RepoResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'APPROVED', reference_number = $1, updated_at = NOW()
            WHERE id = $2 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(reference_number)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn reject(&self, id: i32) -> RepoResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'REJECTED', updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn find_approved_by_reference(&self, reference_number: &str) -> RepoResult<Option<ReferenceUsage>> {
        let usage = sqlx::query_as::<_, ReferenceUsage>(
            r#"
            SELECT p.id AS payment_id, p.reference_number, p.student_id,
                   u.name AS student_name, u.email AS student_email,
                   p.course_id, c.title AS course_title, p.updated_at AS approved_at
            FROM payments p
            JOIN users u ON u.id = p.student_id
            JOIN courses c ON c.id = p.course_id
            WHERE p.reference_number = $1 AND p.status = 'APPROVED'
            LIMIT 1
            "#,
        )
        .bind(reference_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(usage)
    }

    async fn delete_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, Payment>(
            "DELETE FROM payments WHERE student_id = $1 AND course_id = $2 RETURNING *",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await?;

        let Some(payment) = pick_primary(deleted) else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            DELETE FROM quiz_attempts
            WHERE student_id = $1
              AND quiz_id IN (SELECT id FROM quizzes WHERE course_id = $2)
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(payment))
    }

    async fn receipt_urls_for_user(&self, user_id: i32) -> RepoResult<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>(
            r#"
            SELECT receipt_url FROM payments
            WHERE student_id = $1
               OR course_id IN (SELECT id FROM courses WHERE created_by_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    async fn receipt_urls_for_course(&self, course_id: i32) -> RepoResult<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>("SELECT receipt_url FROM payments WHERE course_id = $1")
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }
}

/// The row that represents the enrollment: an active one if present.
fn pick_primary(mut rows: Vec<Payment>) -> Option<Payment> {
    let index = rows.iter().position(|p| p.status.is_active()).unwrap_or(0);
    if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(index))
    }
}
