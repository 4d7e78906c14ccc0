//! Persistence seams. Each trait has a PostgreSQL implementation backed by
//! plain parameterised `sqlx` queries; handlers only see the traits.

pub mod courses;
pub mod payments;
pub mod quizzes;
pub mod users;

pub use courses::{CourseRepository, PgCourseRepository};
pub use payments::{PaymentRepository, PendingOutcome, PgPaymentRepository};
pub use quizzes::{AttemptOutcome, PgQuizRepository, QuizRepository};
pub use users::{PgUserRepository, UserRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Postgres 23505, carrying the violated constraint or index name.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl RepoError {
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, RepoError::UniqueViolation(name) if name == constraint)
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &error {
            if db_err.is_unique_violation() {
                return RepoError::UniqueViolation(db_err.constraint().unwrap_or_default().to_string());
            }
        }
        RepoError::Database(error)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
