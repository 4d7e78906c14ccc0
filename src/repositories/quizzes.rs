use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;

use super::{RepoError, RepoResult};
use crate::models::quiz::{Answer, CreateQuizRequest, Question, QuestionWithAnswers, Quiz, QuizAttempt};

pub const ATTEMPT_KEY: &str = "quiz_attempts_student_quiz_key";

/// Scores a submission against the quiz as read inside the attempt
/// transaction. `None` refuses the submission.
pub type Grader<'a> = &'a (dyn Fn(&[QuestionWithAnswers]) -> Option<Decimal> + Send + Sync);

#[derive(Debug)]
pub enum AttemptOutcome {
    /// Written, together with the questions it was graded against.
    Recorded {
        attempt: QuizAttempt,
        questions: Vec<QuestionWithAnswers>,
    },
    /// The student already has an attempt; nothing was written.
    AlreadyAttempted,
    /// The grader refused the submission; nothing was written.
    Ungradable(Vec<QuestionWithAnswers>),
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_quiz(&self, quiz_id: i32) -> RepoResult<Option<Quiz>>;
    /// Questions in display order, each with its answers.
    async fn questions(&self, quiz_id: i32) -> RepoResult<Vec<QuestionWithAnswers>>;
    async fn find_attempt(&self, student_id: i32, quiz_id: i32) -> RepoResult<Option<QuizAttempt>>;
    /// Checks for an earlier attempt, reads and grades the questions, and
    /// inserts the new attempt in a single transaction.
    async fn record_attempt(&self, student_id: i32, quiz_id: i32, grade: Grader<'_>) -> RepoResult<AttemptOutcome>;
    async fn create_quiz(&self, course_id: i32, quiz: &CreateQuizRequest) -> RepoResult<Quiz>;
    async fn delete_quiz(&self, quiz_id: i32) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgQuizRepository {
    pool: PgPool,
}

impl PgQuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizRepository for PgQuizRepository {
    async fn find_quiz(&self, quiz_id: i32) -> RepoResult<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quiz)
    }

    async fn questions(&self, quiz_id: i32) -> RepoResult<Vec<QuestionWithAnswers>> {
        let mut conn = self.pool.acquire().await?;
        load_questions(&mut conn, quiz_id).await
    }

    async fn find_attempt(&self, student_id: i32, quiz_id: i32) -> RepoResult<Option<QuizAttempt>> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            "SELECT * FROM quiz_attempts WHERE student_id = $1 AND quiz_id = $2",
        )
        .bind(student_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempt)
    }

    async fn record_attempt(&self, student_id: i32, quiz_id: i32, grade: Grader<'_>) -> RepoResult<AttemptOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM quiz_attempts WHERE student_id = $1 AND quiz_id = $2 FOR UPDATE",
        )
        .bind(student_id)
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            tx.rollback().await?;
            return Ok(AttemptOutcome::AlreadyAttempted);
        }

        let questions = load_questions(&mut tx, quiz_id).await?;
        let Some(score) = grade(&questions) else {
            tx.rollback().await?;
            return Ok(AttemptOutcome::Ungradable(questions));
        };

        let inserted = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (student_id, quiz_id, score)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(quiz_id)
        .bind(score)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(attempt) => {
                tx.commit().await?;
                Ok(AttemptOutcome::Recorded { attempt, questions })
            }
            Err(e) => {
                tx.rollback().await?;
                let err = RepoError::from(e);
                if err.violates(ATTEMPT_KEY) {
                    Ok(AttemptOutcome::AlreadyAttempted)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_quiz(&self, course_id: i32, quiz: &CreateQuizRequest) -> RepoResult<Quiz> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Quiz>(
            "INSERT INTO quizzes (course_id, title, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(course_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .fetch_one(&mut *tx)
        .await?;

        for (position, question) in quiz.questions.iter().enumerate() {
            let question_id = sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO questions (quiz_id, text, image_url, position)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(created.id)
            .bind(&question.text)
            .bind(&question.image_url)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await?;

            for answer in &question.answers {
                sqlx::query("INSERT INTO answers (question_id, text, is_correct) VALUES ($1, $2, $3)")
                    .bind(question_id)
                    .bind(&answer.text)
                    .bind(answer.is_correct)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn delete_quiz(&self, quiz_id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Questions in display order, each with its answers.
async fn load_questions(conn: &mut PgConnection, quiz_id: i32) -> RepoResult<Vec<QuestionWithAnswers>> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE quiz_id = $1 ORDER BY position ASC, id ASC",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let answers = sqlx::query_as::<_, Answer>(
        r#"
        SELECT a.* FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE q.quiz_id = $1
        ORDER BY a.id ASC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<i32, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let answers = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithAnswers { question, answers }
        })
        .collect())
}
