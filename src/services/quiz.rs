use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    models::{
        course::Course,
        payment::PaymentStatus,
        quiz::{
            CreateQuizRequest, QuestionResult, QuestionWithAnswers, Quiz, QuizSubmissionResponse, QuizView,
            SingleAnswerResponse,
        },
        user::UserRole,
    },
    repositories::{quizzes::Grader, AttemptOutcome, CourseRepository, PaymentRepository, QuizRepository},
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

/// `correct / total * 100`, rounded half-up to one decimal place.
pub fn score_percentage(correct: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(correct as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64))
        .round_dp_with_strategy(1, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug)]
pub struct GradedSubmission {
    pub score: Decimal,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub results: Vec<QuestionResult>,
}

/// Grades `questionId -> answerId` against the key. Unanswered questions count
/// as wrong; ids that do not belong to the quiz are rejected.
pub fn grade_submission(
    questions: &[QuestionWithAnswers],
    submitted: &HashMap<i32, i32>,
) -> Result<GradedSubmission, AppError> {
    if questions.is_empty() {
        return Err(AppError::BadRequest("This quiz has no questions".to_string()));
    }

    let known: HashSet<i32> = questions.iter().map(|q| q.question.id).collect();
    if let Some(unknown) = submitted.keys().find(|id| !known.contains(id)) {
        return Err(AppError::invalid_field(
            "answers",
            format!("Question {} does not belong to this quiz", unknown),
        ));
    }

    let mut results = Vec::with_capacity(questions.len());
    for question in questions {
        let correct = question.correct_answer().ok_or_else(|| {
            AppError::internal(format!("question {} has no correct answer", question.question.id))
        })?;

        let selected = submitted.get(&question.question.id).copied();
        if let Some(answer_id) = selected {
            if !question.answers.iter().any(|a| a.id == answer_id) {
                return Err(AppError::invalid_field(
                    "answers",
                    format!("Answer {} does not belong to question {}", answer_id, question.question.id),
                ));
            }
        }

        results.push(QuestionResult {
            question_id: question.question.id,
            selected_answer_id: selected,
            correct_answer_id: correct.id,
            is_correct: selected == Some(correct.id),
        });
    }

    let correct_answers = results.iter().filter(|r| r.is_correct).count();

    Ok(GradedSubmission {
        score: score_percentage(correct_answers, questions.len()),
        total_questions: questions.len(),
        correct_answers,
        results,
    })
}

/// Scores one selected answer against the whole quiz and names the right
/// answer when the pick was wrong.
pub fn single_answer(questions: &[QuestionWithAnswers], answer_id: i32) -> Result<SingleAnswerResponse, AppError> {
    let question = questions
        .iter()
        .find(|q| q.answers.iter().any(|a| a.id == answer_id))
        .ok_or_else(|| AppError::invalid_field("answerId", "Answer does not belong to this quiz"))?;
    let correct = question.correct_answer().ok_or_else(|| {
        AppError::internal(format!("question {} has no correct answer", question.question.id))
    })?;

    let is_correct = correct.id == answer_id;
    Ok(SingleAnswerResponse {
        is_correct,
        score: score_percentage(usize::from(is_correct), questions.len()),
        correct_answer: (!is_correct).then(|| correct.text.clone()),
    })
}

pub struct QuizService {
    courses: Arc<dyn CourseRepository>,
    payments: Arc<dyn PaymentRepository>,
    quizzes: Arc<dyn QuizRepository>,
}

impl QuizService {
    pub fn new(state: &AppState) -> Self {
        Self {
            courses: state.courses.clone(),
            payments: state.payments.clone(),
            quizzes: state.quizzes.clone(),
        }
    }

    pub async fn view_quiz(&self, user_id: i32, role: UserRole, quiz_id: i32) -> Result<QuizView, AppError> {
        let quiz = self.find_quiz(quiz_id).await?;
        let course = self.find_course(quiz.course_id).await?;
        let manages = course.is_managed_by(user_id, role);
        if !manages {
            self.ensure_enrolled(user_id, course.id).await?;
        }

        let questions = self.quizzes.questions(quiz_id).await?;
        let attempt = if role == UserRole::Student {
            self.quizzes.find_attempt(user_id, quiz_id).await?
        } else {
            None
        };

        let reveal_key = manages || attempt.is_some();
        Ok(QuizView::new(quiz, questions, attempt, reveal_key))
    }

    pub async fn submit(
        &self,
        student_id: i32,
        quiz_id: i32,
        answers: &HashMap<i32, i32>,
    ) -> Result<QuizSubmissionResponse, AppError> {
        let quiz = self.find_quiz(quiz_id).await?;
        self.ensure_enrolled(student_id, quiz.course_id).await?;

        if self.quizzes.find_attempt(student_id, quiz_id).await?.is_some() {
            return Err(already_attempted());
        }

        let grader = |questions: &[QuestionWithAnswers]| grade_submission(questions, answers).ok().map(|g| g.score);
        let questions = self.record(student_id, quiz_id, &grader).await?;
        let graded = grade_submission(&questions, answers)?;

        Ok(QuizSubmissionResponse {
            score: graded.score,
            total_questions: graded.total_questions,
            correct_answers: graded.correct_answers,
            results: graded.results,
        })
    }

    /// Single-answer path: one selected answer, its correctness, and the
    /// right answer's text when the pick was wrong.
    pub async fn answer_single(
        &self,
        student_id: i32,
        quiz_id: i32,
        answer_id: i32,
    ) -> Result<SingleAnswerResponse, AppError> {
        let quiz = self.find_quiz(quiz_id).await?;
        self.ensure_enrolled(student_id, quiz.course_id).await?;

        if self.quizzes.find_attempt(student_id, quiz_id).await?.is_some() {
            return Err(already_attempted());
        }

        let grader = |questions: &[QuestionWithAnswers]| single_answer(questions, answer_id).ok().map(|r| r.score);
        let questions = self.record(student_id, quiz_id, &grader).await?;
        single_answer(&questions, answer_id)
    }

    pub async fn create_quiz(
        &self,
        user_id: i32,
        role: UserRole,
        course_id: i32,
        request: &CreateQuizRequest,
    ) -> Result<Quiz, AppError> {
        request.check_questions()?;
        let course = self.find_course(course_id).await?;
        ensure_manages(&course, user_id, role)?;

        let quiz = self.quizzes.create_quiz(course_id, request).await?;

        LOGGER.log_business_event(
            "quiz_created",
            Some(user_id),
            fields([
                ("quiz_id", json!(quiz.id)),
                ("course_id", json!(course_id)),
                ("question_count", json!(request.questions.len())),
            ]),
        );

        Ok(quiz)
    }

    pub async fn delete_quiz(&self, user_id: i32, role: UserRole, quiz_id: i32) -> Result<(), AppError> {
        let quiz = self.find_quiz(quiz_id).await?;
        let course = self.find_course(quiz.course_id).await?;
        ensure_manages(&course, user_id, role)?;

        if !self.quizzes.delete_quiz(quiz_id).await? {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        Ok(())
    }

    /// Grades and stores the attempt in one transaction and returns the
    /// questions it was graded against. When the grader refuses, nothing is
    /// stored and the caller's re-grade over the same questions yields the error.
    async fn record(
        &self,
        student_id: i32,
        quiz_id: i32,
        grader: Grader<'_>,
    ) -> Result<Vec<QuestionWithAnswers>, AppError> {
        match self.quizzes.record_attempt(student_id, quiz_id, grader).await? {
            AttemptOutcome::Recorded { attempt, questions } => {
                LOGGER.log_business_event(
                    "quiz_submitted",
                    Some(student_id),
                    fields([
                        ("quiz_id", json!(quiz_id)),
                        ("attempt_id", json!(attempt.id)),
                        ("score", json!(attempt.score.to_string())),
                    ]),
                );
                Ok(questions)
            }
            AttemptOutcome::AlreadyAttempted => Err(already_attempted()),
            AttemptOutcome::Ungradable(questions) => Ok(questions),
        }
    }

    async fn find_quiz(&self, quiz_id: i32) -> Result<Quiz, AppError> {
        self.quizzes
            .find_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
    }

    async fn find_course(&self, course_id: i32) -> Result<Course, AppError> {
        self.courses
            .find_by_id(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    async fn ensure_enrolled(&self, student_id: i32, course_id: i32) -> Result<(), AppError> {
        let status = self
            .payments
            .find_for_enrollment(student_id, course_id)
            .await?
            .map(|p| p.status);

        if status == Some(PaymentStatus::Approved) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Your enrollment in this course has not been approved".to_string(),
            ))
        }
    }
}

/// Owner instructor or admin.
pub fn ensure_manages(course: &Course, user_id: i32, role: UserRole) -> Result<(), AppError> {
    if course.is_managed_by(user_id, role) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the course owner or an admin can do this".to_string()))
    }
}

fn already_attempted() -> AppError {
    AppError::Conflict("You have already attempted this quiz".to_string())
}
