use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::errors::AppError;

pub const ANSWERS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i32,
    pub quiz_id: i32,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: i32,
    pub question_id: i32,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct QuestionWithAnswers {
    pub question: Question,
    pub answers: Vec<Answer>,
}

impl QuestionWithAnswers {
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i32,
    pub student_id: i32,
    pub quiz_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub answers: Vec<CreateAnswerRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnswerRequest {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl CreateQuizRequest {
    /// Every question needs a body, four answers and exactly one correct answer.
    pub fn check_questions(&self) -> Result<(), AppError> {
        if self.questions.is_empty() {
            return Err(AppError::invalid_field("questions", "A quiz needs at least one question"));
        }

        for (index, question) in self.questions.iter().enumerate() {
            let number = index + 1;
            let has_text = question.text.as_deref().map_or(false, |t| !t.trim().is_empty());
            let has_image = question.image_url.as_deref().map_or(false, |u| !u.trim().is_empty());
            if !has_text && !has_image {
                return Err(AppError::invalid_field(
                    "questions",
                    format!("Question {} needs text or an image", number),
                ));
            }
            if question.answers.len() != ANSWERS_PER_QUESTION {
                return Err(AppError::invalid_field(
                    "questions",
                    format!("Question {} must have exactly {} answers", number, ANSWERS_PER_QUESTION),
                ));
            }
            if question.answers.iter().any(|a| a.text.trim().is_empty()) {
                return Err(AppError::invalid_field(
                    "questions",
                    format!("Question {} has an empty answer", number),
                ));
            }
            if question.answers.iter().filter(|a| a.is_correct).count() != 1 {
                return Err(AppError::invalid_field(
                    "questions",
                    format!("Question {} must have exactly one correct answer", number),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleAnswerRequest {
    pub answer_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: i32,
    pub selected_answer_id: Option<i32>,
    pub correct_answer_id: i32,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmissionResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleAnswerResponse {
    pub is_correct: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    pub correct_answer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: i32,
    pub text: String,
    /// Withheld until the viewer may see the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i32,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
    pub attempt: Option<QuizAttempt>,
}

impl QuizView {
    pub fn new(quiz: Quiz, questions: Vec<QuestionWithAnswers>, attempt: Option<QuizAttempt>, reveal_key: bool) -> Self {
        let questions = questions
            .into_iter()
            .map(|q| QuestionView {
                id: q.question.id,
                text: q.question.text,
                image_url: q.question.image_url,
                answers: q
                    .answers
                    .into_iter()
                    .map(|a| AnswerView {
                        id: a.id,
                        text: a.text,
                        is_correct: reveal_key.then_some(a.is_correct),
                    })
                    .collect(),
            })
            .collect();

        Self { quiz, questions, attempt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &[bool]) -> CreateQuestionRequest {
        CreateQuestionRequest {
            text: Some("2 + 2 = ?".to_string()),
            image_url: None,
            answers: correct
                .iter()
                .enumerate()
                .map(|(i, c)| CreateAnswerRequest { text: format!("option {}", i), is_correct: *c })
                .collect(),
        }
    }

    fn quiz(questions: Vec<CreateQuestionRequest>) -> CreateQuizRequest {
        CreateQuizRequest { title: "Week 1".to_string(), description: None, questions }
    }

    #[test]
    fn accepts_four_answers_with_one_correct() {
        assert!(quiz(vec![question(&[false, true, false, false])]).check_questions().is_ok());
    }

    #[test]
    fn rejects_wrong_answer_count() {
        assert!(quiz(vec![question(&[true, false, false])]).check_questions().is_err());
    }

    #[test]
    fn rejects_zero_or_many_correct_answers() {
        assert!(quiz(vec![question(&[false, false, false, false])]).check_questions().is_err());
        assert!(quiz(vec![question(&[true, true, false, false])]).check_questions().is_err());
    }

    #[test]
    fn accepts_image_only_question() {
        let mut q = question(&[true, false, false, false]);
        q.text = None;
        q.image_url = Some("/uploads/questions/graph.png".to_string());
        assert!(quiz(vec![q]).check_questions().is_ok());
    }

    #[test]
    fn rejects_question_without_body() {
        let mut q = question(&[true, false, false, false]);
        q.text = Some("  ".to_string());
        assert!(quiz(vec![q]).check_questions().is_err());
    }

    #[test]
    fn rejects_empty_quiz() {
        assert!(quiz(Vec::new()).check_questions().is_err());
    }
}
