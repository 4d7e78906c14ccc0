use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    content::{CourseMaterial, Recording},
    payment::PaymentStatus,
    quiz::QuizSummary,
    user::UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i32,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub tutor: String,
    pub whatsapp_group_link: Option<String>,
    pub zoom_link: Option<String>,
    pub image_url: Option<String>,
    pub created_by_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Admins and the owning instructor see everything regardless of payment.
    pub fn is_managed_by(&self, user_id: i32, role: UserRole) -> bool {
        match role {
            UserRole::Admin => true,
            UserRole::Instructor => self.created_by_id == user_id,
            UserRole::Student => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub tutor: String,
    #[validate(url)]
    pub whatsapp_group_link: Option<String>,
    #[validate(url)]
    pub zoom_link: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[validate(length(min = 1, max = 255))]
    pub tutor: Option<String>,
    #[validate(url)]
    pub whatsapp_group_link: Option<String>,
    #[validate(url)]
    pub zoom_link: Option<String>,
    pub image_url: Option<String>,
}

/// Public view of a course: no group or meeting links.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: i32,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub tutor: String,
    pub image_url: Option<String>,
    pub created_by_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Course> for CourseSummary {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            price: course.price,
            tutor: course.tutor,
            image_url: course.image_url,
            created_by_id: course.created_by_id,
            created_at: course.created_at,
        }
    }
}

/// Paid content of a course.
#[derive(Debug, Default)]
pub struct CourseContent {
    pub materials: Vec<CourseMaterial>,
    pub quizzes: Vec<QuizSummary>,
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseSummary,
    pub enrollment_status: Option<PaymentStatus>,
    pub whatsapp_group_link: Option<String>,
    pub zoom_link: Option<String>,
    pub materials: Option<Vec<CourseMaterial>>,
    pub quizzes: Vec<QuizSummary>,
    pub recordings: Vec<Recording>,
}

impl CourseDetailResponse {
    /// Content is attached only when the caller is entitled to it; otherwise
    /// links and materials are null and the lists are empty.
    pub fn gated(course: Course, enrollment_status: Option<PaymentStatus>, content: Option<CourseContent>) -> Self {
        let whatsapp_group_link = course.whatsapp_group_link.clone();
        let zoom_link = course.zoom_link.clone();
        let summary = CourseSummary::from(course);

        match content {
            Some(content) => Self {
                course: summary,
                enrollment_status,
                whatsapp_group_link,
                zoom_link,
                materials: Some(content.materials),
                quizzes: content.quizzes,
                recordings: content.recordings,
            },
            None => Self {
                course: summary,
                enrollment_status,
                whatsapp_group_link: None,
                zoom_link: None,
                materials: None,
                quizzes: Vec::new(),
                recordings: Vec::new(),
            },
        }
    }
}

/// Whether a caller may see a course's paid content.
pub fn can_view_content(
    course: &Course,
    user_id: i32,
    role: UserRole,
    enrollment_status: Option<PaymentStatus>,
) -> bool {
    course.is_managed_by(user_id, role) || enrollment_status == Some(PaymentStatus::Approved)
}
