use async_trait::async_trait;
use sqlx::PgPool;

use super::RepoResult;
use crate::models::{
    content::{CourseMaterial, Recording},
    course::{Course, CourseContent, CreateCourseRequest, UpdateCourseRequest},
    quiz::QuizSummary,
};

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn list(&self) -> RepoResult<Vec<Course>>;
    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Course>>;
    async fn create(&self, created_by_id: i32, course: &CreateCourseRequest) -> RepoResult<Course>;
    async fn update(&self, id: i32, changes: &UpdateCourseRequest) -> RepoResult<Option<Course>>;
    async fn delete(&self, id: i32) -> RepoResult<bool>;
    /// Materials, quizzes and recordings: only returned to entitled callers.
    async fn content(&self, course_id: i32) -> RepoResult<CourseContent>;
}

#[derive(Clone)]
pub struct PgCourseRepository {
    pool: PgPool,
}

impl PgCourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseRepository for PgCourseRepository {
    async fn list(&self) -> RepoResult<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    async fn create(&self, created_by_id: i32, course: &CreateCourseRequest) -> RepoResult<Course> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses
                (title, description, price, tutor, whatsapp_group_link, zoom_link, image_url, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.price)
        .bind(&course.tutor)
        .bind(&course.whatsapp_group_link)
        .bind(&course.zoom_link)
        .bind(&course.image_url)
        .bind(created_by_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(course)
    }

    async fn update(&self, id: i32, changes: &UpdateCourseRequest) -> RepoResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                tutor = COALESCE($4, tutor),
                whatsapp_group_link = COALESCE($5, whatsapp_group_link),
                zoom_link = COALESCE($6, zoom_link),
                image_url = COALESCE($7, image_url),
                updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.tutor)
        .bind(&changes.whatsapp_group_link)
        .bind(&changes.zoom_link)
        .bind(&changes.image_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn content(&self, course_id: i32) -> RepoResult<CourseContent> {
        let materials = sqlx::query_as::<_, CourseMaterial>(
            "SELECT * FROM course_materials WHERE course_id = $1 ORDER BY created_at ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool);

        let quizzes = sqlx::query_as::<_, QuizSummary>(
            r#"
            SELECT q.id, q.title, q.description, q.created_at, COUNT(qs.id) AS question_count
            FROM quizzes q
            LEFT JOIN questions qs ON qs.quiz_id = q.id
            WHERE q.course_id = $1
            GROUP BY q.id
            ORDER BY q.created_at ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool);

        let recordings = sqlx::query_as::<_, Recording>(
            "SELECT * FROM recordings WHERE course_id = $1 ORDER BY created_at DESC",
        )
        .bind(course_id)
        .fetch_all(&self.pool);

        let (materials, quizzes, recordings) = tokio::try_join!(materials, quizzes, recordings)?;

        Ok(CourseContent {
            materials,
            quizzes,
            recordings,
        })
    }
}
