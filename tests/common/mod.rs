#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tower::ServiceExt;

use academy_backend::{
    build_router,
    config::{AppConfig, RateLimitSettings},
    middleware::rate_limit::RateLimiter,
    models::{
        content::CourseMaterial,
        course::{Course, CourseContent, CreateCourseRequest, UpdateCourseRequest},
        payment::{Payment, PaymentStatus, PaymentWithDetails, ReferenceUsage},
        quiz::{Answer, CreateQuizRequest, Question, QuestionWithAnswers, Quiz, QuizAttempt, QuizSummary},
        user::{NewUser, User, UserRole},
    },
    repositories::{
        payments::REFERENCE_NUMBER_KEY, quizzes::Grader, AttemptOutcome, CourseRepository, PaymentRepository, PendingOutcome,
        QuizRepository, RepoError, RepoResult, UserRepository,
    },
    services::{
        notification::{Mailer, OutgoingEmail},
        storage::{url_for_key, FileStore},
    },
    utils::jwt::create_jwt,
    AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const BOUNDARY: &str = "academy-test-boundary";

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%test receipt\n";

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: Vec<User>,
    courses: Vec<Course>,
    payments: Vec<Payment>,
    materials: Vec<CourseMaterial>,
    quizzes: Vec<Quiz>,
    questions: Vec<QuestionWithAnswers>,
    attempts: Vec<QuizAttempt>,
}

impl Tables {
    fn id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn remove_attempts_for_course(&mut self, student_id: i32, course_id: i32) {
        let quiz_ids: Vec<i32> = self
            .quizzes
            .iter()
            .filter(|q| q.course_id == course_id)
            .map(|q| q.id)
            .collect();
        self.attempts
            .retain(|a| !(a.student_id == student_id && quiz_ids.contains(&a.quiz_id)));
    }
}

/// One shared in-memory database behind every repository trait, so
/// cross-table effects (unenroll removing attempts) behave as in Postgres.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    pub fn add_user(&self, role: UserRole, email: &str) -> User {
        self.with(|t| {
            let now = Utc::now();
            let user = User {
                id: t.id(),
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                password_hash: bcrypt::hash("password123", 4).unwrap(),
                phone: None,
                address: None,
                role,
                created_at: now,
                updated_at: now,
            };
            t.users.push(user.clone());
            user
        })
    }

    pub fn add_course(&self, owner_id: i32, title: &str) -> Course {
        self.with(|t| {
            let now = Utc::now();
            let course = Course {
                id: t.id(),
                title: title.to_string(),
                description: format!("{} description", title),
                price: Decimal::new(250000, 2),
                tutor: "Ms. Perera".to_string(),
                whatsapp_group_link: Some("https://chat.whatsapp.com/abc".to_string()),
                zoom_link: Some("https://zoom.us/j/123".to_string()),
                image_url: None,
                created_by_id: owner_id,
                created_at: now,
                updated_at: now,
            };
            t.courses.push(course.clone());
            course
        })
    }

    pub fn add_material(&self, course_id: i32, title: &str) -> CourseMaterial {
        self.with(|t| {
            let material = CourseMaterial {
                id: t.id(),
                course_id,
                title: title.to_string(),
                file_url: format!("/uploads/materials/{}.pdf", title),
                created_at: Utc::now(),
            };
            t.materials.push(material.clone());
            material
        })
    }

    pub fn payments_for(&self, student_id: i32, course_id: i32) -> Vec<Payment> {
        self.with(|t| {
            t.payments
                .iter()
                .filter(|p| p.student_id == student_id && p.course_id == course_id)
                .cloned()
                .collect()
        })
    }

    pub fn payment(&self, id: i32) -> Option<Payment> {
        self.with(|t| t.payments.iter().find(|p| p.id == id).cloned())
    }

    pub fn attempts_for(&self, student_id: i32) -> Vec<QuizAttempt> {
        self.with(|t| {
            t.attempts
                .iter()
                .filter(|a| a.student_id == student_id)
                .cloned()
                .collect()
        })
    }

    pub fn questions_of(&self, quiz_id: i32) -> Vec<QuestionWithAnswers> {
        self.with(|t| {
            t.questions
                .iter()
                .filter(|q| q.question.quiz_id == quiz_id)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        self.with(|t| {
            if t.users.iter().any(|u| u.email == user.email) {
                return Err(RepoError::UniqueViolation("users_email_key".to_string()));
            }
            let now = Utc::now();
            let created = User {
                id: t.id(),
                email: user.email,
                name: user.name,
                password_hash: user.password_hash,
                phone: user.phone,
                address: user.address,
                role: user.role,
                created_at: now,
                updated_at: now,
            };
            t.users.push(created.clone());
            Ok(created)
        })
    }

    async fn find_by_id(&self, id: i32) -> RepoResult<Option<User>> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.with(|t| t.users.iter().find(|u| u.email == email).cloned()))
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        Ok(self.with(|t| t.users.clone()))
    }

    async fn update_role(&self, id: i32, role: UserRole) -> RepoResult<Option<User>> {
        Ok(self.with(|t| {
            t.users.iter_mut().find(|u| u.id == id).map(|u| {
                u.role = role;
                u.updated_at = Utc::now();
                u.clone()
            })
        }))
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.users.len();
            let owned: Vec<i32> = t.courses.iter().filter(|c| c.created_by_id == id).map(|c| c.id).collect();
            t.users.retain(|u| u.id != id);
            t.courses.retain(|c| c.created_by_id != id);
            t.payments
                .retain(|p| p.student_id != id && !owned.contains(&p.course_id));
            t.attempts.retain(|a| a.student_id != id);
            t.users.len() != before
        }))
    }
}

#[async_trait]
impl CourseRepository for MemoryDb {
    async fn list(&self) -> RepoResult<Vec<Course>> {
        Ok(self.with(|t| t.courses.clone()))
    }

    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Course>> {
        Ok(self.with(|t| t.courses.iter().find(|c| c.id == id).cloned()))
    }

    async fn create(&self, created_by_id: i32, course: &CreateCourseRequest) -> RepoResult<Course> {
        Ok(self.with(|t| {
            let now = Utc::now();
            let created = Course {
                id: t.id(),
                title: course.title.clone(),
                description: course.description.clone(),
                price: course.price,
                tutor: course.tutor.clone(),
                whatsapp_group_link: course.whatsapp_group_link.clone(),
                zoom_link: course.zoom_link.clone(),
                image_url: course.image_url.clone(),
                created_by_id,
                created_at: now,
                updated_at: now,
            };
            t.courses.push(created.clone());
            created
        }))
    }

    async fn update(&self, id: i32, changes: &UpdateCourseRequest) -> RepoResult<Option<Course>> {
        Ok(self.with(|t| {
            t.courses.iter_mut().find(|c| c.id == id).map(|c| {
                if let Some(title) = &changes.title {
                    c.title = title.clone();
                }
                if let Some(description) = &changes.description {
                    c.description = description.clone();
                }
                if let Some(price) = changes.price {
                    c.price = price;
                }
                if let Some(tutor) = &changes.tutor {
                    c.tutor = tutor.clone();
                }
                if changes.whatsapp_group_link.is_some() {
                    c.whatsapp_group_link = changes.whatsapp_group_link.clone();
                }
                if changes.zoom_link.is_some() {
                    c.zoom_link = changes.zoom_link.clone();
                }
                if changes.image_url.is_some() {
                    c.image_url = changes.image_url.clone();
                }
                c.updated_at = Utc::now();
                c.clone()
            })
        }))
    }

    async fn delete(&self, id: i32) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.courses.len();
            t.courses.retain(|c| c.id != id);
            t.payments.retain(|p| p.course_id != id);
            t.materials.retain(|m| m.course_id != id);
            t.courses.len() != before
        }))
    }

    async fn content(&self, course_id: i32) -> RepoResult<CourseContent> {
        Ok(self.with(|t| CourseContent {
            materials: t
                .materials
                .iter()
                .filter(|m| m.course_id == course_id)
                .cloned()
                .collect(),
            quizzes: t
                .quizzes
                .iter()
                .filter(|q| q.course_id == course_id)
                .map(|q| QuizSummary {
                    id: q.id,
                    title: q.title.clone(),
                    description: q.description.clone(),
                    question_count: t.questions.iter().filter(|x| x.question.quiz_id == q.id).count() as i64,
                    created_at: q.created_at,
                })
                .collect(),
            recordings: Vec::new(),
        }))
    }
}

#[async_trait]
impl PaymentRepository for MemoryDb {
    async fn find_by_id(&self, id: i32) -> RepoResult<Option<Payment>> {
        Ok(self.payment(id))
    }

    async fn find_for_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>> {
        let mut rows = self.payments_for(student_id, course_id);
        rows.sort_by_key(|p| (!p.status.is_active(), std::cmp::Reverse(p.created_at)));
        Ok(rows.into_iter().next())
    }

    async fn find_by_receipt_url(&self, receipt_url: &str) -> RepoResult<Option<Payment>> {
        Ok(self.with(|t| t.payments.iter().find(|p| p.receipt_url == receipt_url).cloned()))
    }

    async fn list(&self, status: Option<PaymentStatus>) -> RepoResult<Vec<PaymentWithDetails>> {
        Ok(self.with(|t| {
            t.payments
                .iter()
                .filter(|p| status.map_or(true, |s| p.status == s))
                .filter_map(|p| {
                    let student = t.users.iter().find(|u| u.id == p.student_id)?;
                    let course = t.courses.iter().find(|c| c.id == p.course_id)?;
                    Some(PaymentWithDetails {
                        id: p.id,
                        student_id: p.student_id,
                        student_name: student.name.clone(),
                        student_email: student.email.clone(),
                        course_id: p.course_id,
                        course_title: course.title.clone(),
                        receipt_url: p.receipt_url.clone(),
                        status: p.status,
                        reference_number: p.reference_number.clone(),
                        created_at: p.created_at,
                        updated_at: p.updated_at,
                    })
                })
                .collect()
        }))
    }

    async fn list_for_student(&self, student_id: i32) -> RepoResult<Vec<Payment>> {
        Ok(self.with(|t| {
            t.payments
                .iter()
                .filter(|p| p.student_id == student_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_pending(&self, student_id: i32, course_id: i32, receipt_url: &str) -> RepoResult<PendingOutcome> {
        Ok(self.with(|t| {
            if let Some(active) = t
                .payments
                .iter()
                .find(|p| p.student_id == student_id && p.course_id == course_id && p.status.is_active())
            {
                return PendingOutcome::ActiveExists(active.clone());
            }

            let is_rejected = |p: &Payment| {
                p.student_id == student_id && p.course_id == course_id && p.status == PaymentStatus::Rejected
            };
            let superseded = t.payments.iter().find(|p| is_rejected(p)).cloned();
            t.payments.retain(|p| !is_rejected(p));

            let now = Utc::now();
            let payment = Payment {
                id: t.id(),
                student_id,
                course_id,
                receipt_url: receipt_url.to_string(),
                status: PaymentStatus::Pending,
                reference_number: None,
                created_at: now,
                updated_at: now,
            };
            t.payments.push(payment.clone());
            PendingOutcome::Created { payment, superseded }
        }))
    }

    async fn approve(&self, id: i32, reference_number: &str) -> RepoResult<Option<Payment>> {
        self.with(|t| {
            let pending = t
                .payments
                .iter()
                .position(|p| p.id == id && p.status == PaymentStatus::Pending);
            let Some(index) = pending else {
                return Ok(None);
            };
            if t
                .payments
                .iter()
                .any(|p| p.reference_number.as_deref() == Some(reference_number))
            {
                return Err(RepoError::UniqueViolation(REFERENCE_NUMBER_KEY.to_string()));
            }

            let payment = &mut t.payments[index];
            payment.status = PaymentStatus::Approved;
            payment.reference_number = Some(reference_number.to_string());
            payment.updated_at = Utc::now();
            Ok(Some(payment.clone()))
        })
    }

    async fn reject(&self, id: i32) -> RepoResult<Option<Payment>> {
        Ok(self.with(|t| {
            t.payments
                .iter_mut()
                .find(|p| p.id == id && p.status == PaymentStatus::Pending)
                .map(|p| {
                    p.status = PaymentStatus::Rejected;
                    p.updated_at = Utc::now();
                    p.clone()
                })
        }))
    }

    async fn find_approved_by_reference(&self, reference_number: &str) -> RepoResult<Option<ReferenceUsage>> {
        Ok(self.with(|t| {
            let payment = t.payments.iter().find(|p| {
                p.status == PaymentStatus::Approved && p.reference_number.as_deref() == Some(reference_number)
            })?;
            let student = t.users.iter().find(|u| u.id == payment.student_id)?;
            let course = t.courses.iter().find(|c| c.id == payment.course_id)?;
            Some(ReferenceUsage {
                payment_id: payment.id,
                reference_number: reference_number.to_string(),
                student_id: student.id,
                student_name: student.name.clone(),
                student_email: student.email.clone(),
                course_id: course.id,
                course_title: course.title.clone(),
                approved_at: payment.updated_at,
            })
        }))
    }

    async fn delete_enrollment(&self, student_id: i32, course_id: i32) -> RepoResult<Option<Payment>> {
        Ok(self.with(|t| {
            let rows: Vec<Payment> = t
                .payments
                .iter()
                .filter(|p| p.student_id == student_id && p.course_id == course_id)
                .cloned()
                .collect();
            let primary = rows
                .iter()
                .find(|p| p.status.is_active())
                .or_else(|| rows.first())
                .cloned()?;

            t.payments
                .retain(|p| !(p.student_id == student_id && p.course_id == course_id));
            t.remove_attempts_for_course(student_id, course_id);
            Some(primary)
        }))
    }

    async fn receipt_urls_for_user(&self, user_id: i32) -> RepoResult<Vec<String>> {
        Ok(self.with(|t| {
            let owned: Vec<i32> = t.courses.iter().filter(|c| c.created_by_id == user_id).map(|c| c.id).collect();
            t.payments
                .iter()
                .filter(|p| p.student_id == user_id || owned.contains(&p.course_id))
                .map(|p| p.receipt_url.clone())
                .collect()
        }))
    }

    async fn receipt_urls_for_course(&self, course_id: i32) -> RepoResult<Vec<String>> {
        Ok(self.with(|t| {
            t.payments
                .iter()
                .filter(|p| p.course_id == course_id)
                .map(|p| p.receipt_url.clone())
                .collect()
        }))
    }
}

#[async_trait]
impl QuizRepository for MemoryDb {
    async fn find_quiz(&self, quiz_id: i32) -> RepoResult<Option<Quiz>> {
        Ok(self.with(|t| t.quizzes.iter().find(|q| q.id == quiz_id).cloned()))
    }

    async fn questions(&self, quiz_id: i32) -> RepoResult<Vec<QuestionWithAnswers>> {
        let mut questions = self.questions_of(quiz_id);
        questions.sort_by_key(|q| q.question.position);
        Ok(questions)
    }

    async fn find_attempt(&self, student_id: i32, quiz_id: i32) -> RepoResult<Option<QuizAttempt>> {
        Ok(self.with(|t| {
            t.attempts
                .iter()
                .find(|a| a.student_id == student_id && a.quiz_id == quiz_id)
                .cloned()
        }))
    }

    async fn record_attempt(&self, student_id: i32, quiz_id: i32, grade: Grader<'_>) -> RepoResult<AttemptOutcome> {
        let mut questions = self.questions_of(quiz_id);
        questions.sort_by_key(|q| q.question.position);
        Ok(self.with(|t| {
            if t.attempts
                .iter()
                .any(|a| a.student_id == student_id && a.quiz_id == quiz_id)
            {
                return AttemptOutcome::AlreadyAttempted;
            }
            let Some(score) = grade(&questions) else {
                return AttemptOutcome::Ungradable(questions);
            };
            let attempt = QuizAttempt {
                id: t.id(),
                student_id,
                quiz_id,
                score,
                created_at: Utc::now(),
            };
            t.attempts.push(attempt.clone());
            AttemptOutcome::Recorded { attempt, questions }
        }))
    }

    async fn create_quiz(&self, course_id: i32, quiz: &CreateQuizRequest) -> RepoResult<Quiz> {
        Ok(self.with(|t| {
            let created = Quiz {
                id: t.id(),
                course_id,
                title: quiz.title.clone(),
                description: quiz.description.clone(),
                created_at: Utc::now(),
            };

            for (position, q) in quiz.questions.iter().enumerate() {
                let question_id = t.id();
                let answers = q
                    .answers
                    .iter()
                    .map(|a| Answer {
                        id: t.id(),
                        question_id,
                        text: a.text.clone(),
                        is_correct: a.is_correct,
                    })
                    .collect();
                t.questions.push(QuestionWithAnswers {
                    question: Question {
                        id: question_id,
                        quiz_id: created.id,
                        text: q.text.clone(),
                        image_url: q.image_url.clone(),
                        position: position as i32,
                    },
                    answers,
                });
            }

            t.quizzes.push(created.clone());
            created
        }))
    }

    async fn delete_quiz(&self, quiz_id: i32) -> RepoResult<bool> {
        Ok(self.with(|t| {
            let before = t.quizzes.len();
            t.quizzes.retain(|q| q.id != quiz_id);
            t.questions.retain(|q| q.question.quiz_id != quiz_id);
            t.attempts.retain(|a| a.quiz_id != quiz_id);
            t.quizzes.len() != before
        }))
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn contains(&self, url: &str) -> bool {
        self.files.lock().unwrap().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, bytes: Vec<u8>, key: &str) -> anyhow::Result<String> {
        // Let concurrent requests interleave the way real disk writes do.
        tokio::task::yield_now().await;
        let url = url_for_key(key);
        self.files.lock().unwrap().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(url);
        Ok(())
    }

    async fn read(&self, url: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.files.lock().unwrap().get(url).cloned())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub fn test_config(rate_limit: RateLimitSettings) -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/academy_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_ttl_hours: 1,
        upload_dir: "./uploads".to_string(),
        max_receipt_bytes: 1024 * 1024,
        max_request_body_bytes: 4 * 1024 * 1024,
        app_url: "http://localhost:3000".to_string(),
        cors_origin: "http://localhost:3000".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        smtp: None,
        rate_limit,
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDb>,
    pub storage: Arc<MemoryFileStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitSettings {
            capacity: 10_000.0,
            refill_per_sec: 10_000.0,
            trust_proxy: false,
            max_tracked_clients: 1_000,
        })
    }

    pub fn with_rate_limit(settings: RateLimitSettings) -> Self {
        let db = Arc::new(MemoryDb::default());
        let storage = Arc::new(MemoryFileStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let config = test_config(settings);

        // Never connected: only the thin CRUD handlers touch the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        let state = AppState {
            db: pool,
            users: db.clone(),
            courses: db.clone(),
            payments: db.clone(),
            quizzes: db.clone(),
            storage: storage.clone(),
            mailer: mailer.clone(),
            rate_limiter: Arc::new(RateLimiter::from_settings(&config.rate_limit)),
            config: Arc::new(config),
        };

        Self {
            router: build_router(state).unwrap(),
            db,
            storage,
            mailer,
        }
    }

    pub fn token(&self, user: &User) -> String {
        create_jwt(user.id, user.role, JWT_SECRET, 1).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn get(&self, path: &str, user: &User) -> (StatusCode, Value) {
        self.send(authed(Method::GET, path, user, self).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, path: &str, user: &User) -> (StatusCode, Value) {
        self.send(authed(Method::DELETE, path, user, self).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, path: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.send(
            authed(method, path, user, self)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn upload_receipt(&self, student: &User, course_id: i32, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
        self.send(
            authed(Method::POST, "/api/payments/upload", student, self)
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
                .body(Body::from(receipt_form(course_id, file_name, bytes)))
                .unwrap(),
        )
        .await
    }
}

fn authed(method: Method, path: &str, user: &User, app: &TestApp) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(user)))
}

pub fn receipt_form(course_id: i32, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"courseId\"\r\n\r\n{id}\r\n",
            b = BOUNDARY,
            id = course_id
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"receipt\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Five questions; the correct answer of each is the first one listed.
pub fn five_question_quiz() -> Value {
    let questions: Vec<Value> = (1..=5)
        .map(|n| {
            serde_json::json!({
                "text": format!("Question {}", n),
                "answers": [
                    { "text": "right", "isCorrect": true },
                    { "text": "wrong a", "isCorrect": false },
                    { "text": "wrong b", "isCorrect": false },
                    { "text": "wrong c", "isCorrect": false }
                ]
            })
        })
        .collect();
    serde_json::json!({ "title": "Week 1 revision", "questions": questions })
}
