pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::AppConfig,
    handlers::{auth, content, courses, files, payments, quizzes, users},
    middleware::{
        auth::auth_middleware,
        rate_limit::{rate_limit_middleware, RateLimiter},
    },
    repositories::{CourseRepository, PaymentRepository, QuizRepository, UserRepository},
    services::{notification::Mailer, storage::FileStore},
};

#[derive(Clone)]
pub struct AppState {
    /// Used directly by the thin content CRUD handlers.
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub storage: Arc<dyn FileStore>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin == "*" {
        Ok(layer.allow_origin(Any))
    } else {
        Ok(layer.allow_origin(origin.parse::<HeaderValue>()?).allow_credentials(true))
    }
}

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let protected_api = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/payments", get(payments::list_payments))
        .route("/payments/mine", get(payments::my_payments))
        .route("/payments/upload", post(payments::upload_receipt))
        .route("/payments/verify/:reference", get(payments::verify_reference))
        .route("/payments/:id/approve", patch(payments::approve_payment))
        .route("/payments/:id/reject", patch(payments::reject_payment))
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/courses/:id/unenroll", delete(payments::unenroll))
        .route("/courses/:id/quizzes", post(quizzes::create_quiz))
        .route("/courses/:id/materials", post(content::add_material))
        .route("/courses/:id/recordings", post(content::add_recording))
        .route("/quizzes/:id", get(quizzes::get_quiz).delete(quizzes::delete_quiz))
        .route("/quizzes/:id/submit", post(quizzes::submit_quiz))
        .route("/quizzes/:id/answer", post(quizzes::answer_quiz))
        .route("/materials/:id", delete(content::delete_material))
        .route("/recordings/:id", delete(content::delete_recording))
        .route(
            "/announcements",
            get(content::list_announcements).post(content::create_announcement),
        )
        .route("/announcements/:id", delete(content::delete_announcement))
        .route(
            "/past-papers",
            get(content::list_past_papers).post(content::create_past_paper),
        )
        .route("/past-papers/:id", delete(content::delete_past_paper))
        .route("/users", get(users::list_users))
        .route("/users/:id/role", patch(users::update_role))
        .route("/users/:id", delete(users::delete_user))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(protected_api)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    let uploads = Router::new()
        .route("/uploads/*path", get(files::serve_upload))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .merge(uploads)
        .layer(cors_layer(&state.config.cors_origin)?)
        .layer(DefaultBodyLimit::max(state.config.max_request_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}
