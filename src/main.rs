use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy_backend::{
    build_router,
    config::AppConfig,
    middleware::rate_limit::RateLimiter,
    repositories::{PgCourseRepository, PgPaymentRepository, PgQuizRepository, PgUserRepository},
    services::{notification::mailer_from_settings, storage::LocalFileStore},
    utils::database::create_pool,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = std::fs::create_dir_all(&config.upload_dir) {
        tracing::warn!("Failed to create upload directory {}: {}", config.upload_dir, e);
    }

    let db = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let mailer = mailer_from_settings(config.smtp.as_ref())?;

    let rate_limiter = RateLimiter::from_settings(&config.rate_limit);

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        users: Arc::new(PgUserRepository::new(db.clone())),
        courses: Arc::new(PgCourseRepository::new(db.clone())),
        payments: Arc::new(PgPaymentRepository::new(db.clone())),
        quizzes: Arc::new(PgQuizRepository::new(db.clone())),
        storage: Arc::new(LocalFileStore::new(&config.upload_dir)),
        mailer,
        rate_limiter: Arc::new(rate_limiter),
        config: Arc::new(config),
        db,
    };

    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
