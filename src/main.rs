//! University library server
//!
//! REST API for catalog search, borrowing and account approval.

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unilib_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{rate_limit::RateLimiter, Services},
    AppState,
};

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("unilib_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting University Library Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let rate_limit = RateLimiter::new(&config.redis.url, config.rate_limit.clone())
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config, rate_limit);

    if services.workflow.clone().spawn_poller().is_none() {
        tracing::info!("Workflow poller disabled, waiting for /workflow/tick calls");
    }

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/sign-up", post(api::auth::sign_up))
        .route("/auth/sign-in", post(api::auth::sign_in))
        .route("/auth/me", get(api::auth::me))
        // Catalog and borrowing
        .route("/books", get(api::books::list_books))
        .route("/books/:id", get(api::books::get_book))
        .route("/books/:id/similar", get(api::books::similar_books))
        .route("/books/:id/borrow", post(api::books::borrow_book))
        .route("/me/borrowed-books", get(api::books::my_borrowed_books))
        // Administration
        .route("/admin/books", post(api::admin::create_book))
        .route("/admin/books/:id", put(api::admin::update_book))
        .route("/admin/books/:id", delete(api::admin::delete_book))
        .route("/admin/users", get(api::admin::list_users))
        .route("/admin/users/:id", delete(api::admin::delete_user))
        .route("/admin/users/:id/status", put(api::admin::update_user_status))
        .route("/admin/users/:id/role", put(api::admin::update_user_role))
        .route("/admin/borrow-records", get(api::admin::list_borrow_records))
        .route("/admin/borrow-records/:id/status", put(api::admin::update_borrow_status))
        .route("/admin/stats", get(api::stats::get_stats))
        // Assets
        .route("/assets/auth", get(api::assets::auth_parameters))
        .route("/assets/upload", post(api::assets::upload))
        // Workflow
        .route("/workflow/tick", post(api::workflow::tick))
        .route("/workflow/borrow-book", post(api::workflow::borrow_book))
        .route("/workflow/onboarding", post(api::workflow::onboarding))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
