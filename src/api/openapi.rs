//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, assets, auth, books, health, stats, workflow};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "University Library API",
        version = "1.0.0",
        description = "Catalog, borrowing and account approval for a university library",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::sign_up,
        auth::sign_in,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::similar_books,
        books::borrow_book,
        books::my_borrowed_books,
        // Admin
        admin::create_book,
        admin::update_book,
        admin::delete_book,
        admin::list_users,
        admin::update_user_status,
        admin::update_user_role,
        admin::delete_user,
        admin::list_borrow_records,
        admin::update_borrow_status,
        stats::get_stats,
        // Assets
        assets::auth_parameters,
        assets::upload,
        // Workflow
        workflow::tick,
        workflow::borrow_book,
        workflow::onboarding,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookForm,
            crate::models::query::ListQuery,
            crate::models::query::PageMetadata,
            crate::models::query::SortOption,
            // Users
            crate::models::user::User,
            crate::models::user::UserWithBorrows,
            crate::models::user::UserQuery,
            crate::models::user::UserStatus,
            crate::models::user::UserRole,
            crate::models::user::SignUpForm,
            crate::models::user::SignInForm,
            crate::models::user::AuthResponse,
            crate::models::user::UpdateUserStatus,
            crate::models::user::UpdateUserRole,
            // Borrowing
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowedBook,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::UpdateBorrowStatus,
            // Stats
            crate::models::stats::DashboardStats,
            crate::models::stats::StatEntry,
            // Assets
            crate::models::asset::AssetAuth,
            crate::models::asset::UploadedAsset,
            crate::models::asset::AssetUploadForm,
            // Workflow
            crate::models::workflow::BorrowReminderPayload,
            crate::models::workflow::OnboardingPayload,
            crate::models::workflow::TickReport,
            crate::models::workflow::JobKind,
            crate::models::workflow::JobStatus,
            workflow::EnqueuedJob,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Sign-up and sign-in"),
        (name = "books", description = "Catalog search and borrowing"),
        (name = "admin", description = "Catalog, account and borrow record administration"),
        (name = "assets", description = "File uploads"),
        (name = "workflow", description = "Durable notification workflows")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
