//! Dashboard statistics endpoint

use axum::{extract::State, Json};

use crate::{error::AppResult, models::stats::DashboardStats};

use super::{ok, ActionResponse, AdminUser};

/// Weekly growth of users, books and borrow records
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ActionResponse<DashboardStats>>> {
    let stats = state.services.stats.dashboard().await?;
    Ok(ok(stats))
}
