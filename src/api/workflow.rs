//! Workflow endpoints, called by the scheduler with the shared token

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::workflow::{BorrowReminderPayload, OnboardingPayload, TickReport},
};

use super::{ok, ActionResponse, WorkflowCaller};

#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueuedJob {
    pub job_id: Uuid,
}

/// Run every due workflow step
#[utoipa::path(
    post,
    path = "/workflow/tick",
    tag = "workflow",
    params(("x-workflow-token" = String, Header, description = "Workflow token")),
    responses(
        (status = 200, description = "Tick report", body = TickReport),
        (status = 401, description = "Invalid workflow token", body = crate::error::ErrorResponse)
    )
)]
pub async fn tick(
    State(state): State<crate::AppState>,
    _caller: WorkflowCaller,
) -> AppResult<Json<ActionResponse<TickReport>>> {
    let report = state.services.workflow.run_due().await?;
    Ok(ok(report))
}

/// Start the reminder sequence of a borrow
#[utoipa::path(
    post,
    path = "/workflow/borrow-book",
    tag = "workflow",
    params(("x-workflow-token" = String, Header, description = "Workflow token")),
    request_body = BorrowReminderPayload,
    responses(
        (status = 202, description = "Workflow started", body = EnqueuedJob),
        (status = 401, description = "Invalid workflow token", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    _caller: WorkflowCaller,
    Json(payload): Json<BorrowReminderPayload>,
) -> AppResult<(StatusCode, Json<ActionResponse<EnqueuedJob>>)> {
    let job = state.services.workflow.start_borrow_reminders(&payload).await?;
    Ok((StatusCode::ACCEPTED, ok(EnqueuedJob { job_id: job.id })))
}

/// Start the onboarding sequence of a new account
#[utoipa::path(
    post,
    path = "/workflow/onboarding",
    tag = "workflow",
    params(("x-workflow-token" = String, Header, description = "Workflow token")),
    request_body = OnboardingPayload,
    responses(
        (status = 202, description = "Workflow started", body = EnqueuedJob),
        (status = 401, description = "Invalid workflow token", body = crate::error::ErrorResponse)
    )
)]
pub async fn onboarding(
    State(state): State<crate::AppState>,
    _caller: WorkflowCaller,
    Json(payload): Json<OnboardingPayload>,
) -> AppResult<(StatusCode, Json<ActionResponse<EnqueuedJob>>)> {
    let job = state.services.workflow.start_onboarding(&payload).await?;
    Ok((StatusCode::ACCEPTED, ok(EnqueuedJob { job_id: job.id })))
}
