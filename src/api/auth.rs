//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        user::{AuthResponse, SignInForm, SignUpForm},
        User,
    },
};

use super::{ok, ActionResponse, AuthenticatedUser, ClientIp};

/// Create an account; it stays PENDING until an admin approves it
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    tag = "auth",
    request_body = SignUpForm,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "User already exists", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_up(
    State(state): State<crate::AppState>,
    ClientIp(ip): ClientIp,
    Json(form): Json<SignUpForm>,
) -> AppResult<(StatusCode, Json<ActionResponse<AuthResponse>>)> {
    state.services.rate_limit.check(&ip).await?;

    let response = state.services.users.sign_up(form).await?;
    Ok((StatusCode::CREATED, ok(response)))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = "auth",
    request_body = SignInForm,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_in(
    State(state): State<crate::AppState>,
    ClientIp(ip): ClientIp,
    Json(form): Json<SignInForm>,
) -> AppResult<Json<ActionResponse<AuthResponse>>> {
    state.services.rate_limit.check(&ip).await?;

    let response = state.services.users.sign_in(form).await?;
    Ok(ok(response))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ActionResponse<User>>> {
    let user = state.services.users.get_by_id(claims.user_id()).await?;
    Ok(ok(user))
}
