//! API handlers for the library REST endpoints

pub mod admin;
pub mod assets;
pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;
pub mod stats;
pub mod workflow;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    error::AppError,
    models::user::{User, UserClaims},
    AppState,
};

/// Client address used when no proxy header is present
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// Header carrying the shared secret of the workflow endpoints
pub const WORKFLOW_TOKEN_HEADER: &str = "x-workflow-token";

/// Success envelope; failures are rendered by `AppError`
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

/// Wrap `data` in a success envelope
pub fn ok<T: Serialize>(data: T) -> Json<ActionResponse<T>> {
    Json(ActionResponse {
        success: true,
        data,
    })
}

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        // Last activity is tracked off the request path
        let users = state.services.users.clone();
        let user_id = claims.user_id();
        tokio::spawn(async move {
            if let Err(e) = users.touch_activity(user_id, Utc::now().date_naive()).await {
                tracing::warn!("Failed to record activity of {}: {}", user_id, e);
            }
        });

        Ok(AuthenticatedUser(claims))
    }
}

/// Authenticated administrator, with the role checked against the
/// current account rather than the token
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        let user = state.services.users.require_admin(claims.user_id()).await?;
        Ok(AdminUser(user))
    }
}

/// First `x-forwarded-for` entry, or the loopback address
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(DEFAULT_CLIENT_IP)
        .to_string()
}

/// Caller address for rate limiting
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers)))
    }
}

/// Caller holding the workflow cron token
pub struct WorkflowCaller;

#[async_trait]
impl FromRequestParts<AppState> for WorkflowCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(WORKFLOW_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing workflow token".to_string()))?;

        if token != state.config.workflow.cron_token {
            tracing::warn!("Rejected workflow call with an invalid token");
            return Err(AppError::Authentication("Invalid workflow token".to_string()));
        }
        Ok(WorkflowCaller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_defaults_to_loopback() {
        assert_eq!(client_ip(&HeaderMap::new()), DEFAULT_CLIENT_IP);

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_ip(&headers), DEFAULT_CLIENT_IP);
    }

    #[test]
    fn test_envelope_shape() {
        let Json(body) = ok(vec![1, 2]);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }
}
