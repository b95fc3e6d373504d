//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::HeaderMap;
use platform::bearer::bearer_token;
use std::sync::Arc;

use crate::application::LoginFlow;
use crate::domain::value_object::{session_claims::SessionClaims, user_id::UserId};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    LogoutRequest, LogoutResponse, MeResponse, SendCodeRequest, SendCodeResponse,
    UserResponse, VerifyCodeRequest, VerifyCodeResponse,
};

/// Shared state for auth handlers
pub struct AuthAppState<F>
where
    F: LoginFlow + Send + Sync + 'static,
{
    pub flow: Arc<F>,
}

impl<F> Clone for AuthAppState<F>
where
    F: LoginFlow + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
        }
    }
}

fn invalid_body(rejection: JsonRejection) -> AuthError {
    AuthError::InvalidRequest(rejection.body_text())
}

// ============================================================================
// OTP
// ============================================================================

/// POST /api/v1/otp/send
pub async fn send_code<F>(
    State(state): State<AuthAppState<F>>,
    payload: Result<Json<SendCodeRequest>, JsonRejection>,
) -> AuthResult<Json<SendCodeResponse>>
where
    F: LoginFlow + Send + Sync + 'static,
{
    let Json(req) = payload.map_err(invalid_body)?;
    let output = state.flow.send(&req.phone_number).await?;

    Ok(Json(SendCodeResponse {
        session_handle: output.session_handle,
        expires_at: output.expires_at,
    }))
}

/// POST /api/v1/otp/verify
pub async fn verify_code<F>(
    State(state): State<AuthAppState<F>>,
    payload: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> AuthResult<Json<VerifyCodeResponse>>
where
    F: LoginFlow + Send + Sync + 'static,
{
    let Json(req) = payload.map_err(invalid_body)?;
    let output = state.flow.verify(&req.session_handle, &req.code).await?;

    Ok(Json(VerifyCodeResponse {
        token: output.token,
        token_type: "Bearer",
        expires_at: output.expires_at,
        user: UserResponse::from(&output.user),
    }))
}

// ============================================================================
// Session
// ============================================================================

/// POST /api/v1/auth/logout
pub async fn logout<F>(
    State(state): State<AuthAppState<F>>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Json<LogoutResponse>>
where
    F: LoginFlow + Send + Sync + 'static,
{
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;

    let req = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice::<LogoutRequest>(&body)
            .map_err(|e| AuthError::InvalidRequest(e.to_string()))?
    };

    let output = state.flow.logout(token, req.logout_all).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out",
        tokens_revoked: output.tokens_revoked,
    }))
}

/// GET /api/v1/auth/me (behind `require_bearer_session`)
pub async fn me(Extension(claims): Extension<SessionClaims>) -> Json<MeResponse> {
    Json(MeResponse::from(&claims))
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/v1/users/{id} (behind `require_bearer_session`)
pub async fn get_user<F>(
    State(state): State<AuthAppState<F>>,
    Path(id): Path<String>,
) -> AuthResult<Json<UserResponse>>
where
    F: LoginFlow + Send + Sync + 'static,
{
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|_| AuthError::InvalidRequest("user id must be a UUID".into()))?;
    let user = state.flow.get_user(UserId::from_uuid(uuid)).await?;

    Ok(Json(UserResponse::from(&user)))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
