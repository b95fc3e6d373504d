//! Auth Middleware
//!
//! Bearer-token guard for protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use platform::bearer::bearer_token;

use crate::application::LoginFlow;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Runs full session validation and hands the claims to the handler as an
/// `Extension<SessionClaims>`
pub async fn require_bearer_session<F>(
    State(state): State<AuthAppState<F>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    F: LoginFlow + Send + Sync + 'static,
{
    let token = bearer_token(req.headers())
        .ok_or(AuthError::MissingToken)?
        .to_string();
    let claims = state.flow.authenticate(&token).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
