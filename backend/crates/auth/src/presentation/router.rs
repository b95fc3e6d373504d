//! Auth Router

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::application::LoginFlow;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_bearer_session;

/// Routes relative to the API prefix (`/api/v1`)
pub fn auth_router<F>(flow: Arc<F>) -> Router
where
    F: LoginFlow + Send + Sync + 'static,
{
    let state = AuthAppState { flow };

    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/users/{id}", get(handlers::get_user::<F>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_session::<F>,
        ));

    Router::new()
        .route("/otp/send", post(handlers::send_code::<F>))
        .route("/otp/verify", post(handlers::verify_code::<F>))
        .route("/auth/logout", post(handlers::logout::<F>))
        .merge(protected)
        .with_state(state)
}
