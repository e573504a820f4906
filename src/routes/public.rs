use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints accessible without a session token. Enlistment is deliberately
/// open (it is the signup path; the password is hashed before it is stored)
/// and
/// login is the token-acquisition gateway for everything else.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated probe for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /soldiers
        // Enlists a new soldier. The optional `team` body field is a team
        // name and must reference an existing team.
        .route("/soldiers", post(handlers::create_soldier))
        // POST /soldiers/login
        // Credential login; issues a bearer token and appends it to the
        // soldier's active-token set.
        .route("/soldiers/login", post(handlers::login))
}
