use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{patch, post},
};

/// Manager Router Module
///
/// Mutating endpoints restricted to soldiers with `manager = true`. The
/// routes sit behind the same auth layer as the authenticated module; on top
/// of that, every handler checks the resolved soldier's manager flag and
/// answers 403 for the rank and file.
pub fn manager_routes() -> Router<AppState> {
    Router::new()
        // PATCH/DELETE /soldiers/{id}
        // Typed partial update over the mutable fields {name, age, city,
        // team, manager}; any other body field is rejected, and the manager
        // invariant is re-validated whenever `manager` or `team` changes.
        // DELETE removes the soldier and returns the deleted record.
        .route(
            "/soldiers/{id}",
            patch(handlers::update_soldier).delete(handlers::delete_soldier),
        )
        // POST /teams
        .route("/teams", post(handlers::create_team))
        // PATCH/DELETE /teams/{id}
        // Rename (the name is the sole mutable team field), or the cascading
        // transactional delete: referencing soldiers lose their team
        // reference and manager flag atomically with the team row.
        .route(
            "/teams/{id}",
            patch(handlers::update_team).delete(handlers::delete_team),
        )
}
