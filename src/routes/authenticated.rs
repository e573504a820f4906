use crate::{AppState, handlers};
use axum::{Router, routing::{get, post}};

/// Authenticated Router Module
///
/// Read-only queries plus session management, available to any soldier with
/// a valid session. Every handler here takes an `AuthSoldier` argument, so
/// the extractor rejects unauthenticated requests with a uniform 401 before
/// any business logic runs; the router-level auth layer in `create_router`
/// adds a second line of defense.
///
/// Static segments (me, soldiersNames, youngSoldiers, ...) are registered
/// alongside the `{id}` routes; axum's router matches static paths first.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session management ---
        // POST /soldiers/logout
        // Ends the current session only: removes exactly the presented token.
        .route("/soldiers/logout", post(handlers::logout))
        // POST /soldiers/logoutAll
        // Revokes every active session of the caller.
        .route("/soldiers/logoutAll", post(handlers::logout_all))
        // GET /soldiers/me
        // The caller's own record as resolved by the auth guard.
        .route("/soldiers/me", get(handlers::get_me))
        // --- Soldier queries ---
        // GET /soldiers
        .route("/soldiers", get(handlers::get_soldiers))
        // GET /soldiers/soldiersNames
        .route("/soldiers/soldiersNames", get(handlers::get_soldier_names))
        // GET /soldiers/youngSoldiers?skip=N
        // Soldiers drafted within the last year, 5 per page.
        .route("/soldiers/youngSoldiers", get(handlers::get_young_soldiers))
        // GET /soldiers/soldiersServiceLength?sortBy=1|-1
        // All soldiers ordered by tenure.
        .route(
            "/soldiers/soldiersServiceLength",
            get(handlers::get_soldiers_by_service_length),
        )
        // GET /soldiers/team/{teamName}
        // Derived membership of a team, by name.
        .route("/soldiers/team/{teamName}", get(handlers::get_soldiers_of_team))
        // GET /soldiers/{id}/team
        // The team a soldier belongs to.
        .route("/soldiers/{id}/team", get(handlers::get_soldiers_team))
        // GET /soldiers/{id}
        .route("/soldiers/{id}", get(handlers::get_soldier_details))
        // --- Team queries ---
        // GET /teams
        .route("/teams", get(handlers::get_teams))
        // GET /teams/{id}/numOfTeamMembers
        // The path parameter is the team *name*; the placeholder is `{id}`
        // so the template stays consistent with the sibling `/teams/{id}`.
        .route("/teams/{id}/numOfTeamMembers", get(handlers::get_team_size))
        // GET /teams/teamManager/{id}
        // The single manager of a team, 404 when the slot is vacant.
        .route("/teams/teamManager/{id}", get(handlers::get_team_manager))
        // GET /teams/managersByNumSoldiers?sortBy=1|-1
        // Managers ordered by the member count of their team.
        .route(
            "/teams/managersByNumSoldiers",
            get(handlers::get_managers_by_team_size),
        )
        // GET /teams/{id}
        .route("/teams/{id}", get(handlers::get_team_details))
}
