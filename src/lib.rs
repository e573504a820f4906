use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Manager).
pub mod routes;
use auth::AuthSoldier;
use routes::{authenticated, manager, public};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry
// point (main.rs) and the test suites.
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application from the `#[utoipa::path]` handler annotations and the
/// `ToSchema` model derives. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_soldier, handlers::login, handlers::logout, handlers::logout_all,
        handlers::get_me, handlers::get_soldiers, handlers::get_soldier_names,
        handlers::get_young_soldiers, handlers::get_soldiers_by_service_length,
        handlers::get_soldiers_of_team, handlers::get_soldiers_team,
        handlers::get_soldier_details, handlers::update_soldier, handlers::delete_soldier,
        handlers::create_team, handlers::get_teams, handlers::get_team_size,
        handlers::get_team_manager, handlers::get_managers_by_team_size,
        handlers::get_team_details, handlers::update_team, handlers::delete_team
    ),
    components(
        schemas(
            models::Soldier, models::Team, models::CreateSoldierRequest,
            models::UpdateSoldierRequest, models::CreateTeamRequest, models::UpdateTeamRequest,
            models::LoginRequest, models::LoginResponse, models::TeamSizeResponse,
        )
    ),
    tags(
        (name = "squad-roster", description = "Soldier & Team Roster API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding the application's
/// services and configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: soldiers, teams, credentials, and session tokens.
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Allow extractors (notably AuthSoldier) to selectively pull components from
// the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the protected route modules.
///
/// *Mechanism*: attempts to extract `AuthSoldier` from the request. The
/// extractor performs the full guard (bearer extraction, signature check,
/// token-set lookup) and rejects with a uniform 401 on any failure, so a
/// request that reaches the inner handler is guaranteed to carry a valid
/// session.
async fn auth_middleware(_auth: AuthSoldier, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the full routing structure, applies global and scoped
/// middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS configuration.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base router assembly. Public and protected modules share some paths
    // with different methods (e.g. POST vs GET /soldiers); axum merges the
    // method routers, and the auth layer wraps only the protected methods.
    let base_router = Router::new()
        // Documentation: auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: no middleware applied.
        .merge(public::public_routes())
        // Authenticated + manager routes: both behind the auth layer. The
        // manager-role check itself happens inside the manager handlers.
        .merge(
            authenticated::authenticated_routes()
                .merge(manager::manager_routes())
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state);

    // 3. Observability and correlation layers (applied outermost).
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID per request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle
                // in a span carrying the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes TraceLayer span creation: includes the `x-request-id` header
/// in the structured logging metadata alongside method and URI, so every log
/// line for a single request is correlated by a unique id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
