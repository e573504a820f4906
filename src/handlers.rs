use crate::{
    AppState, auth,
    auth::AuthSoldier,
    error::ApiError,
    extract::Json,
    models::{
        CreateSoldierRequest, CreateTeamRequest, LoginRequest, LoginResponse, Soldier, SortOrder,
        Team, TeamSizeResponse, UpdateSoldierRequest, UpdateTeamRequest, title_case,
    },
    repository::{NewSoldier, SoldierChanges},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Parameter Structs ---

/// PageQuery
///
/// Pagination input for the youngSoldiers listing. `skip` is a raw row
/// offset; the page size is fixed at 5.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub skip: Option<i64>,
}

/// SortQuery
///
/// Mongo-style sort direction kept for API compatibility: 1 ascending,
/// -1 descending. Anything else is a 400.
#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SortQuery {
    pub sort_by: Option<i32>,
}

// --- Helpers ---

/// Resolves a team name from a request body to its record. Soldiers may only
/// reference teams that already exist.
async fn resolve_team(state: &AppState, name: &str) -> Result<Team, ApiError> {
    state.repo.get_team_by_name(name).await?.ok_or_else(|| {
        ApiError::not_found("team does not exist; create the team before assigning soldiers to it")
    })
}

// --- Soldier Handlers ---

/// create_soldier
///
/// [Public Route] Enlists a new soldier. This is the signup-style insert: the
/// password is hashed before it reaches the repository, names are
/// title-cased, and the optional `team` field carries a team *name* that must
/// already exist. The manager invariant is re-checked by the repository.
#[utoipa::path(
    post,
    path = "/soldiers",
    request_body = CreateSoldierRequest,
    responses(
        (status = 201, description = "Created", body = Soldier),
        (status = 400, description = "Validation failure"),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn create_soldier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSoldierRequest>,
) -> Result<(StatusCode, Json<Soldier>), ApiError> {
    payload.validate()?;

    let team = match &payload.team {
        Some(name) => Some(resolve_team(&state, name).await?.id),
        None => None,
    };

    let soldier = state
        .repo
        .create_soldier(NewSoldier {
            name: title_case(&payload.name),
            age: payload.age,
            personal_number: payload.personal_number,
            city: payload.city.as_deref().map(title_case),
            draft_date: payload.draft_date,
            team,
            manager: payload.manager,
            password_hash: auth::hash_password(&payload.password)?,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(soldier)))
}

/// login
///
/// [Public Route] Credential login. On success a new signed token is issued
/// and appended to the soldier's active-token set; the response carries both
/// the soldier and the token. Unknown personal number and wrong password
/// produce the same 401.
#[utoipa::path(
    post,
    path = "/soldiers/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let soldier = state
        .repo
        .find_by_credentials(payload.personal_number, &payload.password)
        .await?;

    let token = auth::issue_token(soldier.id, &state.config.jwt_secret)?;
    state.repo.add_token(soldier.id, &token).await?;

    Ok(Json(LoginResponse { soldier, token }))
}

/// logout
///
/// [Authenticated Route] Ends the current session only: removes exactly the
/// token this request authenticated with, leaving other sessions intact.
#[utoipa::path(
    post,
    path = "/soldiers/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    AuthSoldier { soldier, token }: AuthSoldier,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.repo.remove_token(soldier.id, &token).await?;
    Ok(StatusCode::OK)
}

/// logout_all
///
/// [Authenticated Route] Revokes every active session of the caller.
#[utoipa::path(
    post,
    path = "/soldiers/logoutAll",
    responses((status = 200, description = "All sessions revoked"))
)]
pub async fn logout_all(
    AuthSoldier { soldier, .. }: AuthSoldier,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.repo.clear_tokens(soldier.id).await?;
    Ok(StatusCode::OK)
}

/// get_me
///
/// [Authenticated Route] The caller's own record, exactly as the auth guard
/// resolved it.
#[utoipa::path(
    get,
    path = "/soldiers/me",
    responses((status = 200, description = "Caller's record", body = Soldier))
)]
pub async fn get_me(AuthSoldier { soldier, .. }: AuthSoldier) -> Json<Soldier> {
    Json(soldier)
}

/// get_soldiers
///
/// [Authenticated Route] Every soldier on record. An empty store answers 404,
/// matching the behavior clients already depend on.
#[utoipa::path(
    get,
    path = "/soldiers",
    responses(
        (status = 200, description = "All soldiers", body = [Soldier]),
        (status = 404, description = "No soldiers in database")
    )
)]
pub async fn get_soldiers(
    _auth: AuthSoldier,
    State(state): State<AppState>,
) -> Result<Json<Vec<Soldier>>, ApiError> {
    let soldiers = state.repo.get_soldiers().await?;
    if soldiers.is_empty() {
        return Err(ApiError::not_found("no soldiers in database"));
    }
    Ok(Json(soldiers))
}

/// get_soldier_names
///
/// [Authenticated Route] Just the names, for pickers and rosters.
#[utoipa::path(
    get,
    path = "/soldiers/soldiersNames",
    responses((status = 200, description = "Soldier names", body = [String]))
)]
pub async fn get_soldier_names(
    _auth: AuthSoldier,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.repo.get_soldier_names().await?))
}

/// get_young_soldiers
///
/// [Authenticated Route] Soldiers drafted within the last year, newest first,
/// five per page; `skip` advances pages.
#[utoipa::path(
    get,
    path = "/soldiers/youngSoldiers",
    params(PageQuery),
    responses((status = 200, description = "Recently drafted soldiers", body = [Soldier]))
)]
pub async fn get_young_soldiers(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Soldier>>, ApiError> {
    let soldiers = state
        .repo
        .get_young_soldiers(page.skip.unwrap_or(0))
        .await?;
    Ok(Json(soldiers))
}

/// get_soldiers_by_service_length
///
/// [Authenticated Route] All soldiers ordered by tenure. sortBy=1 puts the
/// longest-serving (earliest draft date) first.
#[utoipa::path(
    get,
    path = "/soldiers/soldiersServiceLength",
    params(SortQuery),
    responses(
        (status = 200, description = "Soldiers by tenure", body = [Soldier]),
        (status = 400, description = "Invalid sortBy")
    )
)]
pub async fn get_soldiers_by_service_length(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Query(sort): Query<SortQuery>,
) -> Result<Json<Vec<Soldier>>, ApiError> {
    let order = SortOrder::from_query(sort.sort_by)?;
    Ok(Json(state.repo.get_soldiers_by_service_length(order).await?))
}

/// get_soldiers_of_team
///
/// [Authenticated Route] Derived team membership, looked up by team name.
#[utoipa::path(
    get,
    path = "/soldiers/team/{teamName}",
    params(("teamName" = String, Path, description = "Team name")),
    responses(
        (status = 200, description = "Soldiers of the team", body = [Soldier]),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn get_soldiers_of_team(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<Json<Vec<Soldier>>, ApiError> {
    let team = resolve_team(&state, &team_name).await?;
    Ok(Json(state.repo.get_soldiers_by_team(team.id).await?))
}

/// get_soldiers_team
///
/// [Authenticated Route] The team a soldier belongs to, or 404 when the
/// soldier is unknown or unassigned.
#[utoipa::path(
    get,
    path = "/soldiers/{id}/team",
    params(("id" = Uuid, Path, description = "Soldier ID")),
    responses(
        (status = 200, description = "The soldier's team", body = Team),
        (status = 404, description = "Unknown soldier or no team")
    )
)]
pub async fn get_soldiers_team(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(soldier_id): Path<Uuid>,
) -> Result<Json<Team>, ApiError> {
    let soldier = state
        .repo
        .get_soldier(soldier_id)
        .await?
        .ok_or_else(|| ApiError::not_found("soldier doesn't exist in database"))?;

    let team_id = soldier
        .team
        .ok_or_else(|| ApiError::not_found("soldier has no team"))?;

    let team = state
        .repo
        .get_team(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("team doesn't exist in database"))?;

    Ok(Json(team))
}

/// get_soldier_details
///
/// [Authenticated Route] A single soldier by id.
#[utoipa::path(
    get,
    path = "/soldiers/{id}",
    params(("id" = Uuid, Path, description = "Soldier ID")),
    responses(
        (status = 200, description = "Found", body = Soldier),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_soldier_details(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Soldier>, ApiError> {
    state
        .repo
        .get_soldier(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("soldier doesn't exist in database"))
}

/// update_soldier
///
/// [Manager Route] Applies a typed partial update. Unknown body fields are
/// already rejected at deserialization; the repository re-validates the
/// manager invariant when `manager` or `team` changes.
#[utoipa::path(
    patch,
    path = "/soldiers/{id}",
    params(("id" = Uuid, Path, description = "Soldier ID")),
    request_body = UpdateSoldierRequest,
    responses(
        (status = 200, description = "Updated", body = Soldier),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Not a manager"),
        (status = 404, description = "Unknown soldier or team")
    )
)]
pub async fn update_soldier(
    auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSoldierRequest>,
) -> Result<Json<Soldier>, ApiError> {
    if !auth.soldier.manager {
        return Err(ApiError::not_manager());
    }
    payload.validate()?;

    // An explicit `"team": null` unassigns the soldier; an absent field
    // leaves the assignment alone.
    let team = match &payload.team {
        Some(Some(name)) => Some(Some(resolve_team(&state, name).await?.id)),
        Some(None) => Some(None),
        None => None,
    };

    let changes = SoldierChanges {
        name: payload.name.as_deref().map(title_case),
        age: payload.age,
        city: payload
            .city
            .as_ref()
            .map(|city| city.as_deref().map(title_case)),
        team,
        manager: payload.manager,
    };

    state
        .repo
        .update_soldier(id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("soldier doesn't exist in database"))
}

/// delete_soldier
///
/// [Manager Route] Removes a soldier and returns the deleted record. Tokens
/// go with the row; teams are untouched.
#[utoipa::path(
    delete,
    path = "/soldiers/{id}",
    params(("id" = Uuid, Path, description = "Soldier ID")),
    responses(
        (status = 200, description = "Deleted", body = Soldier),
        (status = 403, description = "Not a manager"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_soldier(
    auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Soldier>, ApiError> {
    if !auth.soldier.manager {
        return Err(ApiError::not_manager());
    }
    state
        .repo
        .delete_soldier(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("soldier doesn't exist in database"))
}

// --- Team Handlers ---

/// create_team
///
/// [Manager Route] Creates a named team. Names are title-cased and unique.
#[utoipa::path(
    post,
    path = "/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Created", body = Team),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Not a manager")
    )
)]
pub async fn create_team(
    auth: AuthSoldier,
    State(state): State<AppState>,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    if !auth.soldier.manager {
        return Err(ApiError::not_manager());
    }
    payload.validate()?;

    let team = state.repo.create_team(payload.name).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// get_teams
///
/// [Authenticated Route] Every team. 404 with an empty store, matching the
/// soldiers listing.
#[utoipa::path(
    get,
    path = "/teams",
    responses(
        (status = 200, description = "All teams", body = [Team]),
        (status = 404, description = "No teams in database")
    )
)]
pub async fn get_teams(
    _auth: AuthSoldier,
    State(state): State<AppState>,
) -> Result<Json<Vec<Team>>, ApiError> {
    let teams = state.repo.get_teams().await?;
    if teams.is_empty() {
        return Err(ApiError::not_found("no teams in database"));
    }
    Ok(Json(teams))
}

/// get_team_size
///
/// [Authenticated Route] How many soldiers reference the named team.
#[utoipa::path(
    get,
    path = "/teams/{id}/numOfTeamMembers",
    params(("id" = String, Path, description = "Team name")),
    responses(
        (status = 200, description = "Member count", body = TeamSizeResponse),
        (status = 404, description = "Unknown team")
    )
)]
pub async fn get_team_size(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<Json<TeamSizeResponse>, ApiError> {
    let team = resolve_team(&state, &team_name).await?;
    let num_of_team_members = state.repo.count_team_members(team.id).await?;
    Ok(Json(TeamSizeResponse {
        team: team.name,
        num_of_team_members,
    }))
}

/// get_team_manager
///
/// [Authenticated Route] The single manager of a team, or 404 when the
/// manager slot is vacant.
#[utoipa::path(
    get,
    path = "/teams/teamManager/{id}",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "The manager", body = Soldier),
        (status = 404, description = "Unknown team or no manager")
    )
)]
pub async fn get_team_manager(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Soldier>, ApiError> {
    state
        .repo
        .get_team(team_id)
        .await?
        .ok_or_else(|| ApiError::not_found("team doesn't exist in database"))?;

    state
        .repo
        .get_team_manager(team_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("this team does not currently have a manager"))
}

/// get_managers_by_team_size
///
/// [Authenticated Route] All managers ordered by the size of their team.
#[utoipa::path(
    get,
    path = "/teams/managersByNumSoldiers",
    params(SortQuery),
    responses(
        (status = 200, description = "Managers by team size", body = [Soldier]),
        (status = 400, description = "Invalid sortBy")
    )
)]
pub async fn get_managers_by_team_size(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Query(sort): Query<SortQuery>,
) -> Result<Json<Vec<Soldier>>, ApiError> {
    let order = SortOrder::from_query(sort.sort_by)?;
    Ok(Json(state.repo.get_managers_by_team_size(order).await?))
}

/// get_team_details
///
/// [Authenticated Route] A single team by id.
#[utoipa::path(
    get,
    path = "/teams/{id}",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Found", body = Team),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_team_details(
    _auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>, ApiError> {
    state
        .repo
        .get_team(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("team doesn't exist in database"))
}

/// update_team
///
/// [Manager Route] Renames a team; the name is the only mutable field.
#[utoipa::path(
    patch,
    path = "/teams/{id}",
    params(("id" = Uuid, Path, description = "Team ID")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Renamed", body = Team),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Not a manager"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_team(
    auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    if !auth.soldier.manager {
        return Err(ApiError::not_manager());
    }
    payload.validate()?;

    state
        .repo
        .rename_team(id, payload.name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("team doesn't exist in database"))
}

/// delete_team
///
/// [Manager Route] Deletes a team with the full cascade: every referencing
/// soldier loses its team reference and, if it was the manager, the manager
/// flag. Returns the deleted team.
#[utoipa::path(
    delete,
    path = "/teams/{id}",
    params(("id" = Uuid, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Deleted", body = Team),
        (status = 403, description = "Not a manager"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_team(
    auth: AuthSoldier,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>, ApiError> {
    if !auth.soldier.manager {
        return Err(ApiError::not_manager());
    }
    state
        .repo
        .delete_team(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("team doesn't exist in database"))
}
