use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// Soldier
///
/// The canonical personnel record stored in the `soldiers` table. This is also
/// the API response shape: the password hash and the session-token set are
/// deliberately not part of the struct, so they can never be serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Soldier {
    pub id: Uuid,
    // Title-cased on write ("john doe" -> "John Doe").
    pub name: String,
    // Soldiers must be adults; enforced at validation time and by a CHECK.
    pub age: i32,
    // Unique service number, at least 7 digits.
    pub personal_number: i64,
    pub city: Option<String>,
    #[ts(type = "string")]
    pub draft_date: DateTime<Utc>,
    // Weak reference to `teams.id`; soldiers and teams load independently.
    pub team: Option<Uuid>,
    // At most one manager per team, and a manager always has a team.
    pub manager: bool,
}

/// Team
///
/// A named group from the `teams` table. Membership is derived from soldiers
/// referencing the team id; the reverse list is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

// --- Request Payloads (Input Schemas) ---

/// CreateSoldierRequest
///
/// Input payload for enlisting a new soldier (POST /soldiers). `team` is the
/// team *name*; the handler resolves it to an id and rejects unknown teams.
/// The password is hashed before it ever reaches the repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSoldierRequest {
    pub name: String,
    pub age: i32,
    pub personal_number: i64,
    pub city: Option<String>,
    #[ts(type = "string")]
    pub draft_date: DateTime<Utc>,
    pub team: Option<String>,
    #[serde(default)]
    pub manager: bool,
    pub password: String,
}

impl CreateSoldierRequest {
    /// Field-level validation, invoked explicitly before any store call.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("name must not be empty"));
        }
        if self.age < 18 {
            return Err(ApiError::validation("soldiers must be adults"));
        }
        if self.personal_number < 1_000_000 {
            return Err(ApiError::validation("personal number needs 7 digits"));
        }
        if self.password.len() < 8 {
            return Err(ApiError::validation(
                "password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

/// UpdateSoldierRequest
///
/// Typed allow-list of the mutable soldier fields. `deny_unknown_fields`
/// rejects any other key at deserialization time, replacing the original's
/// dynamic allow-list check. `team` is a team name, resolved by the handler.
///
/// `city` and `team` are nullable columns, so those fields are doubly
/// optional: absent means "leave unchanged", an explicit JSON `null` means
/// "clear the value" (outer `None` vs `Some(None)`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct UpdateSoldierRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub city: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub team: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<bool>,
}

impl UpdateSoldierRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::validation("name must not be empty"));
            }
        }
        if let Some(age) = self.age {
            if age < 18 {
                return Err(ApiError::validation("soldiers must be adults"));
            }
        }
        Ok(())
    }
}

/// CreateTeamRequest
///
/// Input payload for POST /teams. The name is title-cased and must be unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateTeamRequest {
    pub name: String,
}

impl CreateTeamRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("team name must not be empty"));
        }
        Ok(())
    }
}

/// UpdateTeamRequest
///
/// PATCH /teams/{id}. The name is the only mutable team field; anything else
/// in the body is rejected by `deny_unknown_fields`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct UpdateTeamRequest {
    pub name: String,
}

impl UpdateTeamRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("team name must not be empty"));
        }
        Ok(())
    }
}

/// LoginRequest
///
/// POST /soldiers/login body. The personal number is the login identifier.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub personal_number: i64,
    pub password: String,
}

// --- Response Schemas ---

/// LoginResponse
///
/// Successful login: the soldier record plus the freshly issued bearer token,
/// which has also been appended to the soldier's active-token set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub soldier: Soldier,
    pub token: String,
}

/// TeamSizeResponse
///
/// GET /teams/{teamName}/numOfTeamMembers output.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamSizeResponse {
    pub team: String,
    pub num_of_team_members: i64,
}

// --- Query Helpers ---

/// SortOrder
///
/// Parsed form of the Mongo-style `sortBy=1|-1` query parameter kept by the
/// sorted endpoints. Missing defaults to ascending; any other value is a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_query(sort_by: Option<i32>) -> Result<Self, ApiError> {
        match sort_by {
            None | Some(1) => Ok(SortOrder::Ascending),
            Some(-1) => Ok(SortOrder::Descending),
            Some(_) => Err(ApiError::validation("sortBy must be 1 or -1")),
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// title_case
///
/// Normalizes person/team names: first letter of each word uppercased, the
/// rest lowered ("tel aviv" -> "Tel Aviv"). Applied on every write path.
pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
