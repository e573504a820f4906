use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Soldier, SortOrder, Team, title_case};

/// NewSoldier
///
/// Insert payload for the repository: request fields already validated and
/// normalized by the handler (team name resolved to an id, password hashed).
#[derive(Debug, Clone)]
pub struct NewSoldier {
    pub name: String,
    pub age: i32,
    pub personal_number: i64,
    pub city: Option<String>,
    pub draft_date: DateTime<Utc>,
    pub team: Option<Uuid>,
    pub manager: bool,
    pub password_hash: String,
}

/// SoldierChanges
///
/// Resolved update payload. An outer `None` means "leave unchanged"; the
/// repository folds these over the current row and re-validates the manager
/// invariant against the effective result. For the nullable `city` and
/// `team` columns, `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct SoldierChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub city: Option<Option<String>>,
    pub team: Option<Option<Uuid>>,
    pub manager: Option<bool>,
}

/// Repository Trait
///
/// Abstract contract for all persistence operations, covering both the
/// soldier and team sides of the store plus the session-token set. Handlers
/// depend only on this trait, so tests swap in mock implementations.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Soldiers ---
    async fn create_soldier(&self, soldier: NewSoldier) -> Result<Soldier, ApiError>;
    async fn get_soldier(&self, id: Uuid) -> Result<Option<Soldier>, ApiError>;
    async fn get_soldiers(&self) -> Result<Vec<Soldier>, ApiError>;
    async fn get_soldier_names(&self) -> Result<Vec<String>, ApiError>;
    /// The explicit derived-membership query; the reverse list is never stored.
    async fn get_soldiers_by_team(&self, team_id: Uuid) -> Result<Vec<Soldier>, ApiError>;
    /// Soldiers drafted within the last year, 5 per page, `skip` rows in.
    async fn get_young_soldiers(&self, skip: i64) -> Result<Vec<Soldier>, ApiError>;
    async fn get_soldiers_by_service_length(
        &self,
        order: SortOrder,
    ) -> Result<Vec<Soldier>, ApiError>;
    async fn update_soldier(
        &self,
        id: Uuid,
        changes: SoldierChanges,
    ) -> Result<Option<Soldier>, ApiError>;
    /// Returns the deleted record, or None if it never existed. Does not
    /// cascade to Team.
    async fn delete_soldier(&self, id: Uuid) -> Result<Option<Soldier>, ApiError>;

    // --- Credentials & session tokens ---
    /// One uniform authentication error for both unknown personal number and
    /// wrong password; callers must not be able to tell them apart.
    async fn find_by_credentials(
        &self,
        personal_number: i64,
        password: &str,
    ) -> Result<Soldier, ApiError>;
    /// Resolves a soldier only if the exact token string is still active.
    async fn find_by_token(
        &self,
        soldier_id: Uuid,
        token: &str,
    ) -> Result<Option<Soldier>, ApiError>;
    async fn add_token(&self, soldier_id: Uuid, token: &str) -> Result<(), ApiError>;
    async fn remove_token(&self, soldier_id: Uuid, token: &str) -> Result<(), ApiError>;
    async fn clear_tokens(&self, soldier_id: Uuid) -> Result<(), ApiError>;

    // --- Teams ---
    async fn create_team(&self, name: String) -> Result<Team, ApiError>;
    async fn get_team(&self, id: Uuid) -> Result<Option<Team>, ApiError>;
    async fn get_team_by_name(&self, name: &str) -> Result<Option<Team>, ApiError>;
    async fn get_teams(&self) -> Result<Vec<Team>, ApiError>;
    async fn rename_team(&self, id: Uuid, name: String) -> Result<Option<Team>, ApiError>;
    /// Cascading delete: clears `team` and resets `manager` on every
    /// referencing soldier and removes the team row, in one transaction.
    async fn delete_team(&self, id: Uuid) -> Result<Option<Team>, ApiError>;
    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, ApiError>;
    async fn get_team_manager(&self, team_id: Uuid) -> Result<Option<Soldier>, ApiError>;
    /// Managers ordered by the member count of their team (join + GROUP BY).
    async fn get_managers_by_team_size(&self, order: SortOrder) -> Result<Vec<Soldier>, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Fixed page size of the youngSoldiers listing.
pub const YOUNG_SOLDIERS_PAGE_SIZE: i64 = 5;

// The soldier projection used by every soldier-returning query. The password
// hash is never part of it.
const SOLDIER_COLUMNS: &str = "id, name, age, personal_number, city, draft_date, team, manager";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ensure_manager_slot
    ///
    /// Explicit validation of the manager invariants, invoked before every
    /// mutating call that touches `manager` or `team`:
    /// - a manager must have a team;
    /// - a team has at most one manager (`exclude` skips the soldier being
    ///   updated so re-saving an existing manager is not a conflict).
    ///
    /// The partial unique index in the schema backstops the same rule at the
    /// database level.
    async fn ensure_manager_slot(
        &self,
        team: Option<Uuid>,
        manager: bool,
        exclude: Option<Uuid>,
    ) -> Result<(), ApiError> {
        if !manager {
            return Ok(());
        }

        let team_id = team.ok_or_else(|| {
            ApiError::validation("a soldier cannot be a manager without a team")
        })?;

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM soldiers \
             WHERE team = $1 AND manager = TRUE AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(team_id)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(ApiError::validation("this team already has a manager"));
        }

        Ok(())
    }
}

/// True when the error is a Postgres unique-constraint violation, optionally
/// narrowed to a specific constraint name.
fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match constraint {
            Some(name) => db.constraint() == Some(name),
            None => true,
        },
        _ => false,
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_soldier
    ///
    /// Validates the manager invariant, then inserts. Duplicate personal
    /// numbers surface as a validation error rather than a raw constraint
    /// violation.
    async fn create_soldier(&self, soldier: NewSoldier) -> Result<Soldier, ApiError> {
        self.ensure_manager_slot(soldier.team, soldier.manager, None)
            .await?;

        let sql = format!(
            "INSERT INTO soldiers \
             (id, name, age, personal_number, city, draft_date, team, manager, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {SOLDIER_COLUMNS}"
        );

        sqlx::query_as::<_, Soldier>(&sql)
            .bind(Uuid::new_v4())
            .bind(&soldier.name)
            .bind(soldier.age)
            .bind(soldier.personal_number)
            .bind(&soldier.city)
            .bind(soldier.draft_date)
            .bind(soldier.team)
            .bind(soldier.manager)
            .bind(&soldier.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, Some("soldiers_personal_number_key")) {
                    ApiError::validation("personal number already in use")
                } else if is_unique_violation(&e, Some("one_manager_per_team")) {
                    // Concurrent writer won the manager slot between the
                    // ensure_manager_slot check and this insert.
                    ApiError::validation("this team already has a manager")
                } else {
                    e.into()
                }
            })
    }

    async fn get_soldier(&self, id: Uuid) -> Result<Option<Soldier>, ApiError> {
        let sql = format!("SELECT {SOLDIER_COLUMNS} FROM soldiers WHERE id = $1");
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_soldiers(&self) -> Result<Vec<Soldier>, ApiError> {
        let sql = format!("SELECT {SOLDIER_COLUMNS} FROM soldiers ORDER BY name");
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_soldier_names(&self) -> Result<Vec<String>, ApiError> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT name FROM soldiers ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_soldiers_by_team(&self, team_id: Uuid) -> Result<Vec<Soldier>, ApiError> {
        let sql = format!("SELECT {SOLDIER_COLUMNS} FROM soldiers WHERE team = $1 ORDER BY name");
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// get_young_soldiers
    ///
    /// Soldiers whose draft date falls within the last year, most recent
    /// first, paginated by a raw row offset.
    async fn get_young_soldiers(&self, skip: i64) -> Result<Vec<Soldier>, ApiError> {
        let sql = format!(
            "SELECT {SOLDIER_COLUMNS} FROM soldiers \
             WHERE draft_date >= NOW() - INTERVAL '1 year' \
             ORDER BY draft_date DESC \
             LIMIT $1 OFFSET $2"
        );
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(YOUNG_SOLDIERS_PAGE_SIZE)
            .bind(skip.max(0))
            .fetch_all(&self.pool)
            .await?)
    }

    /// get_soldiers_by_service_length
    ///
    /// Ascending = earliest draft date first, i.e. longest-serving soldiers
    /// lead the list. The direction keyword comes from SortOrder, never from
    /// client input directly.
    async fn get_soldiers_by_service_length(
        &self,
        order: SortOrder,
    ) -> Result<Vec<Soldier>, ApiError> {
        let sql = format!(
            "SELECT {SOLDIER_COLUMNS} FROM soldiers ORDER BY draft_date {}",
            order.sql()
        );
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// update_soldier
    ///
    /// Read-modify-write: folds the changes over the current row, re-checks
    /// the manager invariant against the effective (team, manager) pair, and
    /// persists. Returns None when the soldier does not exist.
    async fn update_soldier(
        &self,
        id: Uuid,
        changes: SoldierChanges,
    ) -> Result<Option<Soldier>, ApiError> {
        let Some(current) = self.get_soldier(id).await? else {
            return Ok(None);
        };

        let name = changes.name.unwrap_or(current.name);
        let age = changes.age.unwrap_or(current.age);
        let city = changes.city.unwrap_or(current.city);
        let team = changes.team.unwrap_or(current.team);
        let manager = changes.manager.unwrap_or(current.manager);

        self.ensure_manager_slot(team, manager, Some(id)).await?;

        let sql = format!(
            "UPDATE soldiers \
             SET name = $2, age = $3, city = $4, team = $5, manager = $6 \
             WHERE id = $1 \
             RETURNING {SOLDIER_COLUMNS}"
        );

        let updated = sqlx::query_as::<_, Soldier>(&sql)
            .bind(id)
            .bind(&name)
            .bind(age)
            .bind(&city)
            .bind(team)
            .bind(manager)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, Some("one_manager_per_team")) {
                    ApiError::validation("this team already has a manager")
                } else {
                    e.into()
                }
            })?;

        Ok(updated)
    }

    /// delete_soldier
    ///
    /// The soldier's token rows go with it (ON DELETE CASCADE); teams are
    /// untouched.
    async fn delete_soldier(&self, id: Uuid) -> Result<Option<Soldier>, ApiError> {
        let sql = format!("DELETE FROM soldiers WHERE id = $1 RETURNING {SOLDIER_COLUMNS}");
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // --- Credentials & session tokens ---

    /// find_by_credentials
    ///
    /// Both failure causes (unknown personal number, wrong password) collapse
    /// into the same error and the same debug log line, so neither responses
    /// nor shipped logs can be used to enumerate personal numbers.
    async fn find_by_credentials(
        &self,
        personal_number: i64,
        password: &str,
    ) -> Result<Soldier, ApiError> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, password_hash FROM soldiers WHERE personal_number = $1",
        )
        .bind(personal_number)
        .fetch_optional(&self.pool)
        .await?;

        let verified = match row {
            Some((id, hash)) if crate::auth::verify_password(&hash, password) => Some(id),
            _ => None,
        };

        let Some(id) = verified else {
            tracing::debug!("login failed");
            return Err(ApiError::bad_credentials());
        };

        self.get_soldier(id)
            .await?
            .ok_or_else(ApiError::bad_credentials)
    }

    async fn find_by_token(
        &self,
        soldier_id: Uuid,
        token: &str,
    ) -> Result<Option<Soldier>, ApiError> {
        let sql = format!(
            "SELECT s.id, s.name, s.age, s.personal_number, s.city, s.draft_date, s.team, s.manager \
             FROM soldiers s \
             JOIN soldier_tokens t ON t.soldier_id = s.id \
             WHERE s.id = $1 AND t.token = $2"
        );
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(soldier_id)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// add_token
    ///
    /// Idempotent: the claims carry second-resolution timestamps, so two
    /// logins within the same second sign identical tokens, and the second
    /// insert must not trip the composite PK.
    async fn add_token(&self, soldier_id: Uuid, token: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO soldier_tokens (soldier_id, token) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(soldier_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// remove_token
    ///
    /// Removes exactly one session; other active tokens stay valid.
    async fn remove_token(&self, soldier_id: Uuid, token: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM soldier_tokens WHERE soldier_id = $1 AND token = $2")
            .bind(soldier_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_tokens(&self, soldier_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM soldier_tokens WHERE soldier_id = $1")
            .bind(soldier_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Teams ---

    async fn create_team(&self, name: String) -> Result<Team, ApiError> {
        sqlx::query_as::<_, Team>("INSERT INTO teams (id, name) VALUES ($1, $2) RETURNING id, name")
            .bind(Uuid::new_v4())
            .bind(title_case(&name))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, Some("teams_name_key")) {
                    ApiError::validation("team name already exists")
                } else {
                    e.into()
                }
            })
    }

    async fn get_team(&self, id: Uuid) -> Result<Option<Team>, ApiError> {
        Ok(
            sqlx::query_as::<_, Team>("SELECT id, name FROM teams WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Lookup by the title-cased form, since that is what gets stored.
    async fn get_team_by_name(&self, name: &str) -> Result<Option<Team>, ApiError> {
        Ok(
            sqlx::query_as::<_, Team>("SELECT id, name FROM teams WHERE name = $1")
                .bind(title_case(name))
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_teams(&self) -> Result<Vec<Team>, ApiError> {
        Ok(
            sqlx::query_as::<_, Team>("SELECT id, name FROM teams ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn rename_team(&self, id: Uuid, name: String) -> Result<Option<Team>, ApiError> {
        sqlx::query_as::<_, Team>("UPDATE teams SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(title_case(&name))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, Some("teams_name_key")) {
                    ApiError::validation("team name already exists")
                } else {
                    e.into()
                }
            })
    }

    /// delete_team
    ///
    /// The one multi-row mutation in the system. The cascade (clear `team`,
    /// reset `manager` on every referencing soldier) and the team delete
    /// commit together, so no soldier can be observed referencing a deleted
    /// team and no dangling manager flags survive a partial failure.
    async fn delete_team(&self, id: Uuid) -> Result<Option<Team>, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::from)?;

        sqlx::query("UPDATE soldiers SET team = NULL, manager = FALSE WHERE team = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::from)?;

        let team =
            sqlx::query_as::<_, Team>("DELETE FROM teams WHERE id = $1 RETURNING id, name")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(ApiError::from)?;

        tx.commit().await.map_err(ApiError::from)?;
        Ok(team)
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, ApiError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM soldiers WHERE team = $1")
                .bind(team_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get_team_manager(&self, team_id: Uuid) -> Result<Option<Soldier>, ApiError> {
        let sql =
            format!("SELECT {SOLDIER_COLUMNS} FROM soldiers WHERE team = $1 AND manager = TRUE");
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// get_managers_by_team_size
    ///
    /// Relational replacement for the original aggregation pipeline: group
    /// soldiers by team for the member counts, then order the managers by
    /// their team's count.
    async fn get_managers_by_team_size(&self, order: SortOrder) -> Result<Vec<Soldier>, ApiError> {
        let sql = format!(
            "SELECT s.id, s.name, s.age, s.personal_number, s.city, s.draft_date, s.team, s.manager \
             FROM soldiers s \
             JOIN (SELECT team, COUNT(*) AS members FROM soldiers WHERE team IS NOT NULL GROUP BY team) m \
               ON s.team = m.team \
             WHERE s.manager = TRUE \
             ORDER BY m.members {}",
            order.sql()
        );
        Ok(sqlx::query_as::<_, Soldier>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}
