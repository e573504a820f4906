use chrono::{Duration, Utc};
use serial_test::serial;
use sqlx::PgPool;
use squad_roster::{
    auth::hash_password,
    models::SortOrder,
    repository::{NewSoldier, PostgresRepository, Repository, SoldierChanges},
};
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        // Start every serial test from an empty store
        sqlx::query("TRUNCATE soldier_tokens, soldiers, teams CASCADE")
            .execute(&pool)
            .await
            .expect("Failed to reset test tables.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn unique_personal_number() -> i64 {
    // 7+ digits, effectively collision-free within a test run
    1_000_000 + (Uuid::new_v4().as_u128() % 1_000_000_000) as i64
}

fn new_soldier(name: &str, team: Option<Uuid>, manager: bool) -> NewSoldier {
    NewSoldier {
        name: name.to_string(),
        age: 20,
        personal_number: unique_personal_number(),
        city: None,
        draft_date: Utc::now(),
        team,
        manager,
        password_hash: hash_password("integration-pw").unwrap(),
    }
}

// --- Tests ---

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_create_and_fetch_soldier() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let created = repo
        .create_soldier(new_soldier("Roundtrip Soldier", None, false))
        .await
        .unwrap();

    let fetched = repo.get_soldier(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Roundtrip Soldier");
    assert_eq!(fetched.personal_number, created.personal_number);
    assert!(fetched.team.is_none());
    assert!(!fetched.manager);
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_duplicate_personal_number_rejected() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let first = new_soldier("First Soldier", None, false);
    let mut second = new_soldier("Second Soldier", None, false);
    second.personal_number = first.personal_number;

    repo.create_soldier(first).await.unwrap();
    let result = repo.create_soldier(second).await;

    assert!(result.is_err());
    assert_eq!(
        result.unwrap_err().message(),
        "personal number already in use"
    );
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_manager_requires_team() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let result = repo
        .create_soldier(new_soldier("Teamless Manager", None, true))
        .await;

    assert!(result.is_err());
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_update_cannot_promote_teamless_soldier() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let soldier = repo
        .create_soldier(new_soldier("Unaffiliated Soldier", None, false))
        .await
        .unwrap();

    // The invariant holds on the update path too
    let result = repo
        .update_soldier(
            soldier.id,
            SoldierChanges {
                manager: Some(true),
                ..SoldierChanges::default()
            },
        )
        .await;

    assert!(result.is_err());
    let unchanged = repo.get_soldier(soldier.id).await.unwrap().unwrap();
    assert!(!unchanged.manager);
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_update_clears_team_on_explicit_null() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let team = repo.create_team("charlie".to_string()).await.unwrap();
    let soldier = repo
        .create_soldier(new_soldier("Assigned Soldier", Some(team.id), false))
        .await
        .unwrap();

    // Some(None) unassigns; a default (outer None) change leaves it alone
    let untouched = repo
        .update_soldier(
            soldier.id,
            SoldierChanges {
                age: Some(25),
                ..SoldierChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.team, Some(team.id));

    let cleared = repo
        .update_soldier(
            soldier.id,
            SoldierChanges {
                team: Some(None),
                ..SoldierChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(cleared.team.is_none());
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_one_manager_per_team() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let team = repo.create_team("alpha".to_string()).await.unwrap();

    let manager = repo
        .create_soldier(new_soldier("First Manager", Some(team.id), true))
        .await
        .unwrap();

    // A second manager on the same team is rejected
    let result = repo
        .create_soldier(new_soldier("Second Manager", Some(team.id), true))
        .await;
    assert!(result.is_err());

    // Re-saving the existing manager is not a conflict with itself
    let updated = repo
        .update_soldier(
            manager.id,
            SoldierChanges {
                age: Some(31),
                ..SoldierChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(updated.manager);
    assert_eq!(updated.age, 31);
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_delete_team_cascades_to_soldiers() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let team = repo.create_team("bravo".to_string()).await.unwrap();
    let manager = repo
        .create_soldier(new_soldier("Team Manager", Some(team.id), true))
        .await
        .unwrap();
    let member = repo
        .create_soldier(new_soldier("Team Member", Some(team.id), false))
        .await
        .unwrap();

    let deleted = repo.delete_team(team.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, team.id);
    assert!(repo.get_team(team.id).await.unwrap().is_none());

    // Every referencing soldier lost its team, and the manager its flag
    let manager = repo.get_soldier(manager.id).await.unwrap().unwrap();
    assert!(manager.team.is_none());
    assert!(!manager.manager);

    let member = repo.get_soldier(member.id).await.unwrap().unwrap();
    assert!(member.team.is_none());
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_token_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let soldier = repo
        .create_soldier(new_soldier("Session Soldier", None, false))
        .await
        .unwrap();

    repo.add_token(soldier.id, "token-a").await.unwrap();
    repo.add_token(soldier.id, "token-b").await.unwrap();
    // Back-to-back logins within one second sign identical tokens; storing
    // the duplicate must not fail
    repo.add_token(soldier.id, "token-a").await.unwrap();

    assert!(
        repo.find_by_token(soldier.id, "token-a")
            .await
            .unwrap()
            .is_some()
    );

    // Removing one session leaves the other intact
    repo.remove_token(soldier.id, "token-a").await.unwrap();
    assert!(
        repo.find_by_token(soldier.id, "token-a")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.find_by_token(soldier.id, "token-b")
            .await
            .unwrap()
            .is_some()
    );

    repo.clear_tokens(soldier.id).await.unwrap();
    assert!(
        repo.find_by_token(soldier.id, "token-b")
            .await
            .unwrap()
            .is_none()
    );
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_find_by_credentials_uniform_failure() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let soldier = repo
        .create_soldier(new_soldier("Login Soldier", None, false))
        .await
        .unwrap();

    let found = repo
        .find_by_credentials(soldier.personal_number, "integration-pw")
        .await
        .unwrap();
    assert_eq!(found.id, soldier.id);

    // Wrong password and unknown personal number fail identically
    let wrong_pw = repo
        .find_by_credentials(soldier.personal_number, "nope")
        .await
        .unwrap_err();
    let unknown = repo
        .find_by_credentials(unique_personal_number(), "integration-pw")
        .await
        .unwrap_err();
    assert_eq!(wrong_pw, unknown);
    assert_eq!(wrong_pw.message(), "unable to login");
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_young_soldiers_pagination() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    // Six drafted this month, one veteran outside the window
    for i in 0..6 {
        let mut soldier = new_soldier(&format!("Recruit {i}"), None, false);
        soldier.draft_date = Utc::now() - Duration::days(i);
        repo.create_soldier(soldier).await.unwrap();
    }
    let mut veteran = new_soldier("Old Veteran", None, false);
    veteran.draft_date = Utc::now() - Duration::days(500);
    repo.create_soldier(veteran).await.unwrap();

    let first_page = repo.get_young_soldiers(0).await.unwrap();
    assert_eq!(first_page.len(), 5);
    // Newest draft first
    assert_eq!(first_page[0].name, "Recruit 0");

    let second_page = repo.get_young_soldiers(5).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].name, "Recruit 5");
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_service_length_ordering() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let mut veteran = new_soldier("Veteran", None, false);
    veteran.draft_date = Utc::now() - Duration::days(1000);
    repo.create_soldier(veteran).await.unwrap();

    let rookie = new_soldier("Rookie", None, false);
    repo.create_soldier(rookie).await.unwrap();

    // Ascending draft date = longest service first
    let by_service = repo
        .get_soldiers_by_service_length(SortOrder::Ascending)
        .await
        .unwrap();
    assert_eq!(by_service[0].name, "Veteran");
    assert_eq!(by_service[1].name, "Rookie");

    let reversed = repo
        .get_soldiers_by_service_length(SortOrder::Descending)
        .await
        .unwrap();
    assert_eq!(reversed[0].name, "Rookie");
}

#[test]
#[serial]
#[ignore = "requires a local Postgres (DATABASE_URL)"]
async fn test_team_aggregates() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let big = repo.create_team("big team".to_string()).await.unwrap();
    let small = repo.create_team("small team".to_string()).await.unwrap();
    // Stored title-cased
    assert_eq!(big.name, "Big Team");

    repo.create_soldier(new_soldier("Big Manager", Some(big.id), true))
        .await
        .unwrap();
    repo.create_soldier(new_soldier("Big Member A", Some(big.id), false))
        .await
        .unwrap();
    repo.create_soldier(new_soldier("Big Member B", Some(big.id), false))
        .await
        .unwrap();
    repo.create_soldier(new_soldier("Small Manager", Some(small.id), true))
        .await
        .unwrap();

    assert_eq!(repo.count_team_members(big.id).await.unwrap(), 3);
    assert_eq!(repo.count_team_members(small.id).await.unwrap(), 1);

    let manager = repo.get_team_manager(big.id).await.unwrap().unwrap();
    assert_eq!(manager.name, "Big Manager");

    // Managers ordered by their team's member count
    let managers = repo
        .get_managers_by_team_size(SortOrder::Descending)
        .await
        .unwrap();
    assert_eq!(managers.len(), 2);
    assert_eq!(managers[0].name, "Big Manager");
    assert_eq!(managers[1].name, "Small Manager");

    // Name lookup goes through the same normalization as the write path
    let by_name = repo.get_team_by_name("BIG team").await.unwrap().unwrap();
    assert_eq!(by_name.id, big.id);
}
