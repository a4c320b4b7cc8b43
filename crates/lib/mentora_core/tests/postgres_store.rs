//! `PgStore` against a real PostgreSQL server.
//!
//! Set `DATABASE_URL` to run these; without it each test returns early. Every
//! test migrates into its own schema and drops it afterwards.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mentora_core::auth::lockout::{AccountGuard, LockoutPolicy};
use mentora_core::auth::session::SessionStore;
use mentora_core::auth::{AuthError, AuthService};
use mentora_core::clock::{Clock, ManualClock};
use mentora_core::config::AuthConfig;
use mentora_core::models::auth::{IdentityRecord, IdentityUpdate, NewIdentity, Role};
use mentora_core::store::{IdentityStore, PgStore, SessionRepository, StoreError};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

struct TestDb {
    admin: PgPool,
    pool: PgPool,
    schema: String,
    store: Arc<PgStore>,
}

impl TestDb {
    async fn connect() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL store test");
            return None;
        };
        let schema = format!("mentora_test_{}", Uuid::new_v4().simple());

        let admin = PgPool::connect(&url).await.expect("connect to PostgreSQL");
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await
            .expect("create schema");

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("connect schema pool");
        mentora_core::migrate::migrate(&pool)
            .await
            .expect("run migrations");

        Some(Self {
            admin,
            store: Arc::new(PgStore::new(pool.clone())),
            pool,
            schema,
        })
    }

    async fn teardown(self) {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await
            .expect("drop schema");
    }
}

/// Whole seconds so values survive the TIMESTAMPTZ round trip unchanged.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

async fn insert(store: &PgStore, email: &str, at: DateTime<Utc>) -> IdentityRecord {
    store
        .insert_identity(NewIdentity {
            id: Uuid::now_v7(),
            email: email.into(),
            name: "Alice".into(),
            password_hash: "x".into(),
            roles: vec![Role::User],
            created_at: at,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn lockout_engages_after_five_failures_and_heals() {
    let Some(db) = TestDb::connect().await else { return };
    let clock = Arc::new(ManualClock::new(start()));
    insert(&db.store, "alice@example.com", clock.now()).await;
    let guard = AccountGuard::new(
        db.store.clone(),
        clock.clone(),
        LockoutPolicy {
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(15),
        },
    );

    for attempt in 1..=5 {
        assert!(!guard.is_locked("alice@example.com").await.unwrap(), "attempt {attempt}");
        guard.record_failure("alice@example.com").await.unwrap();
        clock.advance(Duration::seconds(10));
    }
    assert!(guard.is_locked("alice@example.com").await.unwrap());
    let state = db.store.failed_attempts("alice@example.com").await.unwrap().unwrap();
    assert_eq!(state.count, 5);
    assert_eq!(state.last_failed_at, Some(start() + Duration::seconds(40)));

    // 15 minutes after the last failure the lock lifts and the counter clears.
    clock.set(start() + Duration::seconds(40) + Duration::minutes(15));
    assert!(!guard.is_locked("alice@example.com").await.unwrap());
    let state = db.store.failed_attempts("alice@example.com").await.unwrap().unwrap();
    assert_eq!(state.count, 0);
    assert_eq!(state.last_failed_at, None);

    db.teardown().await;
}

#[tokio::test]
async fn stale_failure_restarts_counter() {
    let Some(db) = TestDb::connect().await else { return };
    let t0 = start();
    insert(&db.store, "alice@example.com", t0).await;
    let window = Duration::minutes(15);

    for i in 0..3 {
        let at = t0 + Duration::minutes(i);
        db.store
            .record_failed_attempt("alice@example.com", at, at - window)
            .await
            .unwrap();
    }
    let state = db.store.failed_attempts("alice@example.com").await.unwrap().unwrap();
    assert_eq!(state.count, 3);

    // Previous failure exactly at the window start no longer counts.
    let at = t0 + Duration::minutes(2) + window;
    db.store
        .record_failed_attempt("alice@example.com", at, at - window)
        .await
        .unwrap();
    let state = db.store.failed_attempts("alice@example.com").await.unwrap().unwrap();
    assert_eq!(state.count, 1);
    assert_eq!(state.last_failed_at, Some(at));

    db.store.reset_failed_attempts("alice@example.com").await.unwrap();
    let state = db.store.failed_attempts("alice@example.com").await.unwrap().unwrap();
    assert_eq!(state.count, 0);
    assert!(db.store.failed_attempts("nobody@example.com").await.unwrap().is_none());

    db.teardown().await;
}

#[tokio::test]
async fn duplicate_email_is_reported_as_duplicate() {
    let Some(db) = TestDb::connect().await else { return };
    insert(&db.store, "alice@example.com", start()).await;

    let err = db
        .store
        .insert_identity(NewIdentity {
            id: Uuid::now_v7(),
            email: "alice@example.com".into(),
            name: "Someone Else".into(),
            password_hash: "y".into(),
            roles: vec![Role::Admin],
            created_at: start(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)), "{err:?}");

    // Matching is exact and case-sensitive.
    assert!(db.store.email_exists("alice@example.com").await.unwrap());
    assert!(!db.store.email_exists("Alice@example.com").await.unwrap());

    db.teardown().await;
}

#[tokio::test]
async fn partial_update_leaves_omitted_fields() {
    let Some(db) = TestDb::connect().await else { return };
    let rec = insert(&db.store, "alice@example.com", start()).await;
    let later = start() + Duration::hours(1);

    let renamed = db
        .store
        .update_identity(
            rec.id,
            &IdentityUpdate {
                name: Some("Alicia".into()),
                roles: None,
            },
            later,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "Alicia");
    assert_eq!(renamed.roles, vec![Role::User]);
    assert_eq!(renamed.updated_at, later);
    assert_eq!(renamed.created_at, start());

    let promoted = db
        .store
        .update_identity(
            rec.id,
            &IdentityUpdate {
                name: None,
                roles: Some(vec![Role::User, Role::Admin]),
            },
            later,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.name, "Alicia");
    assert_eq!(promoted.roles, vec![Role::User, Role::Admin]);

    let missing = db
        .store
        .update_identity(Uuid::now_v7(), &IdentityUpdate::default(), later)
        .await
        .unwrap();
    assert!(missing.is_none());

    db.teardown().await;
}

#[tokio::test]
async fn session_expiry_boundary_and_sweep() {
    let Some(db) = TestDb::connect().await else { return };
    let clock = Arc::new(ManualClock::new(start()));
    let rec = insert(&db.store, "alice@example.com", clock.now()).await;
    let sessions = SessionStore::new(db.store.clone(), clock.clone());

    let short = sessions.create(rec.id, Duration::hours(1)).await.unwrap();
    let long = sessions.create(rec.id, Duration::hours(24)).await.unwrap();
    assert!(sessions.verify(short.id).await.unwrap());

    clock.set(short.expires_at - Duration::seconds(1));
    assert!(sessions.verify(short.id).await.unwrap());

    // Not live at the instant of expiry, and swept at that same instant.
    clock.set(short.expires_at);
    assert!(!sessions.verify(short.id).await.unwrap());
    assert!(sessions.verify(long.id).await.unwrap());
    assert_eq!(sessions.sweep_expired().await.unwrap(), 1);
    assert_eq!(sessions.sweep_expired().await.unwrap(), 0);
    assert!(sessions.verify(long.id).await.unwrap());

    sessions.invalidate(long.id).await.unwrap();
    assert!(!sessions.verify(long.id).await.unwrap());
    sessions.invalidate(long.id).await.unwrap();

    db.teardown().await;
}

#[tokio::test]
async fn deleting_identity_cascades_to_sessions() {
    let Some(db) = TestDb::connect().await else { return };
    let clock = Arc::new(ManualClock::new(start()));
    let rec = insert(&db.store, "alice@example.com", clock.now()).await;
    let sessions = SessionStore::new(db.store.clone(), clock.clone());
    let session = sessions.create(rec.id, Duration::hours(1)).await.unwrap();

    assert!(db.store.delete_identity(rec.id).await.unwrap());
    assert!(!db.store.session_is_live(session.id, clock.now()).await.unwrap());
    assert!(!db.store.delete_session(session.id).await.unwrap());
    assert!(!db.store.delete_identity(rec.id).await.unwrap());

    db.teardown().await;
}

#[tokio::test]
async fn login_flow_over_postgres() {
    let Some(db) = TestDb::connect().await else { return };
    let clock = Arc::new(ManualClock::new(start()));
    let mut config = AuthConfig::new("postgres-secret-postgres-secret-pg");
    config.bcrypt_cost = 4;
    let auth = AuthService::new(db.store.clone(), clock.clone(), &config).unwrap();

    let registered = auth.register("alice@example.com", "pw123", "Alice").await.unwrap();
    assert!(matches!(
        auth.register("alice@example.com", "other", "Alice").await,
        Err(AuthError::UserExists)
    ));

    for _ in 0..5 {
        assert!(matches!(
            auth.authenticate("alice@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
    assert!(matches!(
        auth.authenticate("alice@example.com", "pw123").await,
        Err(AuthError::AccountLocked)
    ));

    clock.advance(Duration::minutes(15));
    let session = auth.authenticate("alice@example.com", "pw123").await.unwrap();
    let claims = auth.resolve_current_user(&session.token).await.unwrap();
    assert_eq!(claims.id, registered.identity.id);

    auth.logout_token(&session.token).await.unwrap();
    assert!(matches!(
        auth.resolve_current_user(&session.token).await,
        Err(AuthError::SessionExpired)
    ));

    db.teardown().await;
}
