#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use gymflow_be::AppError;
use gymflow_be::EngineError;
use gymflow_be::database::init_database;
use gymflow_be::database::models::{Actor, RequestPriority, RescheduleInput, StaffRole, SwapType};
use gymflow_be::database::repositories::{
    RescheduleRepository, SqliteScheduleService, SqliteStaffDirectory,
};
use gymflow_be::services::NotificationHub;
use gymflow_be::{Config, RescheduleEngine};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-key-that-is-long-enough";

// Test database wrapper
pub struct TestDb {
    pub pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let database_url = format!("sqlite:{}/test.db", temp_dir.path().display());
        let pool = init_database(&database_url).await?;

        Ok(TestDb {
            pool,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired engine over a fresh database, plus one branch to play in.
pub struct TestEnv {
    pub db: TestDb,
    pub engine: RescheduleEngine,
    pub hub: NotificationHub,
    pub repo: RescheduleRepository,
    pub branch_id: Uuid,
}

impl TestEnv {
    pub async fn new() -> Result<Self> {
        let db = TestDb::new().await?;
        let pool = db.pool.clone();

        let repo = RescheduleRepository::new(pool.clone());
        let hub = NotificationHub::new(64);
        let engine = RescheduleEngine::new(
            repo.clone(),
            Arc::new(SqliteStaffDirectory::new(pool.clone())),
            Arc::new(SqliteScheduleService::new(pool.clone())),
            hub.clone(),
            24,
        );

        let branch_id = create_branch(&pool, "Downtown").await?;

        Ok(TestEnv {
            db,
            engine,
            hub,
            repo,
            branch_id,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// A staff member of this env's branch, returned as an acting identity.
    pub async fn staff(&self, name: &str, role: StaffRole) -> Result<Actor> {
        let staff_id = create_staff(self.pool(), name, role.clone()).await?;
        join_branch(self.pool(), staff_id, self.branch_id).await?;
        Ok(Actor {
            staff_id,
            role,
            branch_ids: vec![self.branch_id],
        })
    }

    /// A shift in this env's branch starting `start_in_hours` from now.
    pub async fn shift(&self, title: &str, start_in_hours: i64, len_hours: i64) -> Result<Uuid> {
        let start = Utc::now() + Duration::hours(start_in_hours);
        create_shift(
            self.pool(),
            self.branch_id,
            title,
            start,
            start + Duration::hours(len_hours),
        )
        .await
    }

    pub async fn assign(&self, staff_id: Uuid, shift_id: Uuid) -> Result<()> {
        assign_shift(self.pool(), staff_id, shift_id).await
    }
}

pub async fn create_branch(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO branches (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn create_staff(pool: &SqlitePool, name: &str, role: StaffRole) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO staff (id, name, email, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(format!("{}@gymflow.test", id))
    .bind(role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn join_branch(pool: &SqlitePool, staff_id: Uuid, branch_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO staff_branches (staff_id, branch_id) VALUES (?, ?)")
        .bind(staff_id)
        .bind(branch_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn create_shift(
    pool: &SqlitePool,
    branch_id: Uuid,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO shifts (id, branch_id, title, start_time, end_time, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(branch_id)
    .bind(title)
    .bind(start)
    .bind(end)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn assign_shift(pool: &SqlitePool, staff_id: Uuid, shift_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO shift_assignments (shift_id, staff_id, status) VALUES (?, ?, 'committed')")
        .bind(shift_id)
        .bind(staff_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// A valid SWAP input: offer `source`, take `target_shift`, expiring 24h out.
pub fn swap_input(source: Uuid, target_staff: Uuid, target_shift: Option<Uuid>) -> RescheduleInput {
    RescheduleInput {
        source_shift_id: source,
        target_staff_id: Some(target_staff),
        target_shift_id: target_shift,
        swap_type: SwapType::Swap,
        priority: RequestPriority::Normal,
        reason: "Personal appointment".to_string(),
        expires_at: Utc::now() + Duration::hours(24),
    }
}

pub fn giveaway_input(source: Uuid) -> RescheduleInput {
    RescheduleInput {
        source_shift_id: source,
        target_staff_id: None,
        target_shift_id: None,
        swap_type: SwapType::Giveaway,
        priority: RequestPriority::Normal,
        reason: "Out of town".to_string(),
        expires_at: Utc::now() + Duration::hours(24),
    }
}

/// Unwraps the engine error code out of an `AppError`, panicking on any other
/// failure class.
pub fn engine_err<T: std::fmt::Debug>(result: Result<T, AppError>) -> EngineError {
    match result {
        Err(AppError::Engine(err)) => err,
        other => panic!("expected an engine error, got {:?}", other.map(|_| ())),
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        min_advance_notice_hours: 24,
        expiry_sweep_interval_secs: 300,
    }
}
