//! sqlx/Postgres implementation of the hunt store.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mhunt_core::{Mission, MissionThread, TenantRecord, UserStatus};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::store::{profile_state, HuntStore, HuntTransaction, StoreError};

#[derive(Debug, Clone)]
pub struct PgHuntStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    email: String,
    status: String,
    career_goal: Option<JsonValue>,
}

impl TenantRow {
    fn into_record(self) -> Result<TenantRecord, StoreError> {
        let status: UserStatus = self.status.parse().map_err(|err| StoreError::Decode {
            what: "user status",
            detail: format!("{err}"),
        })?;
        Ok(TenantRecord {
            user_id: self.id,
            email: self.email,
            status,
            profile: profile_state(self.id, self.career_goal),
        })
    }
}

impl PgHuntStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .context("running database migrations")?;
        Ok(())
    }
}

#[async_trait]
impl HuntStore for PgHuntStore {
    async fn active_users(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT u.id, u.email, u.status, p.career_goal
              FROM users u
              LEFT JOIN user_profiles p ON p.user_id = u.id
             WHERE u.status = 'active'
             ORDER BY u.created_at, u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TenantRow::into_record).collect()
    }

    async fn find_tenant(&self, user_id: Uuid) -> Result<Option<TenantRecord>, StoreError> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT u.id, u.email, u.status, p.career_goal
              FROM users u
              LEFT JOIN user_profiles p ON p.user_id = u.id
             WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TenantRow::into_record).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn HuntTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgHuntTransaction { tx }))
    }
}

pub struct PgHuntTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl HuntTransaction for PgHuntTransaction {
    async fn mission_exists(&mut self, user_id: Uuid, source_url: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM missions WHERE user_id = $1 AND source_url = $2)",
        )
        .bind(user_id)
        .bind(source_url)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_mission(&mut self, mission: &Mission) -> Result<(), StoreError> {
        let raw_data = mission.raw_data.encode().map_err(|err| StoreError::Decode {
            what: "mission raw data",
            detail: err.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO missions (
                id, user_id, title, description, source_url, platform,
                reward_amount, estimated_duration_hours, status, type,
                match_score, raw_data, analysis_notes, max_commands,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            "#,
        )
        .bind(mission.id)
        .bind(mission.user_id)
        .bind(&mission.title)
        .bind(&mission.description)
        .bind(&mission.source_url)
        .bind(&mission.platform)
        .bind(mission.reward_amount)
        .bind(mission.estimated_duration_hours)
        .bind(mission.status.as_str())
        .bind(mission.mission_type.as_str())
        .bind(mission.match_score)
        .bind(raw_data)
        .bind(&mission.analysis_notes)
        .bind(mission.max_commands)
        .bind(mission.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_thread(&mut self, thread: &MissionThread) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mission_threads (id, mission_id, user_id, title, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(thread.id)
        .bind(thread.mission_id)
        .bind(thread.user_id)
        .bind(&thread.title)
        .bind(thread.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn bump_active_filter(&mut self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mission_filters
               SET match_count = match_count + 1,
                   last_match_at = $2,
                   updated_at = $2
             WHERE id = (
                   SELECT id FROM mission_filters
                    WHERE user_id = $1 AND is_active
                    ORDER BY created_at DESC
                    LIMIT 1
             )
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
