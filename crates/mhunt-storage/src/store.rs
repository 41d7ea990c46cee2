//! Transactional persistence boundary consumed by the hunting pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mhunt_core::{CareerGoal, Mission, MissionThread, ProfileState, TenantRecord, UserProfile};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Read side plus the entry point to a write transaction.
#[async_trait]
pub trait HuntStore: Send + Sync {
    /// Users with status `active`, joined with their profile if one exists,
    /// in a stable order.
    async fn active_users(&self) -> Result<Vec<TenantRecord>, StoreError>;

    async fn find_tenant(&self, user_id: Uuid) -> Result<Option<TenantRecord>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn HuntTransaction>, StoreError>;
}

/// One unit of work. Dropping it without calling `commit` rolls back every
/// write made through it.
#[async_trait]
pub trait HuntTransaction: Send {
    async fn mission_exists(&mut self, user_id: Uuid, source_url: &str) -> Result<bool, StoreError>;

    async fn insert_mission(&mut self, mission: &Mission) -> Result<(), StoreError>;

    async fn insert_thread(&mut self, thread: &MissionThread) -> Result<(), StoreError>;

    /// Count one match on the user's most recent active filter. Returns
    /// `false` when the user has no active filter.
    async fn bump_active_filter(&mut self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Decode a stored career goal into the profile state seen by the pipeline.
pub(crate) fn profile_state(user_id: Uuid, career_goal: Option<serde_json::Value>) -> ProfileState {
    match career_goal {
        None | Some(serde_json::Value::Null) => ProfileState::Missing,
        Some(value) => match CareerGoal::decode(value) {
            Ok(career_goal) => ProfileState::Ready(UserProfile {
                user_id,
                career_goal,
            }),
            Err(err) => ProfileState::Invalid(err.to_string()),
        },
    }
}
