//! In-process `HuntStore` with transactional staging, used for dry runs and tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mhunt_core::{CareerGoal, Mission, MissionFilter, MissionThread, TenantRecord, UserStatus};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{profile_state, HuntStore, HuntTransaction, StoreError};

#[derive(Debug, Clone)]
struct MemoryUser {
    id: Uuid,
    email: String,
    status: UserStatus,
    created_at: DateTime<Utc>,
    career_goal: Option<JsonValue>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<MemoryUser>,
    missions: Vec<Mission>,
    threads: Vec<MissionThread>,
    filters: Vec<MissionFilter>,
    fail_thread_urls: HashSet<String>,
    fail_listing: bool,
}

impl MemoryState {
    fn has_mission(&self, user_id: Uuid, source_url: &str) -> bool {
        self.missions
            .iter()
            .any(|m| m.user_id == user_id && m.source_url == source_url)
    }

    fn active_filter_id(&self, user_id: Uuid) -> Option<Uuid> {
        self.filters
            .iter()
            .filter(|f| f.user_id == user_id && f.is_active)
            .max_by_key(|f| f.created_at)
            .map(|f| f.id)
    }

    fn tenant(&self, user: &MemoryUser) -> TenantRecord {
        TenantRecord {
            user_id: user.id,
            email: user.email.clone(),
            status: user.status,
            profile: profile_state(user.id, user.career_goal.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHuntStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHuntStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, email: &str, status: UserStatus) -> Uuid {
        let mut state = self.state.lock().await;
        let id = Uuid::new_v4();
        // Creation order drives listing order.
        let created_at = Utc::now() + TimeDelta::milliseconds(state.users.len() as i64);
        state.users.push(MemoryUser {
            id,
            email: email.to_string(),
            status,
            created_at,
            career_goal: None,
        });
        id
    }

    pub async fn set_career_goal(&self, user_id: Uuid, goal: &CareerGoal) -> Result<(), StoreError> {
        let value = goal.encode().map_err(|err| StoreError::Decode {
            what: "career goal",
            detail: err.to_string(),
        })?;
        self.set_raw_career_goal(user_id, value).await;
        Ok(())
    }

    /// Store an arbitrary career goal document, bypassing encoding.
    pub async fn set_raw_career_goal(&self, user_id: Uuid, value: JsonValue) {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.career_goal = Some(value);
        }
    }

    pub async fn add_filter(&self, user_id: Uuid, is_active: bool) -> Uuid {
        let mut state = self.state.lock().await;
        let id = Uuid::new_v4();
        let created_at = Utc::now() + TimeDelta::milliseconds(state.filters.len() as i64);
        state.filters.push(MissionFilter {
            id,
            user_id,
            is_active,
            match_count: 0,
            last_match_at: None,
            created_at,
        });
        id
    }

    /// Make every thread insert for `source_url` fail inside its transaction.
    pub async fn fail_thread_insert_for(&self, source_url: &str) {
        self.state
            .lock()
            .await
            .fail_thread_urls
            .insert(source_url.to_string());
    }

    pub async fn fail_user_listing(&self, fail: bool) {
        self.state.lock().await.fail_listing = fail;
    }

    pub async fn missions(&self) -> Vec<Mission> {
        self.state.lock().await.missions.clone()
    }

    pub async fn missions_for(&self, user_id: Uuid) -> Vec<Mission> {
        self.state
            .lock()
            .await
            .missions
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn threads(&self) -> Vec<MissionThread> {
        self.state.lock().await.threads.clone()
    }

    pub async fn filter(&self, filter_id: Uuid) -> Option<MissionFilter> {
        self.state
            .lock()
            .await
            .filters
            .iter()
            .find(|f| f.id == filter_id)
            .cloned()
    }
}

#[async_trait]
impl HuntStore for MemoryHuntStore {
    async fn active_users(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let state = self.state.lock().await;
        if state.fail_listing {
            return Err(StoreError::Injected("user listing unavailable".into()));
        }
        let mut users: Vec<&MemoryUser> = state
            .users
            .iter()
            .filter(|u| u.status == UserStatus::Active)
            .collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users.into_iter().map(|u| state.tenant(u)).collect())
    }

    async fn find_tenant(&self, user_id: Uuid) -> Result<Option<TenantRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| state.tenant(u)))
    }

    async fn begin(&self) -> Result<Box<dyn HuntTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            missions: Vec::new(),
            threads: Vec::new(),
            filter_bumps: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    missions: Vec<Mission>,
    threads: Vec<MissionThread>,
    filter_bumps: Vec<(Uuid, DateTime<Utc>)>,
}

#[async_trait]
impl HuntTransaction for MemoryTransaction {
    async fn mission_exists(&mut self, user_id: Uuid, source_url: &str) -> Result<bool, StoreError> {
        let staged = self
            .missions
            .iter()
            .any(|m| m.user_id == user_id && m.source_url == source_url);
        Ok(staged || self.state.lock().await.has_mission(user_id, source_url))
    }

    async fn insert_mission(&mut self, mission: &Mission) -> Result<(), StoreError> {
        self.missions.push(mission.clone());
        Ok(())
    }

    async fn insert_thread(&mut self, thread: &MissionThread) -> Result<(), StoreError> {
        let source_url = self
            .missions
            .iter()
            .find(|m| m.id == thread.mission_id)
            .map(|m| m.source_url.clone())
            .ok_or_else(|| StoreError::Injected(format!("thread for unknown mission {}", thread.mission_id)))?;
        if self.state.lock().await.fail_thread_urls.contains(&source_url) {
            return Err(StoreError::Injected(format!("thread insert failed for {source_url}")));
        }
        self.threads.push(thread.clone());
        Ok(())
    }

    async fn bump_active_filter(&mut self, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let filter_id = self.state.lock().await.active_filter_id(user_id);
        match filter_id {
            Some(id) => {
                self.filter_bumps.push((id, at));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            state,
            missions,
            threads,
            filter_bumps,
        } = *self;
        let mut state = state.lock().await;

        // Mirrors the (user_id, source_url) unique index.
        for mission in &missions {
            if state.has_mission(mission.user_id, &mission.source_url) {
                return Err(StoreError::Injected(format!(
                    "duplicate source_url {} for user {}",
                    mission.source_url, mission.user_id
                )));
            }
        }

        state.missions.extend(missions);
        state.threads.extend(threads);
        for (filter_id, at) in filter_bumps {
            if let Some(filter) = state.filters.iter_mut().find(|f| f.id == filter_id) {
                filter.match_count += 1;
                filter.last_match_at = Some(at);
            }
        }
        Ok(())
    }
}
