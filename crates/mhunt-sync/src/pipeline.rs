//! One user's hunt: select sources, search, parse, validate, persist.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mhunt_core::{ProfileState, RunMode, TenantRecord, UserStatus};
use mhunt_sources::{parse_candidates, OpportunityValidator, SourceSelector};
use mhunt_storage::{HuntStore, ResponseArchive, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::coordinator::PersistenceCoordinator;
use crate::search::{build_user_message, OpportunitySearch, PromptSet, ProviderError, SearchRequest, SearchWindow};

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum HuntError {
    #[error("user {0} not found")]
    UnknownUser(Uuid),
    #[error("user {0} is not active")]
    InactiveUser(Uuid),
    #[error("user {user_id} has no usable profile: {reason}")]
    MissingProfile { user_id: Uuid, reason: String },
    #[error("search failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserHuntOutcome {
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub created: usize,
}

pub struct HuntPipeline {
    selector: SourceSelector,
    prompts: PromptSet,
    search: Arc<dyn OpportunitySearch>,
    store: Arc<dyn HuntStore>,
    coordinator: PersistenceCoordinator,
    archive: Option<ResponseArchive>,
    search_timeout: Duration,
}

impl HuntPipeline {
    pub fn new(
        selector: SourceSelector,
        prompts: PromptSet,
        search: Arc<dyn OpportunitySearch>,
        store: Arc<dyn HuntStore>,
    ) -> Self {
        Self {
            selector,
            prompts,
            search,
            coordinator: PersistenceCoordinator::new(Arc::clone(&store)),
            store,
            archive: None,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_archive(mut self, archive: ResponseArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn HuntStore> {
        &self.store
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    /// Hunt for a single user looked up by id (on-demand trigger).
    pub async fn hunt_user_by_id(&self, user_id: Uuid, mode: RunMode) -> Result<UserHuntOutcome, HuntError> {
        let tenant = self
            .store
            .find_tenant(user_id)
            .await?
            .ok_or(HuntError::UnknownUser(user_id))?;
        if tenant.status != UserStatus::Active {
            return Err(HuntError::InactiveUser(user_id));
        }
        self.hunt_user(&tenant, mode).await
    }

    pub async fn hunt_user(&self, tenant: &TenantRecord, mode: RunMode) -> Result<UserHuntOutcome, HuntError> {
        let span = info_span!("hunt_user", user_id = %tenant.user_id, %mode);
        self.hunt_user_inner(tenant, mode).instrument(span).await
    }

    async fn hunt_user_inner(&self, tenant: &TenantRecord, mode: RunMode) -> Result<UserHuntOutcome, HuntError> {
        let profile = match &tenant.profile {
            ProfileState::Ready(profile) => profile,
            ProfileState::Missing => {
                return Err(HuntError::MissingProfile {
                    user_id: tenant.user_id,
                    reason: "no career goal".to_string(),
                })
            }
            ProfileState::Invalid(detail) => {
                return Err(HuntError::MissingProfile {
                    user_id: tenant.user_id,
                    reason: detail.clone(),
                })
            }
        };

        let now = Utc::now();
        let sources = self.selector.select(&profile.career_goal.role_and_skills_text());
        let window = SearchWindow::for_mode(mode, now);
        let request = SearchRequest {
            user_id: tenant.user_id,
            mode,
            system_prompt: self.prompts.for_mode(mode).to_string(),
            user_message: build_user_message(profile, &window, &sources),
        };

        let raw = match tokio::time::timeout(self.search_timeout, self.search.search(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(self.search_timeout.as_secs()).into()),
        };

        if let Some(archive) = &self.archive {
            if let Err(err) = archive.record(now, mode, tenant.user_id, &raw).await {
                warn!(error = %err, "could not archive provider response");
            }
        }

        let candidates = parse_candidates(&raw);
        let candidate_count = candidates.len();
        let validated = OpportunityValidator::new(mode, now).validate_all(candidates);
        let accepted = validated.accepted.len();
        let rejected = validated.rejected.len();

        let committed = self
            .coordinator
            .commit(tenant.user_id, validated.accepted, now)
            .await?;

        let outcome = UserHuntOutcome {
            candidates: candidate_count,
            accepted,
            rejected,
            duplicates: committed.duplicates,
            created: committed.created,
        };
        info!(
            sources = sources.len(),
            candidates = outcome.candidates,
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            created = outcome.created,
            "user hunt finished"
        );
        Ok(outcome)
    }
}
