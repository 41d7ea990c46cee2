//! Hunt orchestration: provider search, per-user pipeline, tenant scheduling
//! and cron wiring.

use std::sync::Arc;

use anyhow::Result;
use mhunt_sources::{SourceCatalog, SourceSelector};
use mhunt_storage::{HuntStore, PgHuntStore, ProviderHttp, ProviderHttpConfig, ResponseArchive};

mod config;
mod coordinator;
mod cron;
mod pipeline;
mod scheduler;
mod search;

pub use config::{CronSchedule, HuntConfig, ThrottleKind};
pub use coordinator::{CommitOutcome, PersistenceCoordinator};
pub use cron::CronDriver;
pub use pipeline::{HuntError, HuntPipeline, UserHuntOutcome, DEFAULT_SEARCH_TIMEOUT};
pub use scheduler::{write_reports, HuntReport, RunGuard, SkippedUser, TenantScheduler, UserFailure};
pub use search::{
    build_user_message, ChatSearchClient, OpportunitySearch, PromptSet, ProviderError, SearchRequest,
    SearchWindow,
};

pub const CRATE_NAME: &str = "mhunt-sync";

/// Everything a binary needs after startup wiring.
pub struct HuntRuntime {
    pub config: HuntConfig,
    pub store: PgHuntStore,
    pub scheduler: Arc<TenantScheduler>,
}

impl HuntRuntime {
    pub fn pipeline(&self) -> &Arc<HuntPipeline> {
        self.scheduler.pipeline()
    }
}

/// Build the chat search client described by `config`.
pub fn search_client(config: &HuntConfig) -> Result<ChatSearchClient> {
    let http = ProviderHttp::new(ProviderHttpConfig {
        timeout: config.http_timeout,
        user_agent: Some(config.user_agent.clone()),
        ..Default::default()
    })?;
    Ok(ChatSearchClient::new(
        http,
        &config.provider_url,
        config.provider_model.clone(),
        config.provider_api_key.clone(),
    ))
}

/// Assemble pipeline and scheduler over any store and search provider.
pub fn assemble(
    config: &HuntConfig,
    store: Arc<dyn HuntStore>,
    search: Arc<dyn OpportunitySearch>,
) -> TenantScheduler {
    let catalog = SourceCatalog::load_or_fallback(&config.catalog_path);
    let prompts = PromptSet::load(&config.prompts_dir);

    let mut pipeline = HuntPipeline::new(SourceSelector::new(catalog), prompts, search, store)
        .with_search_timeout(config.provider_timeout);
    if let Some(dir) = &config.archive_dir {
        pipeline = pipeline.with_archive(ResponseArchive::new(dir.clone()));
    }

    let mut scheduler = TenantScheduler::new(Arc::new(pipeline), config.build_limiter());
    if let Some(dir) = &config.reports_dir {
        scheduler = scheduler.with_reports_dir(dir.clone());
    }
    scheduler
}

pub async fn runtime_from_env() -> Result<HuntRuntime> {
    let config = HuntConfig::from_env();
    let store = PgHuntStore::connect(&config.database_url, config.db_max_connections).await?;
    let search = Arc::new(search_client(&config)?);
    let scheduler = Arc::new(assemble(&config, Arc::new(store.clone()), search));
    Ok(HuntRuntime {
        config,
        store,
        scheduler,
    })
}
