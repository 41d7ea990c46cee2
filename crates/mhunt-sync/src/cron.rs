use std::sync::Arc;

use anyhow::{Context, Result};
use mhunt_core::RunMode;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::config::CronSchedule;
use crate::scheduler::TenantScheduler;

/// Wires the three run modes to cron triggers. Expressions are six-field
/// (seconds first) and evaluated in UTC.
pub struct CronDriver;

impl CronDriver {
    pub fn job_for(scheduler: Arc<TenantScheduler>, mode: RunMode, cron: &str) -> Result<Job> {
        Job::new_async(cron, move |_uuid, _l| {
            let scheduler = Arc::clone(&scheduler);
            Box::pin(async move {
                info!(%mode, "cron trigger fired");
                if let Some(report) = scheduler.run_guarded(mode).await {
                    info!(
                        run_id = %report.run_id,
                        processed = report.users_processed,
                        missions = report.missions_found,
                        "scheduled hunt complete"
                    );
                }
            })
        })
        .with_context(|| format!("creating {mode} job for cron `{cron}`"))
    }

    /// Register all modes and start the scheduler.
    pub async fn start(scheduler: Arc<TenantScheduler>, crons: &CronSchedule) -> Result<JobScheduler> {
        let sched = JobScheduler::new().await.context("creating scheduler")?;
        for mode in RunMode::ALL {
            let cron = crons.for_mode(mode);
            let job = Self::job_for(Arc::clone(&scheduler), mode, cron)?;
            sched.add(job).await.context("adding scheduler job")?;
            info!(%mode, %cron, "hunt scheduled");
        }
        sched.start().await.context("starting scheduler")?;
        Ok(sched)
    }

    pub async fn maybe_start(
        enabled: bool,
        scheduler: Arc<TenantScheduler>,
        crons: &CronSchedule,
    ) -> Result<Option<JobScheduler>> {
        if !enabled {
            return Ok(None);
        }
        Self::start(scheduler, crons).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::test_support::{pipeline, ScriptedSearch};
    use mhunt_storage::{FixedIntervalGate, MemoryHuntStore};

    fn tenant_scheduler() -> Arc<TenantScheduler> {
        let store = MemoryHuntStore::new();
        let pipeline = Arc::new(pipeline(Arc::new(ScriptedSearch::answering("[]")), Arc::new(store)));
        Arc::new(TenantScheduler::new(
            pipeline,
            Arc::new(FixedIntervalGate::new(Duration::ZERO)),
        ))
    }

    #[tokio::test]
    async fn default_expressions_parse() {
        let crons = CronSchedule::default();
        for mode in RunMode::ALL {
            CronDriver::job_for(tenant_scheduler(), mode, crons.for_mode(mode)).expect("valid cron");
        }
    }

    #[tokio::test]
    async fn bad_expression_is_reported() {
        let err = CronDriver::job_for(tenant_scheduler(), RunMode::Daily, "every six hours")
            .err()
            .expect("invalid cron");
        assert!(err.to_string().contains("daily"));
    }

    #[tokio::test]
    async fn disabled_scheduler_is_not_built() {
        let started = CronDriver::maybe_start(false, tenant_scheduler(), &CronSchedule::default())
            .await
            .expect("ok");
        assert!(started.is_none());
    }
}
