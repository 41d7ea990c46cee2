//! Tenant iteration for one scheduled run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mhunt_core::{ProfileState, RunMode, TenantRecord};
use mhunt_storage::RateLimiter;
use serde::Serialize;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pipeline::HuntPipeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFailure {
    pub user_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUser {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HuntReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users_considered: usize,
    pub users_skipped: usize,
    pub users_processed: usize,
    pub missions_found: usize,
    pub skipped: Vec<SkippedUser>,
    pub errors: Vec<UserFailure>,
    /// Set when the run could not list users at all.
    pub aborted: Option<String>,
}

impl HuntReport {
    fn start(mode: RunMode) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: now,
            finished_at: now,
            users_considered: 0,
            users_skipped: 0,
            users_processed: 0,
            missions_found: 0,
            skipped: Vec::new(),
            errors: Vec::new(),
            aborted: None,
        }
    }

    pub fn brief_markdown(&self) -> String {
        let mut brief = format!(
            "# Mission Hunter {} Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Users considered: {}\n- Users skipped: {}\n- Users processed: {}\n- Missions created: {}\n",
            self.mode,
            self.run_id,
            self.started_at,
            self.finished_at,
            self.users_considered,
            self.users_skipped,
            self.users_processed,
            self.missions_found,
        );
        if let Some(reason) = &self.aborted {
            brief.push_str(&format!("\n**Run aborted:** {reason}\n"));
        }
        if !self.errors.is_empty() {
            brief.push_str("\n## Failures\n");
            for failure in &self.errors {
                brief.push_str(&format!("- `{}`: {}\n", failure.user_id, failure.error));
            }
        }
        brief
    }
}

/// One lock per run mode; a trigger that finds its mode locked is skipped.
#[derive(Debug, Clone)]
pub struct RunGuard {
    locks: Arc<HashMap<RunMode, Arc<Mutex<()>>>>,
}

impl Default for RunGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RunGuard {
    pub fn new() -> Self {
        let locks = RunMode::ALL
            .into_iter()
            .map(|mode| (mode, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            locks: Arc::new(locks),
        }
    }

    pub fn try_acquire(&self, mode: RunMode) -> Option<OwnedMutexGuard<()>> {
        self.locks
            .get(&mode)
            .and_then(|lock| Arc::clone(lock).try_lock_owned().ok())
    }
}

pub struct TenantScheduler {
    pipeline: Arc<HuntPipeline>,
    limiter: Arc<dyn RateLimiter>,
    guard: RunGuard,
    reports_dir: Option<PathBuf>,
}

impl TenantScheduler {
    pub fn new(pipeline: Arc<HuntPipeline>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            pipeline,
            limiter,
            guard: RunGuard::new(),
            reports_dir: None,
        }
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = Some(dir.into());
        self
    }

    pub fn pipeline(&self) -> &Arc<HuntPipeline> {
        &self.pipeline
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    /// Run unless a run of the same mode is still in progress.
    pub async fn run_guarded(&self, mode: RunMode) -> Option<HuntReport> {
        let Some(_lock) = self.guard.try_acquire(mode) else {
            warn!(%mode, "previous hunt still running; skipping trigger");
            return None;
        };
        Some(self.run_for_all_users(mode).await)
    }

    /// Hunt for every active user in turn. Per-user failures are recorded in
    /// the report and never stop the run.
    pub async fn run_for_all_users(&self, mode: RunMode) -> HuntReport {
        let mut report = HuntReport::start(mode);
        info!(run_id = %report.run_id, %mode, "hunt run started");

        let tenants = match self.pipeline.store().active_users().await {
            Ok(tenants) => tenants,
            Err(err) => {
                error!(run_id = %report.run_id, error = %err, "could not list active users");
                report.aborted = Some(err.to_string());
                return self.finish(report).await;
            }
        };
        report.users_considered = tenants.len();

        for tenant in tenants {
            if let Some(reason) = skip_reason(&tenant) {
                info!(user_id = %tenant.user_id, %reason, "skipping user");
                report.users_skipped += 1;
                report.skipped.push(SkippedUser {
                    user_id: tenant.user_id,
                    reason,
                });
                continue;
            }

            self.limiter.acquire().await;
            let user_id = tenant.user_id;
            let pipeline = Arc::clone(&self.pipeline);
            let task = tokio::spawn(async move { pipeline.hunt_user(&tenant, mode).await });

            let failure = match task.await {
                Ok(Ok(outcome)) => {
                    report.users_processed += 1;
                    report.missions_found += outcome.created;
                    None
                }
                Ok(Err(err)) => Some(err.to_string()),
                Err(join_err) => Some(format!("hunt task aborted: {join_err}")),
            };
            if let Some(error) = failure {
                warn!(%user_id, %error, "user hunt failed");
                report.errors.push(UserFailure { user_id, error });
            }
        }

        self.finish(report).await
    }

    async fn finish(&self, mut report: HuntReport) -> HuntReport {
        report.finished_at = Utc::now();
        if let Some(dir) = &self.reports_dir {
            match write_reports(dir, &report).await {
                Ok(path) => info!(path = %path.display(), "hunt report written"),
                Err(err) => warn!(error = %err, "could not write hunt report"),
            }
        }
        info!(
            run_id = %report.run_id,
            mode = %report.mode,
            considered = report.users_considered,
            skipped = report.users_skipped,
            processed = report.users_processed,
            failed = report.errors.len(),
            missions = report.missions_found,
            "hunt run finished"
        );
        report
    }
}

fn skip_reason(tenant: &TenantRecord) -> Option<String> {
    match &tenant.profile {
        ProfileState::Ready(_) => None,
        ProfileState::Missing => Some("no career goal".to_string()),
        ProfileState::Invalid(detail) => Some(format!("unreadable career goal: {detail}")),
    }
}

/// Write `hunt_report.json` and `brief.md` under `<dir>/<run_id>/`.
pub async fn write_reports(dir: &Path, report: &HuntReport) -> Result<PathBuf> {
    let run_dir = dir.join(report.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;

    let json = serde_json::to_vec_pretty(report).context("serializing hunt report")?;
    fs::write(run_dir.join("hunt_report.json"), json)
        .await
        .context("writing hunt_report.json")?;
    fs::write(run_dir.join("brief.md"), report.brief_markdown())
        .await
        .context("writing brief.md")?;
    Ok(run_dir)
}
