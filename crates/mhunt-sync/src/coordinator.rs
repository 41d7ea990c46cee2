use std::sync::Arc;

use chrono::{DateTime, Utc};
use mhunt_core::{Mission, MissionDraft, MissionThread};
use mhunt_storage::{HuntStore, StoreError};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub created: usize,
    pub duplicates: usize,
    pub filter_updated: bool,
}

/// Writes one user's validated drafts in a single transaction.
#[derive(Clone)]
pub struct PersistenceCoordinator {
    store: Arc<dyn HuntStore>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn HuntStore>) -> Self {
        Self { store }
    }

    /// Insert every draft whose url the user does not already own, with its
    /// thread and a filter bump. Any failure rolls the whole batch back.
    pub async fn commit(
        &self,
        user_id: Uuid,
        drafts: Vec<MissionDraft>,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        if drafts.is_empty() {
            return Ok(CommitOutcome::default());
        }

        let result = self.commit_inner(user_id, drafts, now).await;
        match &result {
            Ok(outcome) => info!(
                %user_id,
                created = outcome.created,
                duplicates = outcome.duplicates,
                filter_updated = outcome.filter_updated,
                "missions committed"
            ),
            Err(err) => error!(%user_id, error = %err, "mission batch rolled back"),
        }
        result
    }

    async fn commit_inner(
        &self,
        user_id: Uuid,
        drafts: Vec<MissionDraft>,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut outcome = CommitOutcome::default();
        let mut tx = self.store.begin().await?;

        for draft in drafts {
            if tx.mission_exists(user_id, &draft.source_url).await? {
                debug!(%user_id, url = %draft.source_url, "skipping known mission");
                outcome.duplicates += 1;
                continue;
            }
            let mission = Mission::from_draft(user_id, draft, now);
            tx.insert_mission(&mission).await?;
            tx.insert_thread(&MissionThread::for_mission(&mission)).await?;
            outcome.filter_updated |= tx.bump_active_filter(user_id, now).await?;
            outcome.created += 1;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhunt_core::{MissionRawData, MissionStatus, RunMode, UserStatus};
    use mhunt_storage::MemoryHuntStore;

    fn draft(url: &str) -> MissionDraft {
        MissionDraft {
            title: format!("Mission at {url}"),
            description: String::new(),
            source_url: url.to_string(),
            platform: "site".into(),
            reward_amount: 10.0,
            estimated_duration_hours: 2.0,
            match_score: 85.0,
            analysis_notes: "n".into(),
            mission_type: RunMode::Daily,
            max_commands: 20,
            raw_data: MissionRawData::default(),
        }
    }

    #[tokio::test]
    async fn second_commit_of_same_urls_creates_nothing() {
        let store = MemoryHuntStore::new();
        let user = store.add_user("a@example.com", UserStatus::Active).await;
        let filter = store.add_filter(user, true).await;
        let coordinator = PersistenceCoordinator::new(Arc::new(store.clone()));
        let batch = || vec![draft("https://site.com/job/1"), draft("https://site.com/job/2")];

        let first = coordinator.commit(user, batch(), Utc::now()).await.expect("first");
        assert_eq!(first.created, 2);
        assert!(first.filter_updated);
        assert_eq!(store.filter(filter).await.expect("filter").match_count, 2);

        let second = coordinator.commit(user, batch(), Utc::now()).await.expect("second");
        assert_eq!(second, CommitOutcome { created: 0, duplicates: 2, filter_updated: false });
        assert_eq!(store.missions_for(user).await.len(), 2);
        assert_eq!(store.filter(filter).await.expect("filter").match_count, 2);
    }

    #[tokio::test]
    async fn each_mission_gets_a_pending_status_and_thread() {
        let store = MemoryHuntStore::new();
        let user = store.add_user("a@example.com", UserStatus::Active).await;
        let coordinator = PersistenceCoordinator::new(Arc::new(store.clone()));

        let outcome = coordinator
            .commit(user, vec![draft("https://site.com/job/1")], Utc::now())
            .await
            .expect("commit");
        assert_eq!(outcome.created, 1);
        assert!(!outcome.filter_updated);

        let missions = store.missions_for(user).await;
        let threads = store.threads().await;
        assert_eq!(missions[0].status, MissionStatus::Pending);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].mission_id, missions[0].id);
    }

    #[tokio::test]
    async fn thread_failure_rolls_back_the_whole_batch() {
        let store = MemoryHuntStore::new();
        let user = store.add_user("a@example.com", UserStatus::Active).await;
        let filter = store.add_filter(user, true).await;
        store.fail_thread_insert_for("https://site.com/job/2").await;
        let coordinator = PersistenceCoordinator::new(Arc::new(store.clone()));

        let result = coordinator
            .commit(
                user,
                vec![draft("https://site.com/job/1"), draft("https://site.com/job/2")],
                Utc::now(),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Injected(_))));
        assert!(store.missions().await.is_empty());
        assert!(store.threads().await.is_empty());
        assert_eq!(store.filter(filter).await.expect("filter").match_count, 0);
    }

    #[tokio::test]
    async fn urls_are_scoped_per_user() {
        let store = MemoryHuntStore::new();
        let alice = store.add_user("alice@example.com", UserStatus::Active).await;
        let bob = store.add_user("bob@example.com", UserStatus::Active).await;
        let coordinator = PersistenceCoordinator::new(Arc::new(store.clone()));

        for user in [alice, bob] {
            let outcome = coordinator
                .commit(user, vec![draft("https://site.com/job/1")], Utc::now())
                .await
                .expect("commit");
            assert_eq!(outcome.created, 1);
        }
        assert_eq!(store.missions().await.len(), 2);
    }
}
