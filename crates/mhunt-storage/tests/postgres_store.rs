//! Transaction behaviour against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -p mhunt-storage -- --ignored`.

use chrono::Utc;
use mhunt_core::{Mission, MissionDraft, MissionRawData, MissionThread, RunMode};
use mhunt_storage::{HuntStore, PgHuntStore, StoreError};
use uuid::Uuid;

async fn store() -> Option<PgHuntStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set; skipping");
        return None;
    };
    let store = PgHuntStore::connect(&url, 2).await.expect("connect");
    store.migrate().await.expect("migrate");
    Some(store)
}

async fn add_user(store: &PgHuntStore) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, status) VALUES ($1, $2, 'active')")
        .bind(id)
        .bind(format!("{id}@hunt.test"))
        .execute(store.pool())
        .await
        .expect("insert user");
    id
}

async fn remove_user(store: &PgHuntStore, id: Uuid) {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(store.pool())
        .await
        .expect("delete user");
}

async fn mission_count(store: &PgHuntStore, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM missions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(store.pool())
        .await
        .expect("count missions")
}

fn mission_for(user_id: Uuid, url: &str) -> Mission {
    let draft = MissionDraft {
        title: "Checkout redesign".into(),
        description: "Rework the cart flow".into(),
        source_url: url.into(),
        platform: "malt".into(),
        reward_amount: 600.0,
        estimated_duration_hours: 10.0,
        match_score: 88.0,
        analysis_notes: String::new(),
        mission_type: RunMode::Weekly,
        max_commands: RunMode::Weekly.max_commands(),
        raw_data: MissionRawData::default(),
    };
    Mission::from_draft(user_id, draft, Utc::now())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn uncommitted_transaction_is_rolled_back_on_drop() {
    let Some(store) = store().await else { return };
    let user = add_user(&store).await;
    let mission = mission_for(user, "https://www.malt.fr/project/checkout-1");

    {
        let mut tx = store.begin().await.expect("begin");
        tx.insert_mission(&mission).await.expect("insert mission");
        tx.insert_thread(&MissionThread::for_mission(&mission))
            .await
            .expect("insert thread");
        assert!(tx.mission_exists(user, &mission.source_url).await.expect("exists"));
    }

    assert_eq!(mission_count(&store, user).await, 0);
    let mut tx = store.begin().await.expect("begin");
    assert!(!tx.mission_exists(user, &mission.source_url).await.expect("exists"));
    drop(tx);

    remove_user(&store, user).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn same_url_twice_for_one_user_hits_unique_index() {
    let Some(store) = store().await else { return };
    let user = add_user(&store).await;
    let url = "https://www.malt.fr/project/checkout-2";

    let mut tx = store.begin().await.expect("begin");
    tx.insert_mission(&mission_for(user, url)).await.expect("insert first");
    tx.commit().await.expect("commit first");

    // A second batch that skipped the existence check still cannot duplicate.
    let mut tx = store.begin().await.expect("begin");
    let second = match tx.insert_mission(&mission_for(user, url)).await {
        Ok(()) => tx.commit().await,
        Err(err) => Err(err),
    };
    let db_err = match second {
        Err(StoreError::Database(sqlx::Error::Database(db_err))) => db_err,
        other => panic!("expected a unique violation, got {other:?}"),
    };
    assert_eq!(db_err.constraint(), Some("missions_user_source_url_key"));
    assert_eq!(mission_count(&store, user).await, 1);

    // Another user may hold the same posting.
    let other = add_user(&store).await;
    let mut tx = store.begin().await.expect("begin");
    tx.insert_mission(&mission_for(other, url)).await.expect("insert other");
    tx.commit().await.expect("commit other");
    assert_eq!(mission_count(&store, other).await, 1);

    remove_user(&store, user).await;
    remove_user(&store, other).await;
}
