//! Exercises the store against a real database when `DATABASE_URL` is set,
//! matching the rest of this workspace's pattern of integration tests that
//! degrade gracefully when no database is available.

use campaigns_store::Store;
use sqlx::postgres::PgPoolOptions;

async fn connect() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    PgPoolOptions::new().max_connections(2).connect(&url).await.ok()
}

#[tokio::test]
async fn campaign_and_changeset_crud_round_trip() {
    let Some(pool) = connect().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");

    let store = Store::new(pool);

    let spec = store
        .campaign_specs()
        .create("my-org", "alice", serde_json::json!({"name": "demo"}))
        .await
        .expect("create campaign spec");

    let campaign = store
        .campaigns()
        .create("demo", None, "my-org", "alice", &spec.id)
        .await
        .expect("create campaign");
    assert_eq!(campaign.namespace, "my-org");
    assert!(!campaign.is_published());

    let fetched = store.campaigns().get(campaign.id).await.expect("get campaign");
    assert_eq!(fetched.id, campaign.id);
}
