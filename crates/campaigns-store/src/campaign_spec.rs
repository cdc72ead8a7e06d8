use campaigns_core::{CampaignSpec, CampaignSpecId, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct CampaignSpecRow {
    id: String,
    namespace: String,
    author: String,
    raw_spec: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<CampaignSpecRow> for CampaignSpec {
    type Error = Error;

    fn try_from(row: CampaignSpecRow) -> Result<Self> {
        Ok(CampaignSpec {
            id: CampaignSpecId::from_string(row.id),
            namespace: row.namespace,
            author: row.author,
            raw_spec: row.raw_spec,
            created_at: row.created_at,
        })
    }
}

pub struct CampaignSpecStore {
    db: PgPool,
}

impl CampaignSpecStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, namespace: &str, author: &str, raw_spec: serde_json::Value) -> Result<CampaignSpec> {
        let id = CampaignSpecId::new();
        let row: CampaignSpecRow = sqlx::query_as(
            r#"INSERT INTO campaign_spec (id, namespace, author, raw_spec)
               VALUES ($1, $2, $3, $4)
               RETURNING id, namespace, author, raw_spec, created_at"#,
        )
        .bind(id.as_str())
        .bind(namespace)
        .bind(author)
        .bind(&raw_spec)
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    pub async fn get(&self, id: &CampaignSpecId) -> Result<CampaignSpec> {
        let row: CampaignSpecRow = sqlx::query_as(
            "SELECT id, namespace, author, raw_spec, created_at FROM campaign_spec WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("campaign spec {id}")))?;
        row.try_into()
    }

    /// Delete specs older than `older_than` that are not referenced by any
    /// campaign's `current_spec_id` and not pointed at by any changeset's
    /// `current_spec_id`/`previous_spec_id` chain (via their owning campaign
    /// spec). Returns the number of deleted rows.
    pub async fn delete_expired(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM campaign_spec
               WHERE created_at < $1
                 AND id NOT IN (SELECT current_spec_id FROM campaign)"#,
        )
        .bind(older_than)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
