use campaigns_core::{ChangesetSpec, ChangesetSpecId, CampaignSpecId, Error, RepoId, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct ChangesetSpecRow {
    id: String,
    repo_id: RepoId,
    campaign_spec_id: String,
    kind: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChangesetSpecRow> for ChangesetSpec {
    type Error = Error;

    fn try_from(row: ChangesetSpecRow) -> Result<Self> {
        let kind = serde_json::from_value(row.kind)
            .map_err(|e| Error::Unexpected(format!("corrupt changeset_spec.kind: {e}")))?;
        Ok(ChangesetSpec {
            id: ChangesetSpecId::from_string(row.id),
            repo_id: row.repo_id,
            campaign_spec_id: CampaignSpecId::from_string(row.campaign_spec_id),
            kind,
            created_at: row.created_at,
        })
    }
}

pub struct ChangesetSpecStore {
    db: PgPool,
}

impl ChangesetSpecStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        repo_id: RepoId,
        campaign_spec_id: &CampaignSpecId,
        kind: &campaigns_core::ChangesetSpecKind,
    ) -> Result<ChangesetSpec> {
        let id = ChangesetSpecId::new();
        let kind_json = serde_json::to_value(kind)
            .map_err(|e| Error::Unexpected(format!("failed to serialize changeset spec kind: {e}")))?;
        let row: ChangesetSpecRow = sqlx::query_as(
            r#"INSERT INTO changeset_spec (id, repo_id, campaign_spec_id, kind)
               VALUES ($1, $2, $3, $4)
               RETURNING id, repo_id, campaign_spec_id, kind, created_at"#,
        )
        .bind(id.as_str())
        .bind(repo_id)
        .bind(campaign_spec_id.as_str())
        .bind(&kind_json)
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    pub async fn get(&self, id: &ChangesetSpecId) -> Result<ChangesetSpec> {
        let row: ChangesetSpecRow = sqlx::query_as(
            "SELECT id, repo_id, campaign_spec_id, kind, created_at FROM changeset_spec WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("changeset spec {id}")))?;
        row.try_into()
    }

    pub async fn list_for_campaign_spec(&self, campaign_spec_id: &CampaignSpecId) -> Result<Vec<ChangesetSpec>> {
        let rows: Vec<ChangesetSpecRow> = sqlx::query_as(
            "SELECT id, repo_id, campaign_spec_id, kind, created_at FROM changeset_spec WHERE campaign_spec_id = $1",
        )
        .bind(campaign_spec_id.as_str())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete specs older than `older_than` that no changeset currently
    /// points to via `current_spec_id` or `previous_spec_id`.
    pub async fn delete_expired(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM changeset_spec
               WHERE created_at < $1
                 AND id NOT IN (SELECT current_spec_id FROM changeset)
                 AND id NOT IN (SELECT previous_spec_id FROM changeset WHERE previous_spec_id IS NOT NULL)"#,
        )
        .bind(older_than)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
