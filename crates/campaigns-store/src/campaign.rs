use campaigns_core::{Campaign, CampaignId, CampaignSpecId, Error, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::pagination::{paginate, Page, PageOpts};

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: CampaignId,
    name: String,
    description: Option<String>,
    namespace: String,
    author: String,
    branch: String,
    current_spec_id: String,
    last_applied_at: DateTime<Utc>,
    last_applier: String,
    closed_at: Option<DateTime<Utc>>,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            name: row.name,
            description: row.description,
            namespace: row.namespace,
            author: row.author,
            branch: row.branch,
            current_spec_id: CampaignSpecId::from_string(row.current_spec_id),
            last_applied_at: row.last_applied_at,
            last_applier: row.last_applier,
            closed_at: row.closed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignOpenState {
    Open,
    Closed,
    Any,
}

#[derive(Debug, Clone, Default)]
pub struct ListCampaignsFilter {
    pub namespace: Option<String>,
    pub changeset_id: Option<campaigns_core::ChangesetId>,
    pub state: Option<CampaignOpenState>,
}

pub struct CampaignStore {
    db: PgPool,
}

impl CampaignStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        namespace: &str,
        author: &str,
        current_spec_id: &CampaignSpecId,
    ) -> Result<Campaign> {
        let row: CampaignRow = sqlx::query_as(
            r#"INSERT INTO campaign (name, description, namespace, author, current_spec_id, last_applier)
               VALUES ($1, $2, $3, $4, $5, $4)
               RETURNING id, name, description, namespace, author, branch, current_spec_id,
                         last_applied_at, last_applier, closed_at"#,
        )
        .bind(name)
        .bind(description)
        .bind(namespace)
        .bind(author)
        .bind(current_spec_id.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, id: CampaignId) -> Result<Campaign> {
        let row: CampaignRow = sqlx::query_as(
            r#"SELECT id, name, description, namespace, author, branch, current_spec_id,
                      last_applied_at, last_applier, closed_at
               FROM campaign WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("campaign {id}")))?;
        Ok(row.into())
    }

    pub async fn update_spec(&self, id: CampaignId, new_spec_id: &CampaignSpecId, applier: &str, branch: &str) -> Result<Campaign> {
        let row: CampaignRow = sqlx::query_as(
            r#"UPDATE campaign
               SET current_spec_id = $2, last_applier = $3, last_applied_at = now(), branch = $4
               WHERE id = $1 AND closed_at IS NULL
               RETURNING id, name, description, namespace, author, branch, current_spec_id,
                         last_applied_at, last_applier, closed_at"#,
        )
        .bind(id)
        .bind(new_spec_id.as_str())
        .bind(applier)
        .bind(branch)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::Validation(format!("campaign {id} is closed or does not exist")))?;
        Ok(row.into())
    }

    pub async fn close(&self, id: CampaignId) -> Result<()> {
        sqlx::query("UPDATE campaign SET closed_at = now() WHERE id = $1 AND closed_at IS NULL")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: CampaignId) -> Result<()> {
        sqlx::query("DELETE FROM campaign WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(())
    }

    pub async fn list(&self, filter: &ListCampaignsFilter, opts: PageOpts<CampaignId>) -> Result<Page<Campaign, CampaignId>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(
            r#"SELECT c.id, c.name, c.description, c.namespace, c.author, c.branch, c.current_spec_id,
                      c.last_applied_at, c.last_applier, c.closed_at
               FROM campaign c
               WHERE ($1::text IS NULL OR c.namespace = $1)
                 AND ($2::uuid IS NULL OR c.id IN (
                       SELECT owned_by_campaign_id FROM changeset WHERE id = $2
                       UNION SELECT unnest(campaign_ids) FROM changeset WHERE id = $2
                 ))
                 AND (
                    $3::text IS NULL
                    OR ($3 = 'open' AND c.closed_at IS NULL)
                    OR ($3 = 'closed' AND c.closed_at IS NOT NULL)
                 )
                 AND ($4::uuid IS NULL OR c.id > $4)
               ORDER BY c.id
               LIMIT $5"#,
        )
        .bind(&filter.namespace)
        .bind(filter.changeset_id)
        .bind(filter.state.map(|s| match s {
            CampaignOpenState::Open => "open",
            CampaignOpenState::Closed => "closed",
            CampaignOpenState::Any => "any",
        }))
        .bind(opts.cursor)
        .bind(opts.limit + 1)
        .fetch_all(&self.db)
        .await?;

        let campaigns: Vec<Campaign> = rows.into_iter().map(Into::into).collect();
        Ok(paginate(campaigns, opts.limit, |c| c.id))
    }

    pub async fn count(&self, filter: &ListCampaignsFilter) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM campaign c
               WHERE ($1::text IS NULL OR c.namespace = $1)
                 AND (
                    $2::text IS NULL
                    OR ($2 = 'open' AND c.closed_at IS NULL)
                    OR ($2 = 'closed' AND c.closed_at IS NOT NULL)
                 )"#,
        )
        .bind(&filter.namespace)
        .bind(filter.state.map(|s| match s {
            CampaignOpenState::Open => "open",
            CampaignOpenState::Closed => "closed",
            CampaignOpenState::Any => "any",
        }))
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    /// Mark every non-completed changeset owned by `campaign_id` as
    /// canceled. Completed and unowned changesets are untouched.
    pub async fn cancel_queued_changesets(&self, campaign_id: CampaignId) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE changeset
               SET reconciler_state = 'errored', failure_message = 'canceled', num_failures = 60
               WHERE owned_by_campaign_id = $1
                 AND reconciler_state IN ('queued', 'processing', 'errored')"#,
        )
        .bind(campaign_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Queue every non-closed changeset owned by `campaign_id` for closing.
    pub async fn enqueue_changesets_to_close(&self, campaign_id: CampaignId) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE changeset
               SET closing = true, reconciler_state = 'queued', failure_message = NULL, num_failures = 0
               WHERE owned_by_campaign_id = $1
                 AND (external_state IS DISTINCT FROM 'closed')"#,
        )
        .bind(campaign_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
