use campaigns_core::{
    CampaignId, Changeset, ChangesetId, ChangesetMetadata, ChangesetSpecId, DiffStat, Error,
    ExternalCheckState, ExternalReviewState, ExternalServiceType, ExternalState, PublicationState,
    ReconcilerState, RepoId, Result, SyncState,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::pagination::{paginate, Page, PageOpts};

#[derive(sqlx::FromRow)]
struct ChangesetRow {
    id: ChangesetId,
    repo_id: RepoId,
    external_service_type: ExternalServiceType,
    external_id: Option<String>,
    external_branch: Option<String>,
    owned_by_campaign_id: Option<CampaignId>,
    campaign_ids: Vec<CampaignId>,
    current_spec_id: String,
    previous_spec_id: Option<String>,
    publication_state: PublicationState,
    reconciler_state: ReconcilerState,
    closing: bool,
    unsynced: bool,
    external_deleted_at: Option<DateTime<Utc>>,
    external_state: Option<ExternalState>,
    external_review_state: Option<ExternalReviewState>,
    external_check_state: Option<ExternalCheckState>,
    diff_stat: Option<Json<DiffStat>>,
    sync_state: Option<Json<SyncState>>,
    metadata: Option<Json<ChangesetMetadata>>,
    failure_message: Option<String>,
    num_failures: i32,
    num_resets: i32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    process_after: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

const CHANGESET_COLUMNS: &str = r#"id, repo_id, external_service_type, external_id, external_branch,
    owned_by_campaign_id, campaign_ids, current_spec_id, previous_spec_id,
    publication_state, reconciler_state, closing, unsynced, external_deleted_at,
    external_state, external_review_state, external_check_state,
    diff_stat, sync_state, metadata,
    failure_message, num_failures, num_resets, started_at, finished_at, process_after,
    updated_at, created_at"#;

impl From<ChangesetRow> for Changeset {
    fn from(row: ChangesetRow) -> Self {
        Changeset {
            id: row.id,
            repo_id: row.repo_id,
            external_service_type: row.external_service_type,
            external_id: row.external_id,
            external_branch: row.external_branch,
            owned_by_campaign_id: row.owned_by_campaign_id,
            campaign_ids: row.campaign_ids,
            current_spec_id: ChangesetSpecId::from_string(row.current_spec_id),
            previous_spec_id: row.previous_spec_id.map(ChangesetSpecId::from_string),
            publication_state: row.publication_state,
            reconciler_state: row.reconciler_state,
            closing: row.closing,
            unsynced: row.unsynced,
            external_deleted_at: row.external_deleted_at,
            external_state: row.external_state,
            external_review_state: row.external_review_state,
            external_check_state: row.external_check_state,
            diff_stat: row.diff_stat.map(|j| j.0),
            sync_state: row.sync_state.map(|j| j.0),
            metadata: row.metadata.map(|j| j.0),
            failure_message: row.failure_message,
            num_failures: row.num_failures,
            num_resets: row.num_resets,
            started_at: row.started_at,
            finished_at: row.finished_at,
            process_after: row.process_after,
            updated_at: row.updated_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListChangesetsFilter {
    pub campaign_id: Option<CampaignId>,
    pub owned_by_campaign_id: Option<CampaignId>,
    pub publication_state: Option<PublicationState>,
    pub reconciler_state: Option<ReconcilerState>,
    pub external_state: Option<ExternalState>,
    pub external_review_state: Option<ExternalReviewState>,
    pub external_check_state: Option<ExternalCheckState>,
    pub without_deleted: bool,
    pub only_without_diff_stats: bool,
}

pub struct ChangesetSyncData {
    pub id: ChangesetId,
    pub repo_id: RepoId,
    pub external_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub struct ChangesetStore {
    db: PgPool,
}

impl ChangesetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        repo_id: RepoId,
        external_service_type: ExternalServiceType,
        current_spec_id: &ChangesetSpecId,
        owned_by_campaign_id: Option<CampaignId>,
    ) -> Result<Changeset> {
        let row: ChangesetRow = sqlx::query_as(&format!(
            r#"INSERT INTO changeset (repo_id, external_service_type, current_spec_id, owned_by_campaign_id, campaign_ids)
               VALUES ($1, $2, $3, $4, CASE WHEN $4 IS NULL THEN '{{}}' ELSE ARRAY[$4] END)
               RETURNING {CHANGESET_COLUMNS}"#
        ))
        .bind(repo_id)
        .bind(external_service_type)
        .bind(current_spec_id.as_str())
        .bind(owned_by_campaign_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    /// Same as [`Self::create`], but runs inside the caller's transaction so
    /// a rewirer apply can create, reattach, and detach changesets
    /// atomically.
    pub async fn create_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        repo_id: RepoId,
        external_service_type: ExternalServiceType,
        current_spec_id: &ChangesetSpecId,
        owned_by_campaign_id: Option<CampaignId>,
    ) -> Result<Changeset> {
        let row: ChangesetRow = sqlx::query_as(&format!(
            r#"INSERT INTO changeset (repo_id, external_service_type, current_spec_id, owned_by_campaign_id, campaign_ids)
               VALUES ($1, $2, $3, $4, CASE WHEN $4 IS NULL THEN '{{}}' ELSE ARRAY[$4] END)
               RETURNING {CHANGESET_COLUMNS}"#
        ))
        .bind(repo_id)
        .bind(external_service_type)
        .bind(current_spec_id.as_str())
        .bind(owned_by_campaign_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, id: ChangesetId) -> Result<Changeset> {
        let row: ChangesetRow = sqlx::query_as(&format!("SELECT {CHANGESET_COLUMNS} FROM changeset WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("changeset {id}")))?;
        Ok(row.into())
    }

    /// Persist the full set of mutable fields on a changeset, e.g. after the
    /// executor applies an operation and learns new metadata.
    pub async fn update(&self, changeset: &Changeset) -> Result<Changeset> {
        let row: ChangesetRow = sqlx::query_as(&format!(
            r#"UPDATE changeset SET
                external_id = $2, external_branch = $3, current_spec_id = $4, previous_spec_id = $5,
                publication_state = $6, reconciler_state = $7, closing = $8, unsynced = $9,
                external_deleted_at = $10, external_state = $11, external_review_state = $12,
                external_check_state = $13, diff_stat = $14, sync_state = $15, metadata = $16,
                failure_message = $17, num_failures = $18, num_resets = $19, started_at = $20,
                finished_at = $21, process_after = $22, updated_at = now()
               WHERE id = $1
               RETURNING {CHANGESET_COLUMNS}"#
        ))
        .bind(changeset.id)
        .bind(&changeset.external_id)
        .bind(&changeset.external_branch)
        .bind(changeset.current_spec_id.as_str())
        .bind(changeset.previous_spec_id.as_ref().map(|s| s.as_str()))
        .bind(changeset.publication_state)
        .bind(changeset.reconciler_state)
        .bind(changeset.closing)
        .bind(changeset.unsynced)
        .bind(changeset.external_deleted_at)
        .bind(changeset.external_state)
        .bind(changeset.external_review_state)
        .bind(changeset.external_check_state)
        .bind(changeset.diff_stat.map(Json))
        .bind(changeset.sync_state.clone().map(Json))
        .bind(changeset.metadata.clone().map(Json))
        .bind(&changeset.failure_message)
        .bind(changeset.num_failures)
        .bind(changeset.num_resets)
        .bind(changeset.started_at)
        .bind(changeset.finished_at)
        .bind(changeset.process_after)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("changeset {}", changeset.id)))?;
        Ok(row.into())
    }

    /// Same column set as [`Self::update`], but only takes effect while the
    /// row is still `processing`. A worker finishing an operation loses this
    /// guard if a concurrent `CancelQueuedCampaignChangesets` already moved
    /// the row to `errored` out from under it — returning `None` lets the
    /// caller skip clobbering the cancellation's failure message.
    pub async fn finish_processing(&self, changeset: &Changeset) -> Result<Option<Changeset>> {
        let row: Option<ChangesetRow> = sqlx::query_as(&format!(
            r#"UPDATE changeset SET
                external_id = $2, external_branch = $3, current_spec_id = $4, previous_spec_id = $5,
                publication_state = $6, reconciler_state = $7, closing = $8, unsynced = $9,
                external_deleted_at = $10, external_state = $11, external_review_state = $12,
                external_check_state = $13, diff_stat = $14, sync_state = $15, metadata = $16,
                failure_message = $17, num_failures = $18, num_resets = $19, started_at = $20,
                finished_at = $21, process_after = $22, updated_at = now()
               WHERE id = $1 AND reconciler_state = 'processing'
               RETURNING {CHANGESET_COLUMNS}"#
        ))
        .bind(changeset.id)
        .bind(&changeset.external_id)
        .bind(&changeset.external_branch)
        .bind(changeset.current_spec_id.as_str())
        .bind(changeset.previous_spec_id.as_ref().map(|s| s.as_str()))
        .bind(changeset.publication_state)
        .bind(changeset.reconciler_state)
        .bind(changeset.closing)
        .bind(changeset.unsynced)
        .bind(changeset.external_deleted_at)
        .bind(changeset.external_state)
        .bind(changeset.external_review_state)
        .bind(changeset.external_check_state)
        .bind(changeset.diff_stat.map(Json))
        .bind(changeset.sync_state.clone().map(Json))
        .bind(changeset.metadata.clone().map(Json))
        .bind(&changeset.failure_message)
        .bind(changeset.num_failures)
        .bind(changeset.num_resets)
        .bind(changeset.started_at)
        .bind(changeset.finished_at)
        .bind(changeset.process_after)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Dequeue the oldest due job, flipping it to `processing` in the same
    /// statement so two workers never observe the same row. At-most-once per
    /// job is guaranteed by `FOR UPDATE SKIP LOCKED`.
    pub async fn dequeue_next(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Option<Changeset>> {
        let row: Option<ChangesetRow> = sqlx::query_as(&format!(
            r#"WITH next AS (
                 SELECT id FROM changeset
                 WHERE reconciler_state = 'queued'
                   AND (process_after IS NULL OR process_after <= now())
                 ORDER BY updated_at
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
               )
               UPDATE changeset SET reconciler_state = 'processing', started_at = now(), updated_at = now()
               WHERE id IN (SELECT id FROM next)
               RETURNING {CHANGESET_COLUMNS}"#
        ))
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Find a *published* changeset on `(repo_id, branch)` owned by a
    /// campaign other than `excluding_campaign_id`. Used by the executor to
    /// enforce the branch-uniqueness invariant before publishing.
    pub async fn find_branch_collision(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        repo_id: RepoId,
        branch: &str,
        excluding_campaign_id: CampaignId,
    ) -> Result<Option<Changeset>> {
        let row: Option<ChangesetRow> = sqlx::query_as(&format!(
            r#"SELECT {CHANGESET_COLUMNS} FROM changeset
               WHERE repo_id = $1 AND external_branch = $2 AND publication_state = 'published'
                 AND (owned_by_campaign_id IS NULL OR owned_by_campaign_id != $3)
               FOR UPDATE"#
        ))
        .bind(repo_id)
        .bind(branch)
        .bind(excluding_campaign_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Into::into))
    }

    /// All changesets owned by `campaign_id`, unpaginated. Used by the
    /// rewirer, which needs the full set to compute its matching.
    pub async fn list_owned(&self, campaign_id: CampaignId) -> Result<Vec<Changeset>> {
        let rows: Vec<ChangesetRow> =
            sqlx::query_as(&format!("SELECT {CHANGESET_COLUMNS} FROM changeset WHERE owned_by_campaign_id = $1"))
                .bind(campaign_id)
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Rewires a changeset onto a new spec: its old `current_spec_id`
    /// becomes `previous_spec_id`, and it's requeued for reconciliation.
    /// Takes a transaction so a rewirer apply can reattach, create, and
    /// detach changesets atomically.
    pub async fn attach_spec(&self, tx: &mut Transaction<'_, Postgres>, changeset_id: ChangesetId, new_spec_id: &ChangesetSpecId) -> Result<()> {
        sqlx::query(
            r#"UPDATE changeset SET
                 previous_spec_id = current_spec_id,
                 current_spec_id = $2,
                 reconciler_state = 'queued',
                 failure_message = NULL,
                 num_failures = 0
               WHERE id = $1"#,
        )
        .bind(changeset_id)
        .bind(new_spec_id.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Removes `campaign_id` from a changeset's associated-campaigns set.
    /// If the changeset is *owned* by that campaign, it also gets enqueued
    /// for close, per the rewirer's detach rule. Takes a transaction for the
    /// same reason as [`Self::attach_spec`].
    pub async fn detach_from_campaign(&self, tx: &mut Transaction<'_, Postgres>, changeset_id: ChangesetId, campaign_id: CampaignId) -> Result<()> {
        sqlx::query(
            r#"UPDATE changeset SET
                 campaign_ids = array_remove(campaign_ids, $2),
                 closing = CASE WHEN owned_by_campaign_id = $2 THEN true ELSE closing END,
                 reconciler_state = CASE WHEN owned_by_campaign_id = $2 THEN 'queued' ELSE reconciler_state END
               WHERE id = $1"#,
        )
        .bind(changeset_id)
        .bind(campaign_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn list(&self, filter: &ListChangesetsFilter, opts: PageOpts<ChangesetId>) -> Result<Page<Changeset, ChangesetId>> {
        let rows: Vec<ChangesetRow> = sqlx::query_as(&format!(
            r#"SELECT {CHANGESET_COLUMNS} FROM changeset c
               WHERE ($1::uuid IS NULL OR $1 = ANY(c.campaign_ids))
                 AND ($2::uuid IS NULL OR c.owned_by_campaign_id = $2)
                 AND ($3::text IS NULL OR c.publication_state = $3)
                 AND ($4::text IS NULL OR c.reconciler_state = $4)
                 AND ($5::text IS NULL OR c.external_state = $5)
                 AND ($6::text IS NULL OR c.external_review_state = $6)
                 AND ($7::text IS NULL OR c.external_check_state = $7)
                 AND (NOT $8 OR c.external_deleted_at IS NULL)
                 AND (NOT $9 OR c.diff_stat IS NULL)
                 AND ($10::uuid IS NULL OR c.id > $10)
               ORDER BY c.id
               LIMIT $11"#
        ))
        .bind(filter.campaign_id)
        .bind(filter.owned_by_campaign_id)
        .bind(filter.publication_state)
        .bind(filter.reconciler_state)
        .bind(filter.external_state)
        .bind(filter.external_review_state)
        .bind(filter.external_check_state)
        .bind(filter.without_deleted)
        .bind(filter.only_without_diff_stats)
        .bind(opts.cursor)
        .bind(opts.limit + 1)
        .fetch_all(&self.db)
        .await?;

        let changesets: Vec<Changeset> = rows.into_iter().map(Into::into).collect();
        Ok(paginate(changesets, opts.limit, |c| c.id))
    }

    /// External ids of published changesets on `repo_id` whose branch
    /// matches any of `refs`. Never errors on an empty match; returns an
    /// empty vec instead.
    pub async fn get_external_ids(&self, repo_id: RepoId, refs: &[String]) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"SELECT external_id FROM changeset
               WHERE repo_id = $1 AND publication_state = 'published'
                 AND external_branch = ANY($2) AND external_id IS NOT NULL"#,
        )
        .bind(repo_id)
        .bind(refs)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    /// Changesets with at least one open campaign association, used by the
    /// external sync scheduler. `Processing` and `Unpublished` rows are
    /// excluded: a row being reconciled right now will get fresh data at the
    /// end of that operation, and an unpublished row has nothing to sync.
    pub async fn list_sync_data(&self) -> Result<Vec<ChangesetSyncData>> {
        let rows: Vec<(ChangesetId, RepoId, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"SELECT c.id, c.repo_id, c.external_id, c.updated_at
               FROM changeset c
               WHERE c.reconciler_state NOT IN ('processing')
                 AND c.publication_state = 'published'
                 AND (c.owned_by_campaign_id IS NOT NULL OR array_length(c.campaign_ids, 1) > 0)"#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, repo_id, external_id, updated_at)| ChangesetSyncData { id, repo_id, external_id, updated_at })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_has_no_duplicate_commas() {
        assert!(!CHANGESET_COLUMNS.contains(",,"));
        assert!(CHANGESET_COLUMNS.contains("reconciler_state"));
    }
}
