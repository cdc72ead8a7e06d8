use std::sync::Arc;
use std::time::Duration as StdDuration;

use campaigns_core::{Changeset, Error, ReconcilerState, Result};
use campaigns_store::Store;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backoff::next_retry_at;
use crate::branch_guard::StoreBranchGuard;
use crate::event_source::StoreEventSource;
use crate::executor::Executor;
use crate::git::GitClient;
use crate::source::ChangesetSource;

/// Failures beyond this count stop retrying and leave the changeset in
/// `Failed` for an operator to inspect.
pub const MAX_RETRIES: i32 = 60;

/// Polls the changeset queue and reconciles one job at a time. Several of
/// these can run concurrently against the same database: `dequeue_next`'s
/// `FOR UPDATE SKIP LOCKED` guarantees at-most-once processing per job.
pub struct Worker {
    store: Arc<Store>,
    source: Arc<dyn ChangesetSource>,
    git: Arc<dyn GitClient>,
    external_url_base: String,
    poll_interval: StdDuration,
}

impl Worker {
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn ChangesetSource>,
        git: Arc<dyn GitClient>,
        external_url_base: String,
        poll_interval: StdDuration,
    ) -> Self {
        Self { store, source, git, external_url_base, poll_interval }
    }

    /// Runs until `stop` carries `true`, ticking on `poll_interval` and
    /// reconciling at most one changeset per tick.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("worker stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.process_one().await {
                        error!(error = %err, "reconciler tick failed");
                    }
                }
            }
        }
    }

    async fn process_one(&self) -> Result<()> {
        let changeset = {
            let mut tx = self.store.begin().await?;
            let next = self.store.changesets().dequeue_next(&mut tx).await?;
            tx.commit().await?;
            match next {
                Some(changeset) => changeset,
                None => return Ok(()),
            }
        };

        match self.reconcile(&changeset).await {
            Ok(mut reconciled) => {
                reconciled.reconciler_state = ReconcilerState::Completed;
                reconciled.finished_at = Some(Utc::now());
                reconciled.failure_message = None;
                reconciled.unsynced = false;
                self.finish(reconciled).await
            }
            Err(err) => self.fail(changeset, err).await,
        }
    }

    /// Writes back a changeset's terminal state for this attempt, but only
    /// while it's still `processing`. If a concurrent campaign close already
    /// canceled the row, that write is left alone rather than clobbered.
    async fn finish(&self, changeset: Changeset) -> Result<()> {
        let changeset_id = changeset.id;
        if self.store.changesets().finish_processing(&changeset).await?.is_none() {
            warn!(changeset_id = %changeset_id, "skipped finishing a changeset canceled out from under the worker");
        }
        Ok(())
    }

    async fn reconcile(&self, changeset: &Changeset) -> Result<Changeset> {
        let current_spec = self.store.changeset_specs().get(&changeset.current_spec_id).await?;
        let previous_spec = match &changeset.previous_spec_id {
            Some(id) => Some(self.store.changeset_specs().get(id).await?),
            None => None,
        };
        let owner = changeset
            .owned_by_campaign_id
            .ok_or_else(|| Error::Unexpected(format!("changeset {} has no owning campaign", changeset.id)))?;
        let campaign = self.store.campaigns().get(owner).await?;

        let branch_guard = StoreBranchGuard { store: self.store.as_ref() };
        let events = StoreEventSource { store: self.store.as_ref() };
        let executor = Executor {
            branch_guard: &branch_guard,
            source: self.source.as_ref(),
            git: self.git.as_ref(),
            events: &events,
            external_url_base: &self.external_url_base,
        };

        executor.reconcile(changeset.clone(), &campaign, &current_spec, previous_spec.as_ref()).await
    }

    /// Records a failed attempt. Retryable errors are requeued with
    /// exponential backoff up to `MAX_RETRIES`; non-retryable domain errors
    /// (a bad spec, a branch collision) go straight to `Failed` since
    /// retrying won't change the outcome.
    async fn fail(&self, mut changeset: Changeset, err: Error) -> Result<()> {
        warn!(changeset_id = %changeset.id, error = %err, "reconciler operation failed");
        changeset.num_failures += 1;
        changeset.failure_message = Some(err.to_string());
        changeset.finished_at = Some(Utc::now());

        if err.is_retryable() && changeset.num_failures < MAX_RETRIES {
            changeset.reconciler_state = ReconcilerState::Queued;
            changeset.process_after = Some(next_retry_at(Utc::now(), changeset.num_failures));
        } else {
            changeset.reconciler_state = ReconcilerState::Failed;
            changeset.process_after = None;
        }

        self.finish(changeset).await
    }
}
