use chrono::Utc;

use campaigns_core::{
    Campaign, Changeset, ChangesetSpec, ChangesetSpecKind, Error, ExternalState, PublicationState, Result,
};
use campaigns_derive::{
    compute_sync_state, fold_check_state, fold_external_state, fold_review_state, review_state_at, should_recompute_diff_stat, state_at,
};

use crate::branch_guard::BranchGuard;
use crate::event_source::EventSource;
use crate::git::{CommitAuthor, GitClient};
use crate::planner::{plan, Operation};
use crate::source::{ChangesetFields, ChangesetSource};

/// The collaborators an `Executor` needs to turn a plan into side effects.
/// Held by reference so the worker can build one per job without taking
/// ownership of long-lived clients.
pub struct Executor<'a> {
    pub branch_guard: &'a dyn BranchGuard,
    pub source: &'a dyn ChangesetSource,
    pub git: &'a dyn GitClient,
    pub events: &'a dyn EventSource,
    /// Base URL used to build the campaign backlink, e.g.
    /// `https://sourcegraph.example.com`.
    pub external_url_base: &'a str,
}

impl<'a> Executor<'a> {
    /// Plan and apply every operation the current spec calls for, returning
    /// the changeset with its external-facing fields updated. Does not
    /// persist; the caller is responsible for writing the result back.
    pub async fn reconcile(
        &self,
        mut changeset: Changeset,
        campaign: &Campaign,
        current_spec: &ChangesetSpec,
        previous_spec: Option<&ChangesetSpec>,
    ) -> Result<Changeset> {
        let ops = plan(&changeset, current_spec, previous_spec, self.source.supports_drafts());
        for op in ops {
            changeset = self.apply(changeset, campaign, current_spec, op).await?;
        }
        if changeset.external_id.is_some() {
            changeset = self.recompute_derived_state(changeset, current_spec).await?;
        }
        Ok(changeset)
    }

    /// Folds the changeset's recorded events into its review/check/external
    /// derived state and writes the result back onto the changeset. Run
    /// after every successful plan, not just on an explicit `Sync`
    /// operation, so review and check state stay current even when the plan
    /// itself didn't touch the commit.
    async fn recompute_derived_state(&self, mut changeset: Changeset, spec: &ChangesetSpec) -> Result<Changeset> {
        let events = self.events.list(changeset.id).await?;
        let now = Utc::now();

        if let Some(metadata) = changeset.metadata.clone() {
            let history = fold_external_state(changeset.created_at, Some(&metadata), spec.is_tracking(), &events, changeset.external_deleted_at)?;
            changeset.external_state = Some(state_at(&history, now));
            changeset.external_check_state = Some(fold_check_state(&events, metadata.head_oid())?);
        }

        let review_history = fold_review_state(&events)?;
        changeset.external_review_state = Some(review_state_at(&review_history, now));

        Ok(changeset)
    }

    async fn apply(&self, mut changeset: Changeset, campaign: &Campaign, spec: &ChangesetSpec, op: Operation) -> Result<Changeset> {
        match op {
            Operation::Import => {
                let ChangesetSpecKind::Tracking { external_id } = &spec.kind else {
                    return Err(Error::Unexpected("Import planned for a non-tracking spec".into()));
                };
                let metadata = self.source.load(external_id).await?;
                changeset.external_id = Some(external_id.clone());
                changeset.publication_state = PublicationState::Published;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Push => {
                let (fields, commit) = self.branch_fields(spec, campaign)?;
                let author = CommitAuthor { name: commit.author_name.clone(), email: commit.author_email.clone() };
                self.git
                    .create_commit_from_patch(changeset.repo_id, &fields.head_ref, &fields.base_ref, &commit.diff, &commit.message, &author)
                    .await?;
                changeset.external_branch = Some(fields.head_ref);
            }

            Operation::Publish | Operation::PublishDraft => {
                let (fields, _commit) = self.branch_fields(spec, campaign)?;
                self.guard_branch_uniqueness(&changeset, &fields.head_ref).await?;
                let (metadata, already_exists) = if op == Operation::PublishDraft {
                    self.source.create_draft(&fields).await?
                } else {
                    self.source.create(&fields).await?
                };
                let metadata = if already_exists {
                    self.source.update(metadata.external_id(), &fields).await?
                } else {
                    metadata
                };
                changeset.external_branch = Some(fields.head_ref);
                changeset.publication_state = PublicationState::Published;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Update => {
                let (fields, _commit) = self.branch_fields(spec, campaign)?;
                let external_id = require_external_id(&changeset)?.to_string();
                let metadata = self.source.update(&external_id, &fields).await?;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Close => {
                let external_id = require_external_id(&changeset)?.to_string();
                let metadata = self.source.close(&external_id).await?;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Reopen => {
                let external_id = require_external_id(&changeset)?.to_string();
                let metadata = self.source.reopen(&external_id).await?;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Undraft => {
                let external_id = require_external_id(&changeset)?.to_string();
                let metadata = self.source.undraft(&external_id).await?;
                changeset = apply_metadata(changeset, metadata);
            }

            Operation::Sync => {
                changeset = self.sync_external_state(changeset).await?;
            }
        }
        Ok(changeset)
    }

    fn branch_fields(&self, spec: &ChangesetSpec, campaign: &Campaign) -> Result<(ChangesetFields, campaigns_core::CommitSpec)> {
        match &spec.kind {
            ChangesetSpecKind::Branch { head_ref, base_ref, title, body, commit, .. } => Ok((
                ChangesetFields {
                    head_ref: head_ref.clone(),
                    base_ref: base_ref.clone(),
                    title: title.clone(),
                    body: backlink(body, campaign, self.external_url_base),
                },
                commit.clone(),
            )),
            ChangesetSpecKind::Tracking { .. } => Err(Error::Unexpected("branch operation planned for a tracking spec".into())),
        }
    }

    async fn guard_branch_uniqueness(&self, changeset: &Changeset, branch: &str) -> Result<()> {
        let Some(owner) = changeset.owned_by_campaign_id else {
            return Ok(());
        };
        self.branch_guard.check(changeset.repo_id, branch, owner).await
    }

    async fn sync_external_state(&self, mut changeset: Changeset) -> Result<Changeset> {
        let metadata = changeset
            .metadata
            .clone()
            .ok_or_else(|| Error::Unexpected("Sync planned on a changeset with no synced metadata".into()))?;
        let external_state = changeset.external_state.unwrap_or(ExternalState::Open);
        let sync_state = compute_sync_state(&metadata, external_state);
        if should_recompute_diff_stat(changeset.sync_state.as_ref(), &sync_state) {
            let diff_stat = self.git.diff_stat(changeset.repo_id, metadata.base_oid(), metadata.head_oid()).await?;
            changeset.diff_stat = Some(diff_stat);
        }
        changeset.sync_state = Some(sync_state);
        Ok(changeset)
    }
}

fn require_external_id(changeset: &Changeset) -> Result<&str> {
    changeset
        .external_id
        .as_deref()
        .ok_or_else(|| Error::Unexpected("operation planned on a changeset with no external id".into()))
}

fn apply_metadata(mut changeset: Changeset, metadata: campaigns_core::ChangesetMetadata) -> Changeset {
    changeset.external_id = Some(metadata.external_id().to_string());
    changeset.external_state = Some(if metadata.is_draft() { ExternalState::Draft } else { ExternalState::Open });
    changeset.metadata = Some(metadata);
    changeset
}

fn backlink(body: &str, campaign: &Campaign, external_url_base: &str) -> String {
    format!(
        "{body}\n\n---\nCreated by Sourcegraph campaign [`{namespace}/{name}`]({base}/campaigns/{namespace}/{name}).",
        body = body,
        namespace = campaign.namespace,
        name = campaign.name,
        base = external_url_base.trim_end_matches('/'),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_guard::fake::FakeBranchGuard;
    use crate::event_source::fake::FakeEventSource;
    use crate::git::fake::FakeGitClient;
    use crate::source::fake::{Call, FakeSource};
    use campaigns_core::{CampaignSpecId, ChangesetSpecId, CommitSpec, PublishedValue, ReconcilerState};
    use chrono::Utc;
    use uuid::Uuid;

    fn campaign() -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            name: "rename-foo".into(),
            description: None,
            namespace: "acme-corp".into(),
            author: "alice".into(),
            branch: "campaigns/rename-foo".into(),
            current_spec_id: CampaignSpecId::new(),
            last_applied_at: Utc::now(),
            last_applier: "alice".into(),
            closed_at: None,
        }
    }

    fn branch_spec(published: PublishedValue) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId::new(),
            repo_id: Uuid::new_v4(),
            campaign_spec_id: CampaignSpecId::new(),
            kind: ChangesetSpecKind::Branch {
                head_ref: "refs/heads/rename-foo".into(),
                base_ref: "refs/heads/main".into(),
                title: "Rename foo to bar".into(),
                body: "This renames foo to bar.".into(),
                commit: CommitSpec { diff: "diff".into(), message: "rename foo".into(), author_name: "a".into(), author_email: "a@example.invalid".into() },
                published,
            },
            created_at: Utc::now(),
        }
    }

    fn unpublished_changeset(repo_id: Uuid, spec_id: ChangesetSpecId, owner: Uuid) -> Changeset {
        Changeset {
            id: Uuid::new_v4(),
            repo_id,
            external_service_type: campaigns_core::ExternalServiceType::Github,
            external_id: None,
            external_branch: None,
            owned_by_campaign_id: Some(owner),
            campaign_ids: vec![owner],
            current_spec_id: spec_id,
            previous_spec_id: None,
            publication_state: PublicationState::Unpublished,
            reconciler_state: ReconcilerState::Queued,
            closing: false,
            unsynced: false,
            external_deleted_at: None,
            external_state: None,
            external_review_state: None,
            external_check_state: None,
            diff_stat: None,
            sync_state: None,
            metadata: None,
            failure_message: None,
            num_failures: 0,
            num_resets: 0,
            started_at: None,
            finished_at: None,
            process_after: None,
            updated_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn backlink_names_the_campaign_and_links_to_it() {
        let body = backlink("Does a thing.", &campaign(), "https://sourcegraph.example.com/");
        assert!(body.contains("Created by Sourcegraph campaign [`acme-corp/rename-foo`]"));
        assert!(body.contains("https://sourcegraph.example.com/campaigns/acme-corp/rename-foo"));
    }

    #[tokio::test]
    async fn publishing_pushes_the_commit_then_creates_the_changeset() {
        let source = FakeSource::new();
        let git = FakeGitClient::new();
        let guard = FakeBranchGuard::new();
        let events = FakeEventSource::new();
        let campaign = campaign();
        let spec = branch_spec(PublishedValue::True);
        let changeset = unpublished_changeset(spec.repo_id, spec.id, campaign.id);

        let executor = Executor { branch_guard: &guard, source: &source, git: &git, events: &events, external_url_base: "https://sourcegraph.example.com" };
        let result = executor.reconcile(changeset, &campaign, &spec, None).await.unwrap();

        assert_eq!(git.pushes(), vec!["refs/heads/rename-foo".to_string()]);
        assert_eq!(source.calls(), vec![Call::Create("refs/heads/rename-foo".to_string())]);
        assert_eq!(result.publication_state, PublicationState::Published);
        assert_eq!(result.external_branch.as_deref(), Some("refs/heads/rename-foo"));
    }

    #[tokio::test]
    async fn publish_recovers_by_updating_when_the_pr_already_exists() {
        let mut source = FakeSource::new();
        source.already_exists_on_create = true;
        let git = FakeGitClient::new();
        let guard = FakeBranchGuard::new();
        let events = FakeEventSource::new();
        let campaign = campaign();
        let spec = branch_spec(PublishedValue::True);
        let changeset = unpublished_changeset(spec.repo_id, spec.id, campaign.id);

        let executor = Executor { branch_guard: &guard, source: &source, git: &git, events: &events, external_url_base: "https://sourcegraph.example.com" };
        executor.reconcile(changeset, &campaign, &spec, None).await.unwrap();

        let calls = source.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], Call::Create(_)));
        assert!(matches!(calls[1], Call::Update(_)));
    }

    #[tokio::test]
    async fn publish_fails_when_the_branch_is_already_published_by_another_campaign() {
        let source = FakeSource::new();
        let git = FakeGitClient::new();
        let guard = FakeBranchGuard { collision: true };
        let events = FakeEventSource::new();
        let campaign = campaign();
        let spec = branch_spec(PublishedValue::True);
        let changeset = unpublished_changeset(spec.repo_id, spec.id, campaign.id);

        let executor = Executor { branch_guard: &guard, source: &source, git: &git, events: &events, external_url_base: "https://sourcegraph.example.com" };
        let err = executor.reconcile(changeset, &campaign, &spec, None).await.unwrap_err();

        assert!(matches!(err, Error::PublishSameBranch { .. }));
        assert!(source.calls().is_empty());
    }
}
