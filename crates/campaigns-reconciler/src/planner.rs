use campaigns_core::{Changeset, ChangesetSpec, ChangesetSpecKind, CommitSpec, ExternalState, PublishedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Import,
    Publish,
    PublishDraft,
    Update,
    Push,
    Sync,
    Close,
    Reopen,
    Undraft,
}

struct BranchFields<'a> {
    head_ref: &'a str,
    base_ref: &'a str,
    title: &'a str,
    body: &'a str,
    commit: &'a CommitSpec,
    published: PublishedValue,
}

fn branch_fields(spec: &ChangesetSpec) -> Option<BranchFields<'_>> {
    match &spec.kind {
        ChangesetSpecKind::Branch { head_ref, base_ref, title, body, commit, published } => {
            Some(BranchFields { head_ref, base_ref, title, body, commit, published: *published })
        }
        ChangesetSpecKind::Tracking { .. } => None,
    }
}

/// Pure decision procedure: given a changeset's persisted state and its
/// current (and, if any, previous) spec, decide which operations the
/// executor must run, in order. Never touches the network or the database.
pub fn plan(changeset: &Changeset, current: &ChangesetSpec, previous: Option<&ChangesetSpec>, host_supports_drafts: bool) -> Vec<Operation> {
    if current.is_tracking() {
        return if !changeset.is_published() { vec![Operation::Import] } else { vec![] };
    }

    let Some(current_fields) = branch_fields(current) else {
        return vec![];
    };

    if !changeset.is_published() {
        return match current_fields.published {
            PublishedValue::False => vec![],
            PublishedValue::True => vec![Operation::Push, Operation::Publish],
            PublishedValue::Draft if host_supports_drafts => vec![Operation::Push, Operation::PublishDraft],
            PublishedValue::Draft => vec![],
        };
    }

    if changeset.closing {
        return match changeset.external_state {
            Some(ExternalState::Open) | Some(ExternalState::Draft) => vec![Operation::Close],
            _ => vec![],
        };
    }

    let mut ops = Vec::new();

    if changeset.external_state == Some(ExternalState::Closed) && current_fields.published.wants_publish() {
        ops.push(Operation::Reopen);
    } else if changeset.external_state == Some(ExternalState::Draft) && current_fields.published == PublishedValue::True {
        ops.push(Operation::Undraft);
    }

    if let Some(previous) = previous.and_then(branch_fields) {
        if current_fields.title != previous.title || current_fields.body != previous.body {
            ops.push(Operation::Update);
        }
        if current_fields.commit != previous.commit {
            ops.push(Operation::Push);
            ops.push(Operation::Sync);
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaigns_core::ChangesetSpecId;
    use chrono::Utc;
    use uuid::Uuid;

    fn commit(msg: &str) -> CommitSpec {
        CommitSpec { diff: "diff".into(), message: msg.into(), author_name: "a".into(), author_email: "a@example.invalid".into() }
    }

    fn branch_spec(title: &str, body: &str, commit_msg: &str, published: PublishedValue) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId::new(),
            repo_id: Uuid::new_v4(),
            campaign_spec_id: campaigns_core::CampaignSpecId::new(),
            kind: ChangesetSpecKind::Branch {
                head_ref: "refs/heads/x".into(),
                base_ref: "refs/heads/main".into(),
                title: title.into(),
                body: body.into(),
                commit: commit(commit_msg),
                published,
            },
            created_at: Utc::now(),
        }
    }

    fn unpublished_changeset(spec_id: ChangesetSpecId) -> Changeset {
        use campaigns_core::{PublicationState, ReconcilerState};
        Changeset {
            id: Uuid::new_v4(),
            repo_id: Uuid::new_v4(),
            external_service_type: campaigns_core::ExternalServiceType::Github,
            external_id: None,
            external_branch: None,
            owned_by_campaign_id: Some(Uuid::new_v4()),
            campaign_ids: vec![],
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
    fn unpublished_true_pushes_then_publishes() {
        let spec = branch_spec("T", "B", "m", PublishedValue::True);
        let changeset = unpublished_changeset(spec.id);
        let ops = plan(&changeset, &spec, None, true);
        assert_eq!(ops, vec![Operation::Push, Operation::Publish]);
    }

    #[test]
    fn unpublished_false_is_a_noop() {
        let spec = branch_spec("T", "B", "m", PublishedValue::False);
        let changeset = unpublished_changeset(spec.id);
        assert!(plan(&changeset, &spec, None, true).is_empty());
    }

    #[test]
    fn draft_unsupported_by_host_is_a_noop() {
        let spec = branch_spec("T", "B", "m", PublishedValue::Draft);
        let changeset = unpublished_changeset(spec.id);
        assert!(plan(&changeset, &spec, None, false).is_empty());
    }

    #[test]
    fn metadata_only_change_plans_update_without_push() {
        let previous = branch_spec("old title", "B", "m", PublishedValue::True);
        let current = branch_spec("new title", "B", "m", PublishedValue::True);
        let mut changeset = unpublished_changeset(current.id);
        changeset.publication_state = campaigns_core::PublicationState::Published;
        changeset.external_branch = Some("refs/heads/x".into());
        changeset.external_state = Some(ExternalState::Open);

        let ops = plan(&changeset, &current, Some(&previous), true);
        assert_eq!(ops, vec![Operation::Update]);
    }

    #[test]
    fn commit_change_plans_push_then_sync() {
        let previous = branch_spec("T", "B", "old commit", PublishedValue::True);
        let current = branch_spec("T", "B", "new commit", PublishedValue::True);
        let mut changeset = unpublished_changeset(current.id);
        changeset.publication_state = campaigns_core::PublicationState::Published;
        changeset.external_branch = Some("refs/heads/x".into());
        changeset.external_state = Some(ExternalState::Open);

        let ops = plan(&changeset, &current, Some(&previous), true);
        assert_eq!(ops, vec![Operation::Push, Operation::Sync]);
    }

    #[test]
    fn closing_an_open_changeset_plans_close() {
        let spec = branch_spec("T", "B", "m", PublishedValue::True);
        let mut changeset = unpublished_changeset(spec.id);
        changeset.publication_state = campaigns_core::PublicationState::Published;
        changeset.external_state = Some(ExternalState::Open);
        changeset.closing = true;

        assert_eq!(plan(&changeset, &spec, None, true), vec![Operation::Close]);
    }

    #[test]
    fn closing_an_already_closed_changeset_is_a_noop() {
        let spec = branch_spec("T", "B", "m", PublishedValue::True);
        let mut changeset = unpublished_changeset(spec.id);
        changeset.publication_state = campaigns_core::PublicationState::Published;
        changeset.external_state = Some(ExternalState::Closed);
        changeset.closing = true;

        assert!(plan(&changeset, &spec, None, true).is_empty());
    }

    #[test]
    fn reopen_with_metadata_and_commit_changes() {
        let previous = branch_spec("old", "B", "old commit", PublishedValue::True);
        let current = branch_spec("new", "B", "new commit", PublishedValue::True);
        let mut changeset = unpublished_changeset(current.id);
        changeset.publication_state = campaigns_core::PublicationState::Published;
        changeset.external_state = Some(ExternalState::Closed);

        let ops = plan(&changeset, &current, Some(&previous), true);
        assert_eq!(ops, vec![Operation::Reopen, Operation::Update, Operation::Push, Operation::Sync]);
    }

    #[test]
    fn tracking_spec_on_unpublished_changeset_imports() {
        let spec = ChangesetSpec {
            id: ChangesetSpecId::new(),
            repo_id: Uuid::new_v4(),
            campaign_spec_id: campaigns_core::CampaignSpecId::new(),
            kind: ChangesetSpecKind::Tracking { external_id: "42".into() },
            created_at: Utc::now(),
        };
        let changeset = unpublished_changeset(spec.id);
        assert_eq!(plan(&changeset, &spec, None, true), vec![Operation::Import]);
    }
}
