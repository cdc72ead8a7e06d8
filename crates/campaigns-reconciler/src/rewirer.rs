use campaigns_core::{Changeset, ChangesetSpec, ChangesetSpecKind};

/// An existing changeset owned by a campaign, along with the branch it's
/// keyed on: its `external_branch` once published, or the `head_ref` of its
/// current spec before that (so branch specs can be rewired onto a
/// changeset that's still mid-publish).
pub struct ExistingChangeset {
    pub changeset: Changeset,
    pub branch_key: Option<String>,
}

pub struct RewireResult {
    /// Existing changesets that are still desired, paired with the spec
    /// they should now be reconciled against.
    pub reused: Vec<(Changeset, ChangesetSpec)>,
    /// Specs with no matching existing changeset: a new changeset row must
    /// be created for each.
    pub new_specs: Vec<ChangesetSpec>,
    /// Existing changesets with no matching spec left in this campaign
    /// apply: detach from the campaign and enqueue a close.
    pub detached: Vec<Changeset>,
}

/// Match a campaign's new desired `ChangesetSpec`s against its previously
/// owned changesets. Tracking specs match by external id; branch specs
/// match by branch. Pure function, no I/O.
pub fn rewire(existing: Vec<ExistingChangeset>, specs: Vec<ChangesetSpec>) -> RewireResult {
    let mut remaining = existing;
    let mut reused = Vec::new();
    let mut new_specs = Vec::new();

    for spec in specs {
        let found = match &spec.kind {
            ChangesetSpecKind::Tracking { external_id } => remaining
                .iter()
                .position(|e| e.changeset.external_id.as_deref() == Some(external_id.as_str())),
            ChangesetSpecKind::Branch { head_ref, .. } => {
                remaining.iter().position(|e| e.branch_key.as_deref() == Some(head_ref.as_str()))
            }
        };

        match found {
            Some(i) => reused.push((remaining.remove(i).changeset, spec)),
            None => new_specs.push(spec),
        }
    }

    RewireResult { reused, new_specs, detached: remaining.into_iter().map(|e| e.changeset).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaigns_core::{CampaignSpecId, ChangesetSpecId, CommitSpec, PublicationState, PublishedValue, ReconcilerState};
    use chrono::Utc;
    use uuid::Uuid;

    fn changeset(external_branch: Option<&str>, external_id: Option<&str>) -> Changeset {
        Changeset {
            id: Uuid::new_v4(),
            repo_id: Uuid::new_v4(),
            external_service_type: campaigns_core::ExternalServiceType::Github,
            external_id: external_id.map(String::from),
            external_branch: external_branch.map(String::from),
            owned_by_campaign_id: Some(Uuid::new_v4()),
            campaign_ids: vec![],
            current_spec_id: ChangesetSpecId::new(),
            previous_spec_id: None,
            publication_state: PublicationState::Published,
            reconciler_state: ReconcilerState::Completed,
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

    fn branch_spec(head_ref: &str) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId::new(),
            repo_id: Uuid::new_v4(),
            campaign_spec_id: CampaignSpecId::new(),
            kind: ChangesetSpecKind::Branch {
                head_ref: head_ref.into(),
                base_ref: "refs/heads/main".into(),
                title: "t".into(),
                body: "b".into(),
                commit: CommitSpec { diff: "d".into(), message: "m".into(), author_name: "a".into(), author_email: "a@example.invalid".into() },
                published: PublishedValue::True,
            },
            created_at: Utc::now(),
        }
    }

    fn tracking_spec(external_id: &str) -> ChangesetSpec {
        ChangesetSpec {
            id: ChangesetSpecId::new(),
            repo_id: Uuid::new_v4(),
            campaign_spec_id: CampaignSpecId::new(),
            kind: ChangesetSpecKind::Tracking { external_id: external_id.into() },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn branch_spec_reuses_changeset_with_matching_branch() {
        let existing = changeset(Some("refs/heads/x"), None);
        let spec = branch_spec("refs/heads/x");
        let result = rewire(vec![ExistingChangeset { changeset: existing, branch_key: Some("refs/heads/x".into()) }], vec![spec]);

        assert_eq!(result.reused.len(), 1);
        assert!(result.new_specs.is_empty());
        assert!(result.detached.is_empty());
    }

    #[test]
    fn tracking_spec_reuses_changeset_with_matching_external_id() {
        let existing = changeset(None, Some("42"));
        let spec = tracking_spec("42");
        let result = rewire(vec![ExistingChangeset { changeset: existing, branch_key: None }], vec![spec]);

        assert_eq!(result.reused.len(), 1);
        assert!(result.detached.is_empty());
    }

    #[test]
    fn unmatched_spec_becomes_a_new_changeset() {
        let result = rewire(vec![], vec![branch_spec("refs/heads/new")]);
        assert_eq!(result.new_specs.len(), 1);
        assert!(result.reused.is_empty());
    }

    #[test]
    fn unmatched_existing_changeset_is_detached() {
        let existing = changeset(Some("refs/heads/gone"), None);
        let result = rewire(vec![ExistingChangeset { changeset: existing, branch_key: Some("refs/heads/gone".into()) }], vec![branch_spec("refs/heads/new")]);

        assert_eq!(result.detached.len(), 1);
        assert_eq!(result.new_specs.len(), 1);
        assert!(result.reused.is_empty());
    }

    #[test]
    fn each_existing_changeset_is_matched_at_most_once() {
        let existing = changeset(Some("refs/heads/x"), None);
        let result = rewire(
            vec![ExistingChangeset { changeset: existing, branch_key: Some("refs/heads/x".into()) }],
            vec![branch_spec("refs/heads/x"), branch_spec("refs/heads/x")],
        );

        assert_eq!(result.reused.len(), 1);
        assert_eq!(result.new_specs.len(), 1);
        assert!(result.detached.is_empty());
    }
}
