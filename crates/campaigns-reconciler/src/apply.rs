use campaigns_core::{CampaignId, ChangesetSpec, ExternalServiceType, Result};
use campaigns_store::Store;

use crate::rewirer::{rewire, ExistingChangeset, RewireResult};

/// Applies a newly-created `CampaignSpec`'s changeset specs to a campaign:
/// rewires them onto the campaign's previously owned changesets and
/// persists the result.
///
/// `resolve_service_type` maps a spec's repo to the code host it lives on;
/// the rewirer itself is host-agnostic, but creating a brand-new changeset
/// row requires knowing which host client will publish it.
pub async fn apply_campaign_spec(
    store: &Store,
    campaign_id: CampaignId,
    new_changeset_specs: Vec<ChangesetSpec>,
    resolve_service_type: impl Fn(&ChangesetSpec) -> ExternalServiceType,
) -> Result<RewireOutcome> {
    let owned = store.changesets().list_owned(campaign_id).await?;

    let mut existing = Vec::with_capacity(owned.len());
    for changeset in owned {
        let branch_key = match &changeset.external_branch {
            Some(branch) => Some(branch.clone()),
            None => store
                .changeset_specs()
                .get(&changeset.current_spec_id)
                .await
                .ok()
                .and_then(|spec| spec.head_ref().map(str::to_string)),
        };
        existing.push(ExistingChangeset { changeset, branch_key });
    }

    let RewireResult { reused, new_specs, detached } = rewire(existing, new_changeset_specs);

    let mut tx = store.begin().await?;
    for (changeset, spec) in &reused {
        store.changesets().attach_spec(&mut tx, changeset.id, &spec.id).await?;
    }
    for spec in &new_specs {
        store
            .changesets()
            .create_in_tx(&mut tx, spec.repo_id, resolve_service_type(spec), &spec.id, Some(campaign_id))
            .await?;
    }
    for changeset in &detached {
        store.changesets().detach_from_campaign(&mut tx, changeset.id, campaign_id).await?;
    }
    tx.commit().await?;

    Ok(RewireOutcome { reused_count: reused.len(), created_count: new_specs.len(), detached_count: detached.len() })
}

/// Summary counts of an `apply_campaign_spec` call, surfaced to callers
/// (e.g. the CLI or an API response) without exposing the full rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewireOutcome {
    pub reused_count: usize,
    pub created_count: usize,
    pub detached_count: usize,
}
