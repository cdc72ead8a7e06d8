use campaigns_core::{CampaignId, Result};
use campaigns_derive::{fold_external_state, fold_review_state, historical_counts, ChangesetCounts, ChangesetSample};
use campaigns_store::Store;
use chrono::{DateTime, Utc};

/// Builds the burndown samples (§4.2.4) for a campaign's changesets between
/// `start` and `end`, one per 24-hour boundary.
pub async fn campaign_burndown(store: &Store, campaign_id: CampaignId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ChangesetCounts>> {
    let owned = store.changesets().list_owned(campaign_id).await?;

    let mut samples = Vec::with_capacity(owned.len());
    for changeset in owned {
        let events = store.events().list_for_changeset(changeset.id).await?;
        let is_tracking = store.changeset_specs().get(&changeset.current_spec_id).await.map(|spec| spec.is_tracking()).unwrap_or(false);

        let external_state_history =
            fold_external_state(changeset.created_at, changeset.metadata.as_ref(), is_tracking, &events, changeset.external_deleted_at)?;
        let review_state_history = fold_review_state(&events)?;

        samples.push(ChangesetSample { created_at: changeset.created_at, external_state_history, review_state_history });
    }

    Ok(historical_counts(start, end, &samples))
}
