use campaigns_core::{ExternalReviewState, ExternalState};
use chrono::{DateTime, Duration, Utc};

use crate::external_state::{state_at, ExternalStateAtTime};
use crate::review_state::{review_state_at, ReviewStateAtTime};

/// A changeset's precomputed history, ready to be sampled at arbitrary
/// points in time.
pub struct ChangesetSample {
    pub created_at: DateTime<Utc>,
    pub external_state_history: Vec<ExternalStateAtTime>,
    pub review_state_history: Vec<ReviewStateAtTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangesetCounts {
    pub at: Option<DateTime<Utc>>,
    pub total: u32,
    pub open: u32,
    pub open_pending: u32,
    pub open_approved: u32,
    pub open_changes_requested: u32,
    pub closed: u32,
    pub merged: u32,
}

/// One sample per 24-hour boundary in `[start, end]`, aggregating every
/// changeset that already existed at that boundary.
pub fn historical_counts(start: DateTime<Utc>, end: DateTime<Utc>, changesets: &[ChangesetSample]) -> Vec<ChangesetCounts> {
    let mut samples = Vec::new();
    let mut boundary = start;

    while boundary <= end {
        let mut counts = ChangesetCounts { at: Some(boundary), ..Default::default() };

        for changeset in changesets {
            if changeset.created_at > boundary {
                continue;
            }
            counts.total += 1;
            match state_at(&changeset.external_state_history, boundary) {
                ExternalState::Open | ExternalState::Draft => {
                    counts.open += 1;
                    match review_state_at(&changeset.review_state_history, boundary) {
                        ExternalReviewState::Pending => counts.open_pending += 1,
                        ExternalReviewState::Approved => counts.open_approved += 1,
                        ExternalReviewState::ChangesRequested => counts.open_changes_requested += 1,
                    }
                }
                ExternalState::Closed | ExternalState::Deleted => counts.closed += 1,
                ExternalState::Merged => counts.merged += 1,
            }
        }

        samples.push(counts);
        boundary += Duration::hours(24);
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_changeset_counts_as_merged_at_every_later_boundary() {
        let t0 = Utc::now();
        let sample = ChangesetSample {
            created_at: t0 - Duration::days(2),
            external_state_history: vec![
                ExternalStateAtTime { at: t0 - Duration::days(2), state: ExternalState::Open },
                ExternalStateAtTime { at: t0 - Duration::days(1), state: ExternalState::Merged },
            ],
            review_state_history: vec![],
        };

        let counts = historical_counts(t0 - Duration::days(2), t0, &[sample]);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].open, 1);
        assert_eq!(counts[1].merged, 1);
        assert_eq!(counts[2].merged, 1);
    }

    #[test]
    fn changeset_not_yet_created_is_excluded() {
        let t0 = Utc::now();
        let sample = ChangesetSample {
            created_at: t0,
            external_state_history: vec![ExternalStateAtTime { at: t0, state: ExternalState::Open }],
            review_state_history: vec![],
        };
        let counts = historical_counts(t0 - Duration::days(1), t0 - Duration::days(1), &[sample]);
        assert_eq!(counts[0].total, 0);
    }
}
