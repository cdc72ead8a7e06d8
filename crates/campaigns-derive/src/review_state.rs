use std::collections::HashMap;

use campaigns_core::{ChangesetEvent, ChangesetEventKind, ChangesetEventMetadata, ExternalReviewState, ReviewDecision, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewStateAtTime {
    pub at: DateTime<Utc>,
    pub state: ExternalReviewState,
}

fn reduce(map: &HashMap<String, ReviewDecision>) -> ExternalReviewState {
    if map.values().any(|d| *d == ReviewDecision::ChangesRequested) {
        ExternalReviewState::ChangesRequested
    } else if map.values().any(|d| *d == ReviewDecision::Approved) {
        ExternalReviewState::Approved
    } else {
        ExternalReviewState::Pending
    }
}

/// Fold the per-author review map forward, recording a step whenever the
/// reduced state changes. GitHub's `ReviewDismissed` event is always
/// ignored: GitHub mutates the original review event in place rather than
/// emitting a true dismissal, so acting on it here would double-count.
pub fn fold_review_state(events: &[ChangesetEvent]) -> Result<Vec<ReviewStateAtTime>> {
    let mut by_author: HashMap<String, ReviewDecision> = HashMap::new();
    let mut history = Vec::new();
    let mut last = reduce(&by_author);

    for event in events {
        match event.kind {
            ChangesetEventKind::ReviewDismissed => continue,
            ChangesetEventKind::Reviewed => {
                if let ChangesetEventMetadata::Review { author, decision } = &event.metadata {
                    if author.is_empty() {
                        continue;
                    }
                    if *decision == ReviewDecision::Dismissed {
                        by_author.remove(author);
                    } else {
                        by_author.insert(author.clone(), *decision);
                    }
                }
            }
            ChangesetEventKind::Unapproved | ChangesetEventKind::ReviewDismissedBitbucket => {
                if let ChangesetEventMetadata::Review { author, .. } = &event.metadata {
                    if by_author.remove(author).is_none() {
                        tracing::warn!(
                            changeset_id = %event.changeset_id,
                            author = %author,
                            "bitbucket unapprove/dismiss with no matching prior review event",
                        );
                    }
                }
            }
            _ => continue,
        }

        let next = reduce(&by_author);
        if next != last {
            last = next;
            history.push(ReviewStateAtTime { at: event.created_at, state: next });
        }
    }

    Ok(history)
}

pub fn review_state_at(history: &[ReviewStateAtTime], at: DateTime<Utc>) -> ExternalReviewState {
    history
        .iter()
        .rev()
        .find(|step| step.at <= at)
        .map(|step| step.state)
        .unwrap_or(ExternalReviewState::Pending)
}
