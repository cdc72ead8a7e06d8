use campaigns_core::{ChangesetEvent, ChangesetEventKind, ChangesetMetadata, Error, ExternalState, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalStateAtTime {
    pub at: DateTime<Utc>,
    pub state: ExternalState,
}

fn is_draft_toggle(kind: ChangesetEventKind) -> Option<bool> {
    match kind {
        ChangesetEventKind::ConvertToDraft | ChangesetEventKind::MarkWorkInProgress => Some(true),
        ChangesetEventKind::ReadyForReview | ChangesetEventKind::UnmarkWorkInProgress => Some(false),
        _ => None,
    }
}

fn infer_current_state(metadata: Option<&ChangesetMetadata>, _is_tracking: bool) -> ExternalState {
    match metadata {
        Some(m) if m.is_draft() => ExternalState::Draft,
        _ => ExternalState::Open,
    }
}

fn assert_sorted(events: &[ChangesetEvent]) -> Result<()> {
    for i in 1..events.len() {
        if events[i].created_at < events[i - 1].created_at {
            return Err(Error::UnsortedEvents { index: i });
        }
    }
    Ok(())
}

/// Fold a changeset's timeline into a step function of `(t, external_state)`.
/// `created_at` is the changeset's external creation time and seeds the
/// first step; `external_deleted_at`, if set, always wins as the final step
/// regardless of a prior Merged state (the one exception to "Merged is
/// terminal").
pub fn fold_external_state(
    created_at: DateTime<Utc>,
    metadata: Option<&ChangesetMetadata>,
    is_tracking: bool,
    events: &[ChangesetEvent],
    external_deleted_at: Option<DateTime<Utc>>,
) -> Result<Vec<ExternalStateAtTime>> {
    assert_sorted(events)?;

    // Reconstruct the state that was valid before the first event by walking
    // backward from the current known state and undoing draft toggles.
    let mut state = infer_current_state(metadata, is_tracking);
    for event in events.iter().rev() {
        if let Some(was_draft) = is_draft_toggle(event.kind) {
            state = if was_draft { ExternalState::Draft } else { ExternalState::Open };
        }
    }

    let mut history = vec![ExternalStateAtTime { at: created_at, state }];

    for event in events {
        let next = apply_transition(state, event.kind);
        if next != state {
            state = next;
            history.push(ExternalStateAtTime { at: event.created_at, state });
        }
    }

    if let Some(deleted_at) = external_deleted_at {
        history.push(ExternalStateAtTime { at: deleted_at, state: ExternalState::Closed });
    }

    Ok(history)
}

fn apply_transition(current: ExternalState, kind: ChangesetEventKind) -> ExternalState {
    if current.is_terminal() {
        // Merged is terminal; only deletion (handled by the caller) can move
        // past it.
        return current;
    }
    match kind {
        ChangesetEventKind::Closed | ChangesetEventKind::Declined => match current {
            ExternalState::Open | ExternalState::Draft => ExternalState::Closed,
            other => other,
        },
        ChangesetEventKind::Merged => ExternalState::Merged,
        ChangesetEventKind::ConvertToDraft | ChangesetEventKind::MarkWorkInProgress => {
            if current == ExternalState::Open {
                ExternalState::Draft
            } else {
                current
            }
        }
        ChangesetEventKind::ReadyForReview
        | ChangesetEventKind::UnmarkWorkInProgress
        | ChangesetEventKind::Reopened => {
            if current == ExternalState::Draft || current == ExternalState::Closed {
                ExternalState::Open
            } else {
                current
            }
        }
        _ => current,
    }
}

/// Returns the state valid at `at`, i.e. the last step whose timestamp is
/// `<= at`, or the first step if `at` precedes the whole history.
pub fn state_at(history: &[ExternalStateAtTime], at: DateTime<Utc>) -> ExternalState {
    history
        .iter()
        .rev()
        .find(|step| step.at <= at)
        .or_else(|| history.first())
        .map(|step| step.state)
        .unwrap_or(ExternalState::Open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaigns_core::{ChangesetEventMetadata, GithubPr};
    use uuid::Uuid;

    fn event(kind: ChangesetEventKind, at: DateTime<Utc>) -> ChangesetEvent {
        ChangesetEvent {
            id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            kind,
            key: "k".into(),
            metadata: ChangesetEventMetadata::Empty,
            created_at: at,
            updated_at: at,
        }
    }

    fn pr(is_draft: bool) -> ChangesetMetadata {
        ChangesetMetadata::GithubPr(GithubPr {
            number: "1".into(),
            title: "t".into(),
            body: "b".into(),
            url: "https://example.invalid/pr/1".into(),
            is_draft,
            head_oid: "head".into(),
            base_oid: "base".into(),
        })
    }

    #[test]
    fn merged_is_terminal() {
        let t0 = Utc::now();
        let events = vec![
            event(ChangesetEventKind::Merged, t0 + chrono::Duration::seconds(1)),
            event(ChangesetEventKind::Closed, t0 + chrono::Duration::seconds(2)),
        ];
        let history = fold_external_state(t0, Some(&pr(false)), false, &events, None).unwrap();
        assert_eq!(history.last().unwrap().state, ExternalState::Merged);
    }

    #[test]
    fn deletion_overrides_merged() {
        let t0 = Utc::now();
        let events = vec![event(ChangesetEventKind::Merged, t0 + chrono::Duration::seconds(1))];
        let deleted = t0 + chrono::Duration::seconds(5);
        let history = fold_external_state(t0, Some(&pr(false)), false, &events, Some(deleted)).unwrap();
        assert_eq!(history.last().unwrap().state, ExternalState::Closed);
        assert_eq!(history.last().unwrap().at, deleted);
    }

    #[test]
    fn unsorted_events_are_rejected() {
        let t0 = Utc::now();
        let events = vec![
            event(ChangesetEventKind::Closed, t0 + chrono::Duration::seconds(5)),
            event(ChangesetEventKind::Reopened, t0 + chrono::Duration::seconds(1)),
        ];
        let err = fold_external_state(t0, Some(&pr(false)), false, &events, None).unwrap_err();
        assert!(matches!(err, Error::UnsortedEvents { index: 1 }));
    }

    #[test]
    fn draft_toggle_reconstructs_initial_state() {
        let t0 = Utc::now();
        // Currently Open (is_draft=false), but the only event is a
        // ReadyForReview, so before that event it must have been Draft.
        let events = vec![event(ChangesetEventKind::ReadyForReview, t0 + chrono::Duration::seconds(1))];
        let history = fold_external_state(t0, Some(&pr(false)), false, &events, None).unwrap();
        assert_eq!(history[0].state, ExternalState::Draft);
        assert_eq!(history[1].state, ExternalState::Open);
    }

    #[test]
    fn state_at_finds_the_step_valid_at_a_point_in_time() {
        let t0 = Utc::now();
        let events = vec![event(ChangesetEventKind::Closed, t0 + chrono::Duration::seconds(10))];
        let history = fold_external_state(t0, Some(&pr(false)), false, &events, None).unwrap();
        assert_eq!(state_at(&history, t0 + chrono::Duration::seconds(5)), ExternalState::Open);
        assert_eq!(state_at(&history, t0 + chrono::Duration::seconds(15)), ExternalState::Closed);
    }
}
