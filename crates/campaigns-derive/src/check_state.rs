use std::collections::HashMap;

use campaigns_core::{ChangesetEvent, ChangesetEventKind, ChangesetEventMetadata, ExternalCheckState, Result};

/// Fold commit-status, check-suite, and check-run events into a single
/// combined state for the given head commit.
///
/// Status updates whose sha doesn't match `head_oid` are stale (the branch
/// moved on) and discarded. Check-suites reported with zero runs are
/// discarded too — a suite with no runs carries no information.
pub fn fold_check_state(events: &[ChangesetEvent], head_oid: &str) -> Result<ExternalCheckState> {
    let mut by_key: HashMap<String, ExternalCheckState> = HashMap::new();

    for event in events {
        match (&event.kind, &event.metadata) {
            (ChangesetEventKind::CommitStatus, ChangesetEventMetadata::CommitStatus { sha, context, state }) => {
                if sha != head_oid {
                    continue;
                }
                by_key.insert(context.clone(), *state);
            }
            (ChangesetEventKind::CheckSuite, ChangesetEventMetadata::CheckSuite { sha, key, state, run_count }) => {
                if sha != head_oid || *run_count == 0 {
                    continue;
                }
                by_key.insert(key.clone(), *state);
            }
            (ChangesetEventKind::CheckRun, ChangesetEventMetadata::CheckRun { sha, key, state }) => {
                if sha != head_oid {
                    continue;
                }
                by_key.insert(key.clone(), *state);
            }
            _ => continue,
        }
    }

    Ok(combine(by_key.values().copied()))
}

/// Precedence order, first match wins: any Unknown beats any Pending beats
/// any Failed beats any Passed; an empty set is Unknown.
fn combine(states: impl Iterator<Item = ExternalCheckState>) -> ExternalCheckState {
    let mut has_unknown = false;
    let mut has_pending = false;
    let mut has_failed = false;
    let mut has_passed = false;

    for state in states {
        match state {
            ExternalCheckState::Unknown => has_unknown = true,
            ExternalCheckState::Pending => has_pending = true,
            ExternalCheckState::Failed => has_failed = true,
            ExternalCheckState::Passed => has_passed = true,
        }
    }

    if has_unknown {
        ExternalCheckState::Unknown
    } else if has_pending {
        ExternalCheckState::Pending
    } else if has_failed {
        ExternalCheckState::Failed
    } else if has_passed {
        ExternalCheckState::Passed
    } else {
        ExternalCheckState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn status_event(sha: &str, context: &str, state: ExternalCheckState) -> ChangesetEvent {
        let now = Utc::now();
        ChangesetEvent {
            id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            kind: ChangesetEventKind::CommitStatus,
            key: format!("{sha}:{context}"),
            metadata: ChangesetEventMetadata::CommitStatus { sha: sha.into(), context: context.into(), state },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stale_sha_is_discarded() {
        let events = vec![status_event("old-sha", "ci/build", ExternalCheckState::Failed)];
        let state = fold_check_state(&events, "new-sha").unwrap();
        assert_eq!(state, ExternalCheckState::Unknown);
    }

    #[test]
    fn failed_beats_passed() {
        let events = vec![
            status_event("head", "ci/build", ExternalCheckState::Passed),
            status_event("head", "ci/lint", ExternalCheckState::Failed),
        ];
        let state = fold_check_state(&events, "head").unwrap();
        assert_eq!(state, ExternalCheckState::Failed);
    }

    #[test]
    fn pending_beats_failed() {
        let events = vec![
            status_event("head", "ci/build", ExternalCheckState::Failed),
            status_event("head", "ci/lint", ExternalCheckState::Pending),
        ];
        let state = fold_check_state(&events, "head").unwrap();
        assert_eq!(state, ExternalCheckState::Pending);
    }

    #[test]
    fn zero_run_suite_is_discarded() {
        let now = Utc::now();
        let events = vec![ChangesetEvent {
            id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            kind: ChangesetEventKind::CheckSuite,
            key: "suite-1".into(),
            metadata: ChangesetEventMetadata::CheckSuite {
                sha: "head".into(),
                key: "suite-1".into(),
                state: ExternalCheckState::Passed,
                run_count: 0,
            },
            created_at: now,
            updated_at: now,
        }];
        let state = fold_check_state(&events, "head").unwrap();
        assert_eq!(state, ExternalCheckState::Unknown);
    }
}
