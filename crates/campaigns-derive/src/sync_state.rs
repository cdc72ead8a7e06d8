use campaigns_core::{ChangesetMetadata, ExternalState, SyncState};

/// Build the sync-state cache entry from the last-synced metadata.
/// `is_complete` tells the reconciler whether the cached diff-stat can be
/// trusted without re-asking gitserver for a diff.
pub fn compute_sync_state(metadata: &ChangesetMetadata, external_state: ExternalState) -> SyncState {
    SyncState {
        base_oid: metadata.base_oid().to_string(),
        head_oid: metadata.head_oid().to_string(),
        is_complete: external_state != ExternalState::Open,
    }
}

/// Whether the diff-stat must be recomputed: true whenever the previous
/// sync wasn't complete, or either oid has moved since.
pub fn should_recompute_diff_stat(previous: Option<&SyncState>, current: &SyncState) -> bool {
    match previous {
        None => true,
        Some(prev) => {
            !(prev.is_complete
                && prev.head_oid == current.head_oid
                && prev.base_oid == current.base_oid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_sync_always_recomputes() {
        let prev = SyncState { base_oid: "a".into(), head_oid: "b".into(), is_complete: false };
        let cur = SyncState { base_oid: "a".into(), head_oid: "b".into(), is_complete: false };
        assert!(should_recompute_diff_stat(Some(&prev), &cur));
    }

    #[test]
    fn complete_and_unchanged_skips_recompute() {
        let prev = SyncState { base_oid: "a".into(), head_oid: "b".into(), is_complete: true };
        let cur = SyncState { base_oid: "a".into(), head_oid: "b".into(), is_complete: true };
        assert!(!should_recompute_diff_stat(Some(&prev), &cur));
    }

    #[test]
    fn moved_head_oid_forces_recompute() {
        let prev = SyncState { base_oid: "a".into(), head_oid: "b".into(), is_complete: true };
        let cur = SyncState { base_oid: "a".into(), head_oid: "c".into(), is_complete: true };
        assert!(should_recompute_diff_stat(Some(&prev), &cur));
    }
}
