use async_trait::async_trait;
use campaigns_core::{ChangesetEvent, ChangesetId, Result};
use campaigns_store::Store;

/// Loads a changeset's event timeline for the derived-state fold. Kept as
/// its own capability, like `BranchGuard`, so `Executor`'s unit tests never
/// need a database.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list(&self, changeset_id: ChangesetId) -> Result<Vec<ChangesetEvent>>;
}

pub struct StoreEventSource<'a> {
    pub store: &'a Store,
}

#[async_trait]
impl<'a> EventSource for StoreEventSource<'a> {
    async fn list(&self, changeset_id: ChangesetId) -> Result<Vec<ChangesetEvent>> {
        self.store.events().list_for_changeset(changeset_id).await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeEventSource {
        pub events: Mutex<HashMap<ChangesetId, Vec<ChangesetEvent>>>,
    }

    impl FakeEventSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_events(changeset_id: ChangesetId, events: Vec<ChangesetEvent>) -> Self {
            let source = Self::new();
            source.events.lock().unwrap().insert(changeset_id, events);
            source
        }
    }

    #[async_trait]
    impl EventSource for FakeEventSource {
        async fn list(&self, changeset_id: ChangesetId) -> Result<Vec<ChangesetEvent>> {
            Ok(self.events.lock().unwrap().get(&changeset_id).cloned().unwrap_or_default())
        }
    }
}
