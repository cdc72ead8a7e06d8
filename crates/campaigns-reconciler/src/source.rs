use async_trait::async_trait;
use campaigns_core::{ChangesetMetadata, Result};
use serde::Serialize;

/// Inputs for creating or updating a changeset on a code host. `body` has
/// already had the campaign backlink prepended by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChangesetFields {
    pub head_ref: String,
    pub base_ref: String,
    pub title: String,
    pub body: String,
}

/// A code host capability set. One implementation per host
/// (GitHub/GitLab/Bitbucket); hosts that don't support drafts return
/// `Ok(None)` from `create_draft`/`undraft` rather than erroring, so the
/// planner can decide ahead of time whether to route around them.
#[async_trait]
pub trait ChangesetSource: Send + Sync {
    fn supports_drafts(&self) -> bool;

    async fn load(&self, external_id: &str) -> Result<ChangesetMetadata>;

    /// Returns `(metadata, already_exists)`. `already_exists = true` means
    /// the host already has an open changeset for this branch; the executor
    /// follows up with `update` to reconcile it idempotently.
    async fn create(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)>;

    async fn create_draft(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)>;

    async fn update(&self, external_id: &str, fields: &ChangesetFields) -> Result<ChangesetMetadata>;

    async fn close(&self, external_id: &str) -> Result<ChangesetMetadata>;

    async fn reopen(&self, external_id: &str) -> Result<ChangesetMetadata>;

    async fn undraft(&self, external_id: &str) -> Result<ChangesetMetadata>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Load(String),
        Create(String),
        CreateDraft(String),
        Update(String),
        Close(String),
        Reopen(String),
        Undraft(String),
    }

    /// Records every call it receives so tests can assert on call order,
    /// e.g. "CreateChangeset called once, then UpdateChangeset called once".
    pub struct FakeSource {
        pub supports_drafts: bool,
        pub already_exists_on_create: bool,
        calls: Mutex<Vec<Call>>,
        next_id: Mutex<u64>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self { supports_drafts: true, already_exists_on_create: false, calls: Mutex::new(Vec::new()), next_id: Mutex::new(1) }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn fresh_metadata(&self, is_draft: bool) -> ChangesetMetadata {
            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            ChangesetMetadata::GithubPr(campaigns_core::GithubPr {
                number: id.to_string(),
                title: String::new(),
                body: String::new(),
                url: format!("https://example.invalid/pr/{id}"),
                is_draft,
                head_oid: "head".into(),
                base_oid: "base".into(),
            })
        }
    }

    impl Default for FakeSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChangesetSource for FakeSource {
        fn supports_drafts(&self) -> bool {
            self.supports_drafts
        }

        async fn load(&self, external_id: &str) -> Result<ChangesetMetadata> {
            self.calls.lock().unwrap().push(Call::Load(external_id.to_string()));
            Ok(self.fresh_metadata(false))
        }

        async fn create(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)> {
            self.calls.lock().unwrap().push(Call::Create(fields.head_ref.clone()));
            Ok((self.fresh_metadata(false), self.already_exists_on_create))
        }

        async fn create_draft(&self, fields: &ChangesetFields) -> Result<(ChangesetMetadata, bool)> {
            self.calls.lock().unwrap().push(Call::CreateDraft(fields.head_ref.clone()));
            Ok((self.fresh_metadata(true), self.already_exists_on_create))
        }

        async fn update(&self, external_id: &str, _fields: &ChangesetFields) -> Result<ChangesetMetadata> {
            self.calls.lock().unwrap().push(Call::Update(external_id.to_string()));
            Ok(self.fresh_metadata(false))
        }

        async fn close(&self, external_id: &str) -> Result<ChangesetMetadata> {
            self.calls.lock().unwrap().push(Call::Close(external_id.to_string()));
            Ok(self.fresh_metadata(false))
        }

        async fn reopen(&self, external_id: &str) -> Result<ChangesetMetadata> {
            self.calls.lock().unwrap().push(Call::Reopen(external_id.to_string()));
            Ok(self.fresh_metadata(false))
        }

        async fn undraft(&self, external_id: &str) -> Result<ChangesetMetadata> {
            self.calls.lock().unwrap().push(Call::Undraft(external_id.to_string()));
            Ok(self.fresh_metadata(false))
        }
    }
}
