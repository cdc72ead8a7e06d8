use async_trait::async_trait;
use campaigns_core::{DiffStat, Result};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// gitserver's two RPCs as an abstract capability.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Apply `diff` as a new commit on top of `base_ref`, push it to
    /// `head_ref`, and return the resulting head oid.
    async fn create_commit_from_patch(
        &self,
        repo_id: campaigns_core::RepoId,
        head_ref: &str,
        base_ref: &str,
        diff: &str,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String>;

    async fn diff_stat(&self, repo_id: campaigns_core::RepoId, base_oid: &str, head_oid: &str) -> Result<DiffStat>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    pub struct FakeGitClient {
        pub diff_stat: DiffStat,
        pushes: Mutex<Vec<String>>,
        counter: AtomicU64,
    }

    impl FakeGitClient {
        pub fn new() -> Self {
            Self { diff_stat: DiffStat { added: 1, changed: 0, deleted: 0 }, pushes: Mutex::new(Vec::new()), counter: AtomicU64::new(0) }
        }

        pub fn pushes(&self) -> Vec<String> {
            self.pushes.lock().unwrap().clone()
        }
    }

    impl Default for FakeGitClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl GitClient for FakeGitClient {
        async fn create_commit_from_patch(
            &self,
            _repo_id: campaigns_core::RepoId,
            head_ref: &str,
            _base_ref: &str,
            _diff: &str,
            _message: &str,
            _author: &CommitAuthor,
        ) -> Result<String> {
            self.pushes.lock().unwrap().push(head_ref.to_string());
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("commit-{n}"))
        }

        async fn diff_stat(&self, _repo_id: campaigns_core::RepoId, _base_oid: &str, _head_oid: &str) -> Result<DiffStat> {
            Ok(self.diff_stat)
        }
    }
}
