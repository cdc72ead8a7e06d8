use async_trait::async_trait;
use campaigns_core::{CampaignId, Error, RepoId, Result};
use campaigns_store::Store;

/// Checks the branch-uniqueness invariant before the executor publishes a
/// changeset. Kept as its own capability (rather than a direct `Store` call
/// on `Executor`) so unit tests can exercise the planner/source/git
/// interplay without a database.
#[async_trait]
pub trait BranchGuard: Send + Sync {
    async fn check(&self, repo_id: RepoId, branch: &str, owning_campaign_id: CampaignId) -> Result<()>;
}

pub struct StoreBranchGuard<'a> {
    pub store: &'a Store,
}

#[async_trait]
impl<'a> BranchGuard for StoreBranchGuard<'a> {
    /// The unique partial index on `(repo_id, external_branch) WHERE
    /// publication_state = 'published'` is the hard guarantee; this turns a
    /// collision into a domain error instead of a constraint violation
    /// bubbling up from the database.
    async fn check(&self, repo_id: RepoId, branch: &str, owning_campaign_id: CampaignId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let collision = self.store.changesets().find_branch_collision(&mut tx, repo_id, branch, owning_campaign_id).await?;
        tx.commit().await?;
        match collision {
            Some(_) => Err(Error::PublishSameBranch { repo_id, branch: branch.to_string() }),
            None => Ok(()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;

    pub struct FakeBranchGuard {
        pub collision: bool,
    }

    impl FakeBranchGuard {
        pub fn new() -> Self {
            Self { collision: false }
        }
    }

    impl Default for FakeBranchGuard {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl BranchGuard for FakeBranchGuard {
        async fn check(&self, repo_id: RepoId, branch: &str, _owning_campaign_id: CampaignId) -> Result<()> {
            if self.collision {
                Err(Error::PublishSameBranch { repo_id, branch: branch.to_string() })
            } else {
                Ok(())
            }
        }
    }
}
