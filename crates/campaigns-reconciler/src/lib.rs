pub mod apply;
pub mod backoff;
pub mod branch_guard;
pub mod event_source;
pub mod executor;
pub mod git;
pub mod http;
pub mod insights;
pub mod planner;
pub mod rewirer;
pub mod source;
pub mod webhook;
pub mod worker;

pub use apply::{apply_campaign_spec, RewireOutcome};
pub use branch_guard::{BranchGuard, StoreBranchGuard};
pub use event_source::{EventSource, StoreEventSource};
pub use insights::campaign_burndown;
pub use executor::Executor;
pub use git::{CommitAuthor, GitClient};
pub use http::{HttpChangesetSource, HttpGitClient};
pub use planner::{plan, Operation};
pub use rewirer::{rewire, ExistingChangeset, RewireResult};
pub use source::{ChangesetFields, ChangesetSource};
pub use webhook::{absorb_events, verify_signature};
pub use worker::{Worker, MAX_RETRIES};
