use std::time::Duration;

use clap::Parser;

/// Runtime configuration for the reconciler worker, read from CLI flags or
/// the matching `CAMPAIGNS_*` environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "campaigns-worker", about = "Reconciles campaign specs into changesets on code hosts")]
pub struct Config {
    #[arg(long, env = "CAMPAIGNS_DATABASE_URL")]
    pub database_url: String,

    /// Base URL of the code-host proxy `ChangesetSource` talks to.
    #[arg(long, env = "CAMPAIGNS_SOURCE_URL")]
    pub source_url: String,

    /// Base URL of the gitserver-style RPC service `GitClient` talks to.
    #[arg(long, env = "CAMPAIGNS_GITSERVER_URL")]
    pub gitserver_url: String,

    /// Whether the configured code host supports draft changesets
    /// (GitHub and GitLab do, Bitbucket Server does not).
    #[arg(long, env = "CAMPAIGNS_HOST_SUPPORTS_DRAFTS", default_value_t = true)]
    pub host_supports_drafts: bool,

    /// Base URL used to build the "Created by Sourcegraph campaign ..."
    /// backlink in published changeset descriptions.
    #[arg(long, env = "CAMPAIGNS_EXTERNAL_URL", default_value = "https://sourcegraph.example.com")]
    pub external_url: String,

    #[arg(long, env = "CAMPAIGNS_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// How many reconciler workers to run concurrently in this process.
    #[arg(long, env = "CAMPAIGNS_WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// How long a `CampaignSpec`/`ChangesetSpec` may sit unapplied before
    /// `DeleteExpiredSpecs` reclaims it.
    #[arg(long, env = "CAMPAIGNS_SPEC_TTL_HOURS", default_value_t = 168)]
    pub spec_ttl_hours: i64,

    /// How often the expired-spec cleanup sweep runs.
    #[arg(long, env = "CAMPAIGNS_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn spec_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.spec_ttl_hours)
    }
}
