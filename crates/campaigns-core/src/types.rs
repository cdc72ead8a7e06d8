use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{CampaignSpecId, ChangesetSpecId};

pub type RepoId = Uuid;
pub type CampaignId = Uuid;
pub type ChangesetId = Uuid;
pub type ChangesetEventId = Uuid;

/// The code host a repository is hosted on. Drives which `ChangesetSource`
/// variant and which `ChangesetMetadata` shape apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ExternalServiceType {
    Github,
    Gitlab,
    Bitbucket,
}

/// A `CampaignSpec` as authored by a user. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub id: CampaignSpecId,
    pub namespace: String,
    pub author: String,
    pub raw_spec: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The live, derived object produced by applying a `CampaignSpec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub description: Option<String>,
    pub namespace: String,
    pub author: String,
    /// Non-empty iff the campaign has been published.
    pub branch: String,
    pub current_spec_id: CampaignSpecId,
    pub last_applied_at: DateTime<Utc>,
    pub last_applier: String,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn is_published(&self) -> bool {
        !self.branch.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// The publish intent requested by a `ChangesetSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishedValue {
    False,
    True,
    Draft,
}

impl PublishedValue {
    pub fn wants_publish(self) -> bool {
        !matches!(self, PublishedValue::False)
    }

    pub fn wants_draft(self) -> bool {
        matches!(self, PublishedValue::Draft)
    }
}

/// A single desired commit to apply on top of `base_ref`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitSpec {
    pub diff: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
}

/// The declarative description of one desired changeset on one repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangesetSpecKind {
    Branch {
        head_ref: String,
        base_ref: String,
        title: String,
        body: String,
        commit: CommitSpec,
        published: PublishedValue,
    },
    Tracking {
        external_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetSpec {
    pub id: ChangesetSpecId,
    pub repo_id: RepoId,
    pub campaign_spec_id: CampaignSpecId,
    pub kind: ChangesetSpecKind,
    pub created_at: DateTime<Utc>,
}

impl ChangesetSpec {
    pub fn is_tracking(&self) -> bool {
        matches!(self.kind, ChangesetSpecKind::Tracking { .. })
    }

    pub fn head_ref(&self) -> Option<&str> {
        match &self.kind {
            ChangesetSpecKind::Branch { head_ref, .. } => Some(head_ref),
            ChangesetSpecKind::Tracking { .. } => None,
        }
    }
}

/// Publication lifecycle of a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PublicationState {
    Unpublished,
    Published,
}

/// Job-queue state of a changeset. Stored lower-case, surfaced upper-case
/// per the database encoding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ReconcilerState {
    Queued,
    Processing,
    Errored,
    Completed,
    Failed,
}

impl ReconcilerState {
    pub fn is_queueable(self) -> bool {
        matches!(self, ReconcilerState::Queued | ReconcilerState::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ExternalState {
    Open,
    Draft,
    Closed,
    Merged,
    Deleted,
}

impl ExternalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExternalState::Merged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ExternalReviewState {
    Pending,
    ChangesRequested,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ExternalCheckState {
    Unknown,
    Pending,
    Failed,
    Passed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffStat {
    pub added: i64,
    pub changed: i64,
    pub deleted: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub base_oid: String,
    pub head_oid: String,
    pub is_complete: bool,
}

/// Polymorphic last-synced payload from a code host. The derived-state
/// engine switches on the variant; nothing beyond the store boundary deals
/// in untyped JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangesetMetadata {
    GithubPr(GithubPr),
    GitlabMr(GitlabMr),
    BitbucketPr(BitbucketPr),
}

impl ChangesetMetadata {
    pub fn external_id(&self) -> &str {
        match self {
            ChangesetMetadata::GithubPr(pr) => &pr.number,
            ChangesetMetadata::GitlabMr(mr) => &mr.iid,
            ChangesetMetadata::BitbucketPr(pr) => &pr.id,
        }
    }

    pub fn is_draft(&self) -> bool {
        match self {
            ChangesetMetadata::GithubPr(pr) => pr.is_draft,
            ChangesetMetadata::GitlabMr(mr) => mr.work_in_progress,
            ChangesetMetadata::BitbucketPr(_) => false,
        }
    }

    pub fn head_oid(&self) -> &str {
        match self {
            ChangesetMetadata::GithubPr(pr) => &pr.head_oid,
            ChangesetMetadata::GitlabMr(mr) => &mr.head_oid,
            ChangesetMetadata::BitbucketPr(pr) => &pr.head_oid,
        }
    }

    pub fn base_oid(&self) -> &str {
        match self {
            ChangesetMetadata::GithubPr(pr) => &pr.base_oid,
            ChangesetMetadata::GitlabMr(mr) => &mr.base_oid,
            ChangesetMetadata::BitbucketPr(pr) => &pr.base_oid,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ChangesetMetadata::GithubPr(pr) => &pr.url,
            ChangesetMetadata::GitlabMr(mr) => &mr.url,
            ChangesetMetadata::BitbucketPr(pr) => &pr.url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubPr {
    pub number: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub is_draft: bool,
    pub head_oid: String,
    pub base_oid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabMr {
    pub iid: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub work_in_progress: bool,
    pub head_oid: String,
    pub base_oid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketPr {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub head_oid: String,
    pub base_oid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ChangesetId,
    pub repo_id: RepoId,
    pub external_service_type: ExternalServiceType,
    pub external_id: Option<String>,
    pub external_branch: Option<String>,

    pub owned_by_campaign_id: Option<CampaignId>,
    pub campaign_ids: Vec<CampaignId>,

    pub current_spec_id: ChangesetSpecId,
    pub previous_spec_id: Option<ChangesetSpecId>,

    pub publication_state: PublicationState,
    pub reconciler_state: ReconcilerState,
    pub closing: bool,
    pub unsynced: bool,
    pub external_deleted_at: Option<DateTime<Utc>>,

    pub external_state: Option<ExternalState>,
    pub external_review_state: Option<ExternalReviewState>,
    pub external_check_state: Option<ExternalCheckState>,
    pub diff_stat: Option<DiffStat>,
    pub sync_state: Option<SyncState>,
    pub metadata: Option<ChangesetMetadata>,

    pub failure_message: Option<String>,
    pub num_failures: i32,
    pub num_resets: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub process_after: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Changeset {
    pub fn is_published(&self) -> bool {
        self.publication_state == PublicationState::Published
    }

    /// An unpublished changeset must carry neither an external id nor an
    /// external branch.
    pub fn invariant_holds(&self) -> bool {
        if self.publication_state == PublicationState::Unpublished {
            self.external_id.is_none() && self.external_branch.is_none()
        } else {
            true
        }
    }
}

/// An event kind as reported by a code host's timeline/webhook feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ChangesetEventKind {
    Closed,
    Declined,
    Merged,
    ConvertToDraft,
    MarkWorkInProgress,
    ReadyForReview,
    UnmarkWorkInProgress,
    Reopened,
    Reviewed,
    ReviewDismissed,
    Unapproved,
    ReviewDismissedBitbucket,
    CommitStatus,
    CheckSuite,
    CheckRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Pending,
    Approved,
    ChangesRequested,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChangesetEventMetadata {
    Review {
        author: String,
        decision: ReviewDecision,
    },
    CommitStatus {
        sha: String,
        context: String,
        state: ExternalCheckState,
    },
    CheckSuite {
        sha: String,
        key: String,
        state: ExternalCheckState,
        run_count: u32,
    },
    CheckRun {
        sha: String,
        key: String,
        state: ExternalCheckState,
    },
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetEvent {
    pub id: ChangesetEventId,
    pub changeset_id: ChangesetId,
    pub kind: ChangesetEventKind,
    /// Disambiguates events of the same kind on the same changeset, e.g. the
    /// reviewing author or the `(sha, context)` pair for a commit status.
    pub key: String,
    pub metadata: ChangesetEventMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
