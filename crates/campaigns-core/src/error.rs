use thiserror::Error;

/// The error taxonomy shared by the store, the derived-state engine, and the
/// reconciler. `is_retryable` is the single place retry policy is decided, so
/// the worker never has to re-derive it per call site.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed spec or invalid state transition. Not retried.
    #[error("validation: {0}")]
    Validation(String),

    /// A conflicting changeset or campaign spec already holds the resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Two campaigns raced to publish the same branch on the same repo.
    #[error("changeset branch {branch:?} on repo {repo_id} is already published by another campaign")]
    PublishSameBranch { repo_id: uuid::Uuid, branch: String },

    /// Network errors, rate limiting, serialization failures. Retried with
    /// backoff up to the configured `max_retries`.
    #[error("transient: {0}")]
    Transient(String),

    /// The code host rejected the request as unauthorized or forbidden.
    #[error("authorization: {0}")]
    Authorization(String),

    /// Input events were not sorted ascending by timestamp.
    #[error("events out of order: event at index {index} precedes its predecessor")]
    UnsortedEvents { index: usize },

    /// A changeset has no external created-at timestamp to fold from.
    #[error("changeset {0} has no external created-at")]
    ZeroCreatedAt(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Panics caught at a task boundary, type-assertion failures, and other
    /// bugs. Terminal; always logged at error level.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl Error {
    /// Whether the worker should schedule a backoff retry (`Errored`) or
    /// give up immediately (`Failed`/terminal).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Database(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
