//! Pure folds over a changeset's timeline. Nothing here touches a database
//! or a network; every function takes plain structs and returns plain
//! structs, so the whole crate is testable without a `campaigns-store`
//! dependency.

pub mod check_state;
pub mod counts;
pub mod external_state;
pub mod review_state;
pub mod sync_state;

pub use check_state::fold_check_state;
pub use counts::{historical_counts, ChangesetCounts, ChangesetSample};
pub use external_state::{fold_external_state, state_at, ExternalStateAtTime};
pub use review_state::{fold_review_state, review_state_at, ReviewStateAtTime};
pub use sync_state::{compute_sync_state, should_recompute_diff_stat};
