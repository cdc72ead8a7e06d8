pub mod error;
pub mod id;
pub mod types;

pub use error::{Error, Result};
pub use id::{CampaignSpecId, ChangesetSpecId};
pub use types::*;
