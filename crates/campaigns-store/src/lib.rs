pub mod campaign;
pub mod campaign_spec;
pub mod changeset;
pub mod changeset_spec;
pub mod event;
pub mod lock;
pub mod pagination;

pub use campaign::{CampaignOpenState, CampaignStore, ListCampaignsFilter};
pub use campaign_spec::CampaignSpecStore;
pub use changeset::{ChangesetStore, ChangesetSyncData, ListChangesetsFilter};
pub use changeset_spec::ChangesetSpecStore;
pub use event::EventStore;
pub use pagination::{Page, PageOpts};

use sqlx::PgPool;

/// Aggregates every sub-store behind one constructible object, the same way
/// callers wire up collaborators explicitly rather than reaching for a
/// process-wide singleton.
pub struct Store {
    db: PgPool,
    campaign: CampaignStore,
    campaign_spec: CampaignSpecStore,
    changeset: ChangesetStore,
    changeset_spec: ChangesetSpecStore,
    event: EventStore,
}

impl Store {
    pub fn new(db: PgPool) -> Self {
        Self {
            campaign: CampaignStore::new(db.clone()),
            campaign_spec: CampaignSpecStore::new(db.clone()),
            changeset: ChangesetStore::new(db.clone()),
            changeset_spec: ChangesetSpecStore::new(db.clone()),
            event: EventStore::new(db.clone()),
            db,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    pub fn campaigns(&self) -> &CampaignStore {
        &self.campaign
    }

    pub fn campaign_specs(&self) -> &CampaignSpecStore {
        &self.campaign_spec
    }

    pub fn changesets(&self) -> &ChangesetStore {
        &self.changeset
    }

    pub fn changeset_specs(&self) -> &ChangesetSpecStore {
        &self.changeset_spec
    }

    pub fn events(&self) -> &EventStore {
        &self.event
    }

    pub async fn begin(&self) -> campaigns_core::Result<sqlx::Transaction<'_, sqlx::Postgres>> {
        Ok(self.db.begin().await?)
    }
}
