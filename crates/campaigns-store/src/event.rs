use campaigns_core::{ChangesetEvent, ChangesetEventKind, ChangesetEventMetadata, ChangesetId, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    changeset_id: ChangesetId,
    kind: ChangesetEventKind,
    key: String,
    metadata: Json<ChangesetEventMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for ChangesetEvent {
    fn from(row: EventRow) -> Self {
        ChangesetEvent {
            id: row.id,
            changeset_id: row.changeset_id,
            kind: row.kind,
            key: row.key,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct EventStore {
    db: PgPool,
}

impl EventStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_for_changeset(&self, changeset_id: ChangesetId) -> Result<Vec<ChangesetEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"SELECT id, changeset_id, kind, key, metadata, created_at, updated_at
               FROM changeset_event WHERE changeset_id = $1 ORDER BY created_at"#,
        )
        .bind(changeset_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert or merge a batch of events on `(changeset_id, kind, key)`.
    /// `created_at` is authoritative only on first insert; `metadata` and
    /// `updated_at` are always taken from the incoming event, so replaying
    /// the exact same event twice is a no-op beyond bumping `updated_at`.
    pub async fn upsert_many(&self, events: &[ChangesetEvent]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for event in events {
            sqlx::query(
                r#"INSERT INTO changeset_event (id, changeset_id, kind, key, metadata, created_at, updated_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (changeset_id, kind, key) DO UPDATE SET
                       metadata = EXCLUDED.metadata,
                       updated_at = EXCLUDED.updated_at"#,
            )
            .bind(event.id)
            .bind(event.changeset_id)
            .bind(event.kind)
            .bind(&event.key)
            .bind(Json(&event.metadata))
            .bind(event.created_at)
            .bind(event.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_row_round_trips_kind_and_key() {
        // Pure struct-shape check; the upsert SQL itself needs a live
        // database and is covered by the gated integration tests.
        let now = Utc::now();
        let event = ChangesetEvent {
            id: Uuid::new_v4(),
            changeset_id: Uuid::new_v4(),
            kind: ChangesetEventKind::Merged,
            key: "merge".into(),
            metadata: ChangesetEventMetadata::Empty,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(event.key, "merge");
    }
}
