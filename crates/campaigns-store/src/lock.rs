use campaigns_core::Result;
use sqlx::{Postgres, Transaction};

/// Acquire a transaction-scoped advisory lock keyed by an arbitrary string.
/// Released automatically when `tx` commits or rolls back.
pub async fn try_acquire_advisory_lock(tx: &mut Transaction<'_, Postgres>, key: &str) -> Result<bool> {
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .fetch_one(&mut **tx)
        .await?;
    Ok(acquired)
}

/// Block until the advisory lock is acquired, within the current
/// transaction. Used for bulk operations that must not interleave, e.g.
/// closing every changeset for a campaign.
pub async fn acquire_advisory_lock(tx: &mut Transaction<'_, Postgres>, key: &str) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
