//! Periodic purge of expired database-backed sessions.
//!
//! Expired rows are already invisible to session lookups; this job only
//! keeps the `user_sessions` table from growing without bound.

use std::time::Duration;

use bazaar_db::repositories::SessionRepo;
use bazaar_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Run the expired-session purge loop every `interval` until `cancel` fires.
pub async fn run(pool: DbPool, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Session cleanup job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session cleanup job stopping");
                break;
            }
            _ = ticker.tick() => {
                match SessionRepo::delete_expired(&pool).await {
                    Ok(0) => tracing::debug!("Session cleanup: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Session cleanup: purged expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Session cleanup failed"),
                }
            }
        }
    }
}
