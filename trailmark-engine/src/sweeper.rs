//! Periodic session sweeper
//!
//! Deactivates sessions inactive beyond the configured cutoff. Only ever
//! flips is_active true to false, so it is safe to race against validate.

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::error;

use trailmark_common::config::EngineSettings;

/// Run the sweep loop forever. Spawned as a background task at startup.
pub async fn run(pool: SqlitePool, settings: EngineSettings) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(settings.session_sweep_interval_secs.max(1) as u64));
    // First tick fires immediately, sweeping leftovers from the previous run.
    loop {
        interval.tick().await;
        let now = trailmark_common::time::now();
        if let Err(err) = crate::services::session_manager::sweep_expired(
            &pool,
            settings.session_sweep_cutoff_hours,
            now,
        )
        .await
        {
            error!(error = %err, "Session sweep failed");
        }
    }
}
