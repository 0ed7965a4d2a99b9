//! Idle-tick housekeeping: delete old completed events, fail stuck running
//! events, and surface cascade failures. Grounded on
//! `original_source/indexer.py::cleanup_events` for the retention sweep;
//! the running-timeout and cascade sweeps are new relative to that source
//! (see SPEC_FULL.md §4.5) and follow the same "one `Repository` call per
//! concern" shape.

use chrono::{Duration, Utc};

use crate::error::IndexerResult;
use crate::queue::repository::{CleanupStats, EventQueueRepository};

pub const COMPLETED_RETENTION_DAYS: i64 = 90;
pub const RUNNING_TIMEOUT_SECONDS: i64 = 150; // 2.5 minutes

pub async fn run_maintenance_sweep(
    repo: &dyn EventQueueRepository,
) -> IndexerResult<CleanupStats> {
    let now = Utc::now();

    let completed_deleted = repo
        .cleanup_completed(now - Duration::days(COMPLETED_RETENTION_DAYS))
        .await?;
    let running_timed_out = repo
        .timeout_stuck_running(Duration::seconds(RUNNING_TIMEOUT_SECONDS))
        .await?;
    let cascaded_to_failed = repo.cascade_failed_dependents().await?;

    Ok(CleanupStats {
        completed_deleted,
        running_timed_out,
        cascaded_to_failed,
    })
}
