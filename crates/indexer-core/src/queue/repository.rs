//! Storage-agnostic queue operations. Grounded on
//! `zjj-core::coordination::queue_repository::QueueRepository`: the worker
//! loop and failure policy depend only on this trait, never on a concrete
//! database driver, so an in-memory fake can stand in for it in tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::Event;
use crate::error::IndexerResult;

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub entity_type: String,
    pub action: String,
    pub message: serde_json::Value,
    pub depends_on: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub completed_deleted: u64,
    pub running_timed_out: u64,
    pub cascaded_to_failed: u64,
}

#[async_trait]
pub trait EventQueueRepository: Send + Sync {
    /// Enqueues an event, honoring the partial-unique-index dedup rule: if a
    /// `queued` duplicate already exists, its `depends_on` is extended with
    /// `new.depends_on` rather than inserting a second row. Returns the id of
    /// the row that now represents this logical event.
    async fn enqueue(&self, event: NewEvent) -> IndexerResult<i64>;

    /// Claims and returns the next ready event under row-level locking, or
    /// `None` if nothing is eligible right now. The returned event is already
    /// transitioned to `Running` with `attempts` incremented.
    async fn claim_next(&self) -> IndexerResult<Option<Event>>;

    /// Marks an event `Completed`.
    async fn mark_completed(&self, event_id: i64) -> IndexerResult<()>;

    /// Records a failure reason and applies the attempts-cap / duplicate-aware
    /// transition back to `Queued` or forward to `Failed`.
    async fn mark_failed_attempt(&self, event_id: i64, reason: &str) -> IndexerResult<()>;

    /// Marks an event `Failed` immediately, bypassing the retry budget. Used
    /// for precondition violations where retrying cannot change the outcome.
    async fn mark_failed_terminal(&self, event_id: i64, reason: &str) -> IndexerResult<()>;

    /// Deletes `Completed` rows older than `older_than`.
    async fn cleanup_completed(&self, older_than: DateTime<Utc>) -> IndexerResult<u64>;

    /// Fails `Running` rows whose `last_updated - created` exceeds
    /// `max_running_duration` (spec §4.5 / scenario S6), recovering from a
    /// worker that crashed mid-handler.
    async fn timeout_stuck_running(&self, max_running_duration: Duration) -> IndexerResult<u64>;

    /// Fails any `Queued` row that depends on an event now `Failed`, so
    /// permanently blocked work is visible instead of silently stuck.
    async fn cascade_failed_dependents(&self) -> IndexerResult<u64>;

    /// Returns true if a `Queued` duplicate of `(entity_type, action,
    /// message)` exists other than `excluding_id`. Used by the failure
    /// policy to decide whether a failing event should go straight to
    /// `Failed` rather than back to `Queued` (§4.4).
    async fn has_queued_duplicate(
        &self,
        entity_type: &str,
        action: &str,
        message: &serde_json::Value,
        excluding_id: i64,
    ) -> IndexerResult<bool>;

    /// Returns true if a `Queued` `copy_image` event exists for this
    /// `(artwork_id, old_gid, suffix)` that was created after `created`.
    /// Used by the precondition check ahead of executing a parentless
    /// `delete_image`: if a later move off this same entity is still
    /// queued, deleting now would be wrong, so the event fails immediately
    /// instead of retrying (§7). Mirrors
    /// `original_source/handlers_base.py::delete_image`'s guard, which
    /// matches on `old_gid` and compares against the delete event's own
    /// `created` timestamp, not just `artwork_id`/`suffix`.
    async fn has_queued_copy_image(
        &self,
        artwork_id: i64,
        old_gid: &str,
        suffix: &str,
        created_after: DateTime<Utc>,
    ) -> IndexerResult<bool>;
}
