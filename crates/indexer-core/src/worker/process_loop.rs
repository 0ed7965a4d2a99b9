//! The worker's main loop. Grounded on `original_source/indexer.py`'s
//! `indexer()` function for the sleep/backoff/idle-exit state machine, and
//! on `zjj`'s `commands::queue_worker::run_loop` for expressing that state
//! machine as a struct method polled via `tokio::select!` against a
//! shutdown/reload signal instead of Python's synchronous signal handling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::SharedConfig;
use crate::error::ErrorClass;
use crate::handlers::HandlerRegistry;
use crate::queue::{run_maintenance_sweep, EventQueueRepository};

use super::shutdown::{ControlSignal, ShutdownHandle};

const INITIAL_SLEEP_SECS: u64 = 1;
const DEFAULT_MAX_WAIT_SECS: u64 = 32;
const MAINTENANCE_EVERY_N_IDLE_TICKS: u32 = 30;

pub struct WorkerOptions {
    pub max_wait: Duration,
    pub max_idle_loops: Option<u64>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            max_idle_loops: None,
        }
    }
}

/// Owns the mutable state a single worker process threads through its
/// polling loop: the current backoff and the number of consecutive idle
/// iterations. Replaces the reference implementation's module-level
/// mutable counters with fields on a value the loop method borrows.
pub struct Worker {
    repo: Arc<dyn EventQueueRepository>,
    handlers: HandlerRegistry,
    config: SharedConfig,
    options: WorkerOptions,
    sleep_amount: Duration,
    idle_loops: u64,
    ticks_since_maintenance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Ran out of idle ticks (`max_idle_loops` reached).
    IdleLimitReached,
    /// A shutdown signal was received.
    ShutdownRequested,
}

impl Worker {
    #[must_use]
    pub fn new(
        repo: Arc<dyn EventQueueRepository>,
        handlers: HandlerRegistry,
        config: SharedConfig,
        options: WorkerOptions,
    ) -> Self {
        Self {
            repo,
            handlers,
            config,
            options,
            sleep_amount: Duration::from_secs(INITIAL_SLEEP_SECS),
            idle_loops: 0,
            ticks_since_maintenance: 0,
        }
    }

    /// Runs until shutdown is requested or the idle-loop budget is
    /// exhausted (if one was configured).
    pub async fn run(&mut self, mut shutdown: ShutdownHandle) -> LoopOutcome {
        loop {
            tokio::select! {
                signal = shutdown.recv() => {
                    match signal {
                        ControlSignal::Shutdown => {
                            info!("shutdown signal received, exiting after current tick");
                            return LoopOutcome::ShutdownRequested;
                        }
                        ControlSignal::ReloadConfig => {
                            match self.config.reload() {
                                Ok(()) => info!("configuration reloaded"),
                                Err(e) => error!(error = %e, "failed to reload configuration, keeping previous config"),
                            }
                            continue;
                        }
                    }
                }
                () = tokio::time::sleep(self.sleep_amount) => {}
            }

            if let Some(max) = self.options.max_idle_loops {
                if self.idle_loops >= max {
                    info!(idle_loops = self.idle_loops, "idle loop budget exhausted, exiting");
                    return LoopOutcome::IdleLimitReached;
                }
            }

            match self.tick().await {
                Tick::Worked => {
                    self.sleep_amount = Duration::from_secs(INITIAL_SLEEP_SECS);
                    self.idle_loops = 0;
                }
                Tick::Idle => {
                    self.idle_loops += 1;
                    self.sleep_amount =
                        (self.sleep_amount * 2).min(self.options.max_wait);
                    self.ticks_since_maintenance += 1;
                    if self.ticks_since_maintenance >= MAINTENANCE_EVERY_N_IDLE_TICKS {
                        self.ticks_since_maintenance = 0;
                        self.run_maintenance().await;
                    }
                }
            }
        }
    }

    async fn run_maintenance(&self) {
        match run_maintenance_sweep(self.repo.as_ref()).await {
            Ok(stats) => debug!(
                completed_deleted = stats.completed_deleted,
                running_timed_out = stats.running_timed_out,
                cascaded_to_failed = stats.cascaded_to_failed,
                "maintenance sweep complete"
            ),
            Err(e) => error!(error = %e, "maintenance sweep failed"),
        }
    }

    async fn tick(&self) -> Tick {
        let event = match self.repo.claim_next().await {
            Ok(Some(event)) => event,
            Ok(None) => return Tick::Idle,
            Err(e) => {
                error!(error = %e, "failed to claim next event");
                return Tick::Idle;
            }
        };

        debug!(
            event_id = event.id,
            entity_type = %event.entity_type,
            action = %event.action,
            attempts = event.attempts,
            "claimed event"
        );

        match self.handlers.dispatch(&event, self.repo.as_ref()).await {
            Ok(()) => {
                if let Err(e) = self.repo.mark_completed(event.id).await {
                    error!(event_id = event.id, error = %e, "failed to mark event completed");
                } else {
                    info!(event_id = event.id, entity_type = %event.entity_type, action = %event.action, "event completed");
                }
            }
            Err(err) => {
                warn!(
                    event_id = event.id,
                    entity_type = %event.entity_type,
                    action = %event.action,
                    attempts = event.attempts,
                    error = %err,
                    "event handler failed"
                );
                let outcome = match err.classify() {
                    ErrorClass::Retryable => {
                        self.repo.mark_failed_attempt(event.id, &err.to_string()).await
                    }
                    ErrorClass::Terminal => {
                        self.repo.mark_failed_terminal(event.id, &err.to_string()).await
                    }
                };
                if let Err(e) = outcome {
                    error!(event_id = event.id, error = %e, "failed to record event failure");
                }
            }
        }

        Tick::Worked
    }
}

enum Tick {
    Worked,
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::message::{CopyImagePayload, DeindexPayload, DeleteImagePayload, IndexPayload, NoopPayload};
    use crate::handlers::EventHandler;
    use crate::queue::{InMemoryEventQueue, NewEvent};

    struct CountingHandler {
        index_calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn index(&self, _payload: &IndexPayload) -> crate::error::IndexerResult<()> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn copy_image(&self, _payload: &CopyImagePayload) -> crate::error::IndexerResult<()> {
            Ok(())
        }
        async fn delete_image(&self, _payload: &DeleteImagePayload) -> crate::error::IndexerResult<()> {
            Ok(())
        }
        async fn deindex(&self, _payload: &DeindexPayload) -> crate::error::IndexerResult<()> {
            Ok(())
        }
        async fn noop(&self, payload: &NoopPayload) -> crate::error::IndexerResult<()> {
            if payload.fail {
                return Err(crate::error::IndexerError::Simulated("forced".into()));
            }
            Ok(())
        }
    }

    fn test_shared_config() -> SharedConfig {
        let path = {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            use std::io::Write;
            file.write_all(
                b"[database]\nhost=localhost\nport=5432\nuser=mb\npassword=x\ndbname=mb\n[s3]\nurl=https://s3.example\naccess=a\nsecret=s\n[musicbrainz]\nurl=https://musicbrainz.org\n",
            )
            .unwrap();
            file.into_temp_path()
        };
        // Leak the path so the file persists for the lifetime of the test;
        // acceptable in a short-lived unit test.
        let path = path.keep().unwrap();
        SharedConfig::load(path).unwrap()
    }

    #[tokio::test]
    async fn tick_dispatches_a_claimed_event_and_marks_it_completed() {
        let repo: Arc<dyn EventQueueRepository> = Arc::new(InMemoryEventQueue::new());
        repo.enqueue(NewEvent {
            entity_type: "release".into(),
            action: "index".into(),
            message: json!({"gid": "16ebbc86-670c-4ad3-980b-bfbd1eee4ff4"}),
            depends_on: vec![],
        })
        .await
        .unwrap();

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "release",
            Box::new(CountingHandler {
                index_calls: AtomicUsize::new(0),
            }),
        );

        let worker = Worker::new(
            Arc::clone(&repo),
            handlers,
            test_shared_config(),
            WorkerOptions::default(),
        );

        let outcome = worker.tick().await;
        assert!(matches!(outcome, Tick::Worked));
    }
}
