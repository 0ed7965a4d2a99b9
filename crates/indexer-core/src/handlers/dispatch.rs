//! Routes a claimed event to the handler registered for its `entity_type`.
//! Grounded on `original_source/handlers.py`'s per-project handler classes,
//! collapsed here to a lookup over [`EventHandler`] trait objects instead of
//! `isinstance`-style branching.

use std::collections::HashMap;

use crate::domain::{Action, Event};
use crate::error::{IndexerError, IndexerResult};
use crate::queue::EventQueueRepository;

use super::musicbrainz::EventHandler;

pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, entity_type: &'static str, handler: Box<dyn EventHandler>) {
        self.handlers.insert(entity_type, handler);
    }

    fn handler_for(&self, entity_type: &str) -> IndexerResult<&dyn EventHandler> {
        self.handlers
            .get(entity_type)
            .map(std::convert::AsRef::as_ref)
            .ok_or_else(|| IndexerError::UnknownHandler {
                entity_type: entity_type.to_string(),
                action: String::new(),
            })
    }

    /// Runs the precondition + dispatch for one claimed event. Returns the
    /// handler's `Result` unchanged; callers are responsible for translating
    /// it into a queue-state transition via the failure policy.
    pub async fn dispatch(
        &self,
        event: &Event,
        repo: &dyn EventQueueRepository,
    ) -> IndexerResult<()> {
        let action = Action::parse(&event.action, &event.message)?;
        let handler = self.handler_for(&event.entity_type)?;

        if let Action::DeleteImage(payload) = &action {
            if event.depends_on_slice().is_empty()
                && repo
                    .has_queued_copy_image(
                        payload.artwork_id,
                        &payload.gid,
                        &payload.suffix,
                        event.created,
                    )
                    .await?
            {
                return Err(IndexerError::Precondition(format!(
                    "delete_image for artwork {} has no parent but a copy_image is still queued",
                    payload.artwork_id
                )));
            }
        }

        match action {
            Action::Index(payload) => handler.index(&payload).await,
            Action::CopyImage(payload) => handler.copy_image(&payload).await,
            Action::DeleteImage(payload) => handler.delete_image(&payload).await,
            Action::Deindex(payload) => handler.deindex(&payload).await,
            Action::Noop(payload) => handler.noop(&payload).await,
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
