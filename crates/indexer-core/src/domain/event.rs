//! The event row itself. `EventState` mirrors the Postgres `event_state`
//! enum bit-for-bit; grounded on `zjj-core::coordination::queue::QueueStatus`
//! for the state-enum shape, generalized from that tool's richer
//! merge-pipeline states down to the four this system needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "event_state", rename_all = "lowercase")]
pub enum EventState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl EventState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, EventState::Completed | EventState::Failed)
    }
}

pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub state: EventState,
    pub entity_type: String,
    pub action: String,
    pub message: serde_json::Value,
    /// Parent event ids that must reach `Completed` before this one is
    /// eligible to run. `None` and `Some(vec![])` are equivalent.
    pub depends_on: Option<Vec<i64>>,
    pub attempts: i32,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn depends_on_slice(&self) -> &[i64] {
        self.depends_on.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts < MAX_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_slice_treats_none_as_empty() {
        let event = Event {
            id: 1,
            state: EventState::Queued,
            entity_type: "release".into(),
            action: "index".into(),
            message: serde_json::json!({}),
            depends_on: None,
            attempts: 0,
            created: Utc::now(),
            last_updated: Utc::now(),
        };
        assert!(event.depends_on_slice().is_empty());
    }

    #[test]
    fn attempts_cap_is_five() {
        let mut event = Event {
            id: 1,
            state: EventState::Queued,
            entity_type: "release".into(),
            action: "index".into(),
            message: serde_json::json!({}),
            depends_on: None,
            attempts: 0,
            created: Utc::now(),
            last_updated: Utc::now(),
        };
        event.attempts = MAX_ATTEMPTS;
        assert!(!event.has_attempts_remaining());
    }
}
