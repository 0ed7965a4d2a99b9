//! The event payload is stored as a `(action: text, message: jsonb)` pair in
//! the database; [`Action`] collapses that pair into a single closed sum
//! type so dispatch and handlers match exhaustively instead of re-deriving
//! which fields a given action name implies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IndexerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPayload {
    pub gid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyImagePayload {
    pub artwork_id: i64,
    pub old_gid: String,
    pub new_gid: String,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteImagePayload {
    pub artwork_id: i64,
    pub gid: String,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeindexPayload {
    pub gid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoopPayload {
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub sleep: Option<f64>,
}

/// One parsed `(action, message)` row. Constructed once via [`Action::parse`]
/// and then matched exhaustively everywhere downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Index(IndexPayload),
    CopyImage(CopyImagePayload),
    DeleteImage(DeleteImagePayload),
    Deindex(DeindexPayload),
    Noop(NoopPayload),
}

impl Action {
    pub fn parse(action: &str, message: &Value) -> Result<Self, IndexerError> {
        let from = |v: Result<_, serde_json::Error>| {
            v.map_err(|e| IndexerError::MalformedMessage(format!("{action}: {e}")))
        };
        match action {
            "index" => Ok(Action::Index(from(serde_json::from_value(message.clone()))?)),
            "copy_image" => Ok(Action::CopyImage(from(serde_json::from_value(
                message.clone(),
            ))?)),
            "delete_image" => Ok(Action::DeleteImage(from(serde_json::from_value(
                message.clone(),
            ))?)),
            "deindex" => Ok(Action::Deindex(from(serde_json::from_value(
                message.clone(),
            ))?)),
            "noop" => Ok(Action::Noop(from(serde_json::from_value(
                message.clone(),
            ))?)),
            other => Err(IndexerError::MalformedMessage(format!(
                "unknown action {other:?}"
            ))),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Action::Index(_) => "index",
            Action::CopyImage(_) => "copy_image",
            Action::DeleteImage(_) => "delete_image",
            Action::Deindex(_) => "deindex",
            Action::Noop(_) => "noop",
        }
    }
}

/// Re-exported for call sites that only need the raw JSON without parsing
/// into a variant (e.g. the trigger-side enqueue helpers).
pub type Message = Value;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_index_payload() {
        let parsed = Action::parse("index", &json!({"gid": "abc-123"})).unwrap();
        assert_eq!(
            parsed,
            Action::Index(IndexPayload {
                gid: "abc-123".into()
            })
        );
    }

    #[test]
    fn parses_copy_image_payload() {
        let parsed = Action::parse(
            "copy_image",
            &json!({
                "artwork_id": 1,
                "old_gid": "old",
                "new_gid": "new",
                "suffix": "jpg",
            }),
        )
        .unwrap();
        assert_eq!(parsed.name(), "copy_image");
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(Action::parse("explode", &json!({})).is_err());
    }

    #[test]
    fn rejects_malformed_payload_for_known_action() {
        assert!(Action::parse("index", &json!({"not_gid": 1})).is_err());
    }

    #[test]
    fn noop_defaults_are_permissive() {
        let parsed = Action::parse("noop", &json!({})).unwrap();
        assert_eq!(parsed, Action::Noop(NoopPayload::default()));
    }
}
