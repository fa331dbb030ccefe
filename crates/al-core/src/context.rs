//! Context type for tracking who caused an event or service call

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Causation context attached to every event and service call
///
/// The id is opaque to the host. Components that want to recognize their
/// own actions build ids with a known prefix and use [`Context::with_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Identifier of this context
    pub id: String,

    /// User that initiated the action, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Context that caused this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    /// Create a context with a fresh ULID
    pub fn new() -> Self {
        Self::with_id(Ulid::new().to_string())
    }

    /// Create a context with a caller-chosen id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            parent_id: None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contexts_are_distinct() {
        assert_ne!(Context::new().id, Context::new().id);
    }

    #[test]
    fn test_with_id_keeps_id_verbatim() {
        let ctx = Context::with_id("abcdef0123");
        assert_eq!(ctx.id, "abcdef0123");
        assert!(ctx.parent_id.is_none());
    }

    #[test]
    fn test_serialization_skips_empty_links() {
        let json = serde_json::to_value(Context::with_id("x")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "x"}));
    }
}
