use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ambient information passed to a connection with every execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Unique, time-ordered identifier of this context.
    pub id: Uuid,
    /// The user on whose behalf requests are executed, if known.
    pub user: Option<String>,
    /// When the context was created.
    pub created_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// An anonymous context.
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            user: None,
            created_at: Utc::now(),
        }
    }

    /// A context acting on behalf of the named user.
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::new()
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_have_unique_ids() {
        assert_ne!(ExecutionContext::new().id, ExecutionContext::new().id);
    }

    #[test]
    fn for_user_records_user() {
        let ctx = ExecutionContext::for_user("alice");
        assert_eq!(ctx.user.as_deref(), Some("alice"));
    }
}
