use thiserror::Error;
use uuid::Uuid;

/// CivicDesk engine errors.
///
/// Policy denials (quota, duplicate upvotes, duplicate registration) are not
/// errors; the operations that produce them return structured outcomes so
/// clients can tell a business rule from an infrastructure failure.
#[derive(Debug, Error)]
pub enum CivicError {
    #[error("issue '{0}' not found")]
    IssueNotFound(Uuid),

    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("credential could not be resolved to an identity")]
    Unauthenticated,

    #[error("actor '{actor}' may not {action}")]
    Forbidden { actor: String, action: &'static str },

    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("issue content is locked once status is '{0}'")]
    ContentLocked(String),

    #[error("identity gate failure: {0}")]
    IdentityGate(String),

    #[error("timeline ledger error: {0}")]
    Ledger(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CivicError {
    pub fn transition_violation(from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
