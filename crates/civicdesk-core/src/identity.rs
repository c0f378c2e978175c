use crate::error::CivicError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Actor roles recognized by the moderation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Citizen,
    Staff,
    Admin,
}

impl ActorRole {
    pub fn name(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "citizen" => Some(Self::Citizen),
            "staff" => Some(Self::Staff),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Staff and admins may act on the issue lifecycle.
    pub fn can_moderate(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

/// Identity as the engine sees it. Owned by the identity gate collaborator;
/// the engine reads these fields and never mutates them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub photo: Option<String>,
    pub role: ActorRole,
    pub is_verified: bool,
    pub is_blocked: bool,
}

/// Registration input. New users start as unverified, unblocked citizens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
}

/// Outcome of a registration attempt. A duplicate email is a business
/// outcome, not an error.
#[derive(Debug, Clone)]
pub enum RegistrationOutcome {
    Created(Identity),
    AlreadyExists(Identity),
}

/// Identity collaborator boundary.
///
/// `verify` resolves a transport credential to an identity; `set_verified` is
/// the delegated premium upgrade triggered by a confirmed subscription
/// payment. The engine owns neither the user records nor their lifecycle.
#[async_trait]
pub trait IdentityGate: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, CivicError>;

    async fn lookup(&self, email: &str) -> Result<Option<Identity>, CivicError>;

    async fn register(&self, user: NewUser) -> Result<RegistrationOutcome, CivicError>;

    async fn set_verified(&self, email: &str) -> Result<(), CivicError>;

    async fn user_count(&self) -> Result<u64, CivicError>;
}
