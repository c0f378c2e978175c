//! Collaborator adapters for CivicDesk.

#![deny(unsafe_code)]

use async_trait::async_trait;
use civicdesk_core::error::CivicError;
use civicdesk_core::identity::{ActorRole, Identity, IdentityGate, NewUser, RegistrationOutcome};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory identity directory for local runs and tests.
///
/// Credentials are opaque bearer tokens equal to the registered email, which
/// keeps local development free of any real authentication protocol.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, Identity>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace an identity, bypassing registration defaults. Used
    /// to provision staff and admin accounts.
    pub async fn seed(&self, identity: Identity) {
        self.users
            .write()
            .await
            .insert(identity.email.clone(), identity);
    }

    pub async fn set_blocked(&self, email: &str, blocked: bool) -> Result<(), CivicError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(email)
            .ok_or_else(|| CivicError::UserNotFound(email.to_string()))?;
        user.is_blocked = blocked;
        Ok(())
    }
}

#[async_trait]
impl IdentityGate for InMemoryDirectory {
    async fn verify(&self, credential: &str) -> Result<Identity, CivicError> {
        self.users
            .read()
            .await
            .get(credential)
            .cloned()
            .ok_or(CivicError::Unauthenticated)
    }

    async fn lookup(&self, email: &str) -> Result<Option<Identity>, CivicError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn register(&self, user: NewUser) -> Result<RegistrationOutcome, CivicError> {
        let mut users = self.users.write().await;
        if let Some(existing) = users.get(&user.email) {
            return Ok(RegistrationOutcome::AlreadyExists(existing.clone()));
        }

        let identity = Identity {
            email: user.email.clone(),
            name: user.name,
            photo: user.photo,
            role: ActorRole::Citizen,
            is_verified: false,
            is_blocked: false,
        };
        users.insert(user.email, identity.clone());
        Ok(RegistrationOutcome::Created(identity))
    }

    async fn set_verified(&self, email: &str) -> Result<(), CivicError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(email)
            .ok_or_else(|| CivicError::UserNotFound(email.to_string()))?;
        user.is_verified = true;
        Ok(())
    }

    async fn user_count(&self) -> Result<u64, CivicError> {
        Ok(self.users.read().await.len() as u64)
    }
}

/// Directory that fails every call, useful for exercising collaborator
/// failure paths.
#[derive(Debug, Clone)]
pub struct AlwaysFailDirectory {
    reason: String,
}

impl AlwaysFailDirectory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> CivicError {
        CivicError::IdentityGate(self.reason.clone())
    }
}

#[async_trait]
impl IdentityGate for AlwaysFailDirectory {
    async fn verify(&self, _credential: &str) -> Result<Identity, CivicError> {
        Err(self.error())
    }

    async fn lookup(&self, _email: &str) -> Result<Option<Identity>, CivicError> {
        Err(self.error())
    }

    async fn register(&self, _user: NewUser) -> Result<RegistrationOutcome, CivicError> {
        Err(self.error())
    }

    async fn set_verified(&self, _email: &str) -> Result<(), CivicError> {
        Err(self.error())
    }

    async fn user_count(&self) -> Result<u64, CivicError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(email: &str) -> Identity {
        Identity {
            email: email.to_string(),
            name: "Sam Staff".to_string(),
            photo: None,
            role: ActorRole::Staff,
            is_verified: true,
            is_blocked: false,
        }
    }

    #[tokio::test]
    async fn registration_creates_unverified_citizen_once() {
        let directory = InMemoryDirectory::new();

        let outcome = directory
            .register(NewUser {
                name: "Ada Citizen".to_string(),
                email: "ada@example.org".to_string(),
                photo: None,
            })
            .await
            .unwrap();
        let created = match outcome {
            RegistrationOutcome::Created(identity) => identity,
            RegistrationOutcome::AlreadyExists(_) => panic!("fresh email reported as existing"),
        };
        assert_eq!(created.role, ActorRole::Citizen);
        assert!(!created.is_verified);
        assert!(!created.is_blocked);

        let outcome = directory
            .register(NewUser {
                name: "Ada Again".to_string(),
                email: "ada@example.org".to_string(),
                photo: None,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RegistrationOutcome::AlreadyExists(_)));
        assert_eq!(directory.user_count().await.unwrap(), 1);

        // The original registration is untouched by the duplicate attempt.
        let stored = directory.lookup("ada@example.org").await.unwrap().unwrap();
        assert_eq!(stored.name, "Ada Citizen");
    }

    #[tokio::test]
    async fn verify_resolves_known_tokens_only() {
        let directory = InMemoryDirectory::new();
        directory.seed(staff("sam@example.org")).await;

        assert!(directory.verify("sam@example.org").await.is_ok());
        let err = directory.verify("stranger@example.org").await.unwrap_err();
        assert!(matches!(err, CivicError::Unauthenticated));
    }

    #[tokio::test]
    async fn set_verified_and_set_blocked_update_flags() {
        let directory = InMemoryDirectory::new();
        directory
            .register(NewUser {
                name: "Ada Citizen".to_string(),
                email: "ada@example.org".to_string(),
                photo: None,
            })
            .await
            .unwrap();

        directory.set_verified("ada@example.org").await.unwrap();
        directory.set_blocked("ada@example.org", true).await.unwrap();

        let stored = directory.lookup("ada@example.org").await.unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.is_blocked);

        let err = directory.set_verified("nobody@example.org").await.unwrap_err();
        assert!(matches!(err, CivicError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn failing_directory_surfaces_identity_gate_errors() {
        let directory = AlwaysFailDirectory::new("directory offline");
        let err = directory.lookup("ada@example.org").await.unwrap_err();
        assert!(matches!(err, CivicError::IdentityGate(_)));
        assert!(err.to_string().contains("directory offline"));
    }
}
