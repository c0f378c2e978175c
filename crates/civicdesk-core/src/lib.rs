//! CivicDesk issue lifecycle & moderation engine.
//!
//! This crate enforces the platform's workflow invariants: free-tier
//! submission quotas, at-most-one-upvote-per-citizen with self-vote
//! prohibition, explicit lifecycle transitions, and an append-only audit
//! timeline recording every status- or priority-changing event.

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod lifecycle;
pub mod policy;
pub mod query;
pub mod storage;
pub mod store;
pub mod types;

pub use engine::{CivicEngine, EngineConfig};
pub use error::CivicError;
pub use identity::{ActorRole, Identity, IdentityGate, NewUser, RegistrationOutcome};
pub use ledger::{TimelineEntry, TimelineEvent, TimelineLedger};
pub use lifecycle::{IssueStatus, Priority};
pub use policy::{QuotaPolicy, QuotaPolicyConfig, SubmissionDecision};
pub use query::{IssueFilter, PageRequest, Paged};
pub use storage::{PersistentTimeline, TimelineStorageConfig};
pub use store::IssueStore;
pub use types::{
    ContentPatch, Issue, IssueDraft, PaymentKind, PaymentOutcome, PaymentRecord, PlatformStats,
    ReporterRef, StaffAssignment, SubmissionOutcome, UpvoteOutcome,
};
