use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::lifecycle::{IssueStatus, Priority};

/// Reporter reference embedded in every issue. Set once at creation and
/// never reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterRef {
    pub name: String,
    pub email: String,
}

impl ReporterRef {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Denormalized staff snapshot bound to an issue at assignment time.
///
/// A copy, not a live reference: later profile edits must not retroactively
/// change what the timeline says happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAssignment {
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

/// A reported civic issue tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub reporter: ReporterRef,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub photo: Option<String>,
    pub status: IssueStatus,
    pub priority: Priority,
    pub upvotes: u64,
    /// Invariant: `upvotes == upvoted_by.len()` and the reporter's own email
    /// never appears here.
    pub upvoted_by: BTreeSet<String>,
    pub assigned_staff: Option<StaffAssignment>,
    pub created_at: DateTime<Utc>,
}

/// Citizen-supplied content for a new issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDraft {
    pub reporter: ReporterRef,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub photo: Option<String>,
}

impl IssueDraft {
    pub fn new(
        reporter: ReporterRef,
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            reporter,
            title: title.into(),
            description: description.into(),
            category: category.into(),
            location: location.into(),
            photo: None,
        }
    }

    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }
}

/// Partial content edit applied by the reporter while the issue is pending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub photo: Option<String>,
}

/// Outcome of a quota-gated submission.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    Created(Issue),
    Denied { reason: &'static str },
}

/// Outcome of an upvote attempt. Rejections are business outcomes; only a
/// missing issue is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpvoteOutcome {
    Applied { upvotes: u64 },
    Rejected { reason: &'static str },
}

/// Confirmed payment kinds entering the engine from the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PaymentKind {
    Subscription,
    Boost { issue_id: Uuid },
}

/// Confirmed payment, recorded for revenue statistics before its side effect
/// is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: Uuid,
    pub email: String,
    pub payer_name: String,
    #[serde(flatten)]
    pub kind: PaymentKind,
    pub amount_minor: u64,
    pub paid_at: DateTime<Utc>,
}

/// Result of applying a confirmed payment.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    SubscriptionActivated { email: String },
    Boosted(Issue),
    /// The payment is kept for accounting but the issue was not mutated.
    BoostSkipped { reason: &'static str },
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_issues: u64,
    pub total_payments: u64,
    pub revenue_minor: u64,
    pub pending_issues: u64,
    pub resolved_issues: u64,
}
