use crate::error::CivicError;
use crate::identity::{ActorRole, Identity, IdentityGate, NewUser, RegistrationOutcome};
use crate::ledger::{TimelineEntry, TimelineEvent};
use crate::lifecycle::{self, IssueStatus, Priority};
use crate::policy::{QuotaPolicy, QuotaPolicyConfig, SubmissionDecision};
use crate::query::{self, IssueFilter, PageRequest, Paged};
use crate::storage::{PersistentTimeline, TimelineStorageConfig};
use crate::store::IssueStore;
use crate::types::{
    ContentPatch, Issue, IssueDraft, PaymentKind, PaymentOutcome, PaymentRecord, PlatformStats,
    StaffAssignment, SubmissionOutcome, UpvoteOutcome,
};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use uuid::Uuid;

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub quota: QuotaPolicyConfig,
    pub timeline_storage: TimelineStorageConfig,
}

/// Issue lifecycle & moderation engine.
///
/// Owns the issue store and the audit timeline; identity and payments are
/// collaborators behind narrow interfaces. Lifecycle mutations append their
/// timeline entry and mutate the issue record as one logical operation: the
/// entry is committed to the ledger (mirror first when configured) before
/// the issue record changes, so a status change with zero audit rows cannot
/// occur. The timeline lock doubles as the serialization point for
/// multi-step lifecycle operations; upvotes serialize on the store's own
/// write lock and never touch the timeline.
pub struct CivicEngine {
    store: IssueStore,
    timeline: AsyncMutex<PersistentTimeline>,
    payments: RwLock<Vec<PaymentRecord>>,
    gate: Arc<dyn IdentityGate>,
    policy: QuotaPolicy,
}

impl CivicEngine {
    pub async fn bootstrap(
        gate: Arc<dyn IdentityGate>,
        config: EngineConfig,
    ) -> Result<Self, CivicError> {
        let timeline = PersistentTimeline::bootstrap(config.timeline_storage).await?;

        Ok(Self {
            store: IssueStore::new(),
            timeline: AsyncMutex::new(timeline),
            payments: RwLock::new(Vec::new()),
            gate,
            policy: QuotaPolicy::new(config.quota),
        })
    }

    pub async fn timeline_backend(&self) -> &'static str {
        self.timeline.lock().await.backend_label()
    }

    /// Resolve a transport credential via the identity gate.
    pub async fn authenticate(&self, credential: &str) -> Result<Identity, CivicError> {
        self.gate.verify(credential).await
    }

    pub async fn register_user(&self, user: NewUser) -> Result<RegistrationOutcome, CivicError> {
        self.gate.register(user).await
    }

    pub async fn user(&self, email: &str) -> Result<Identity, CivicError> {
        self.gate
            .lookup(email)
            .await?
            .ok_or_else(|| CivicError::UserNotFound(email.to_string()))
    }

    /// Quota-gated issue submission. Denials are structured outcomes; the
    /// store and the timeline are untouched when the policy says no.
    pub async fn create_issue(&self, draft: IssueDraft) -> Result<SubmissionOutcome, CivicError> {
        let reporter = self
            .gate
            .lookup(&draft.reporter.email)
            .await?
            .ok_or_else(|| CivicError::UserNotFound(draft.reporter.email.clone()))?;

        let existing = self.store.count_by_reporter(&reporter.email).await;
        if let SubmissionDecision::Deny { reason } = self.policy.evaluate(&reporter, existing) {
            return Ok(SubmissionOutcome::Denied { reason });
        }

        let issue = Issue {
            id: Uuid::new_v4(),
            reporter: draft.reporter,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            location: draft.location,
            photo: draft.photo,
            status: IssueStatus::Pending,
            priority: Priority::Normal,
            upvotes: 0,
            upvoted_by: BTreeSet::new(),
            assigned_staff: None,
            created_at: Utc::now(),
        };

        // Ledger first: a stored issue with no "reported" entry would violate
        // the audit guarantee.
        {
            let mut timeline = self.timeline.lock().await;
            timeline
                .append(TimelineEvent::new(
                    issue.id,
                    IssueStatus::Pending,
                    "Issue reported by citizen",
                    reporter.name.clone(),
                    reporter.role,
                ))
                .await?;
        }
        self.store.insert(issue.clone()).await;

        Ok(SubmissionOutcome::Created(issue))
    }

    /// Reporter-only content edit, allowed while the issue is still pending.
    /// Content edits change no workflow state and produce no timeline entry.
    pub async fn update_content(
        &self,
        issue_id: Uuid,
        reporter_email: &str,
        patch: ContentPatch,
    ) -> Result<Issue, CivicError> {
        self.store
            .update(issue_id, |issue| {
                if issue.reporter.email != reporter_email {
                    return Err(CivicError::Forbidden {
                        actor: reporter_email.to_string(),
                        action: "edit issue content",
                    });
                }
                if issue.status != IssueStatus::Pending {
                    return Err(CivicError::ContentLocked(issue.status.name().to_string()));
                }

                if let Some(title) = patch.title {
                    issue.title = title;
                }
                if let Some(description) = patch.description {
                    issue.description = description;
                }
                if let Some(category) = patch.category {
                    issue.category = category;
                }
                if let Some(location) = patch.location {
                    issue.location = location;
                }
                if let Some(photo) = patch.photo {
                    issue.photo = Some(photo);
                }
                Ok(issue.clone())
            })
            .await
    }

    /// Bind a staff identity to an issue and force it in-progress.
    ///
    /// The staff profile is denormalized into a snapshot so later profile
    /// edits do not rewrite history. Re-assignment overwrites the snapshot
    /// and appends a fresh entry.
    pub async fn assign(
        &self,
        issue_id: Uuid,
        staff_email: &str,
        actor_email: &str,
    ) -> Result<Issue, CivicError> {
        let actor = self.moderator(actor_email, "assign staff").await?;
        let staff = self
            .gate
            .lookup(staff_email)
            .await?
            .ok_or_else(|| CivicError::UserNotFound(staff_email.to_string()))?;

        let snapshot = StaffAssignment {
            name: staff.name.clone(),
            email: staff.email.clone(),
            photo: staff.photo.clone(),
            assigned_at: Utc::now(),
        };
        let message = format!("Issue assigned to {}", staff.name);

        self.transition(issue_id, IssueStatus::InProgress, message, &actor, move |issue| {
            issue.assigned_staff = Some(snapshot);
        })
        .await
    }

    /// Explicit status update by staff or admin, validated against the
    /// transition table.
    pub async fn update_status(
        &self,
        issue_id: Uuid,
        to: IssueStatus,
        actor_email: &str,
    ) -> Result<Issue, CivicError> {
        let actor = self.moderator(actor_email, "update issue status").await?;
        let message = format!("Status changed to {}", to.name());
        self.transition(issue_id, to, message, &actor, |_| {}).await
    }

    /// Admin rejection, reachable from any non-terminal state.
    pub async fn reject(&self, issue_id: Uuid, actor_email: &str) -> Result<Issue, CivicError> {
        let actor = self.moderator(actor_email, "reject issue").await?;
        if actor.role != ActorRole::Admin {
            return Err(CivicError::Forbidden {
                actor: actor.email,
                action: "reject issue",
            });
        }

        self.transition(
            issue_id,
            IssueStatus::Rejected,
            "Issue rejected by admin".to_string(),
            &actor,
            |_| {},
        )
        .await
    }

    /// Upvote guard: existence, self-vote, and duplicate checks ending in an
    /// atomic conditional update. Upvotes are not lifecycle events and leave
    /// no timeline entry.
    pub async fn upvote(
        &self,
        issue_id: Uuid,
        voter_email: &str,
    ) -> Result<UpvoteOutcome, CivicError> {
        self.store.apply_upvote(issue_id, voter_email).await
    }

    /// Record a confirmed payment and apply its effect: subscriptions verify
    /// the payer (delegated to the identity gate), boosts raise the issue's
    /// priority. The payment row is kept for revenue accounting either way.
    pub async fn record_payment(
        &self,
        payment: PaymentRecord,
    ) -> Result<PaymentOutcome, CivicError> {
        self.payments.write().await.push(payment.clone());

        match payment.kind {
            PaymentKind::Subscription => {
                self.gate.set_verified(&payment.email).await?;
                Ok(PaymentOutcome::SubscriptionActivated {
                    email: payment.email,
                })
            }
            PaymentKind::Boost { issue_id } => {
                self.apply_boost(issue_id, &payment.payer_name).await
            }
        }
    }

    async fn apply_boost(
        &self,
        issue_id: Uuid,
        payer_name: &str,
    ) -> Result<PaymentOutcome, CivicError> {
        let mut timeline = self.timeline.lock().await;

        let Some(current) = self.store.get(issue_id).await else {
            return Ok(PaymentOutcome::BoostSkipped {
                reason: "issue not found",
            });
        };
        if current.status.is_terminal() {
            return Ok(PaymentOutcome::BoostSkipped {
                reason: "issue is in a terminal state",
            });
        }
        if current.priority == Priority::High {
            return Ok(PaymentOutcome::BoostSkipped {
                reason: "already high priority",
            });
        }

        // Status is unchanged by a boost; the entry records the state the
        // issue holds at boost time.
        timeline
            .append(TimelineEvent::new(
                issue_id,
                current.status,
                "Issue priority boosted to High",
                payer_name,
                ActorRole::Citizen,
            ))
            .await?;

        let issue = self
            .store
            .update(issue_id, |issue| {
                issue.priority = Priority::High;
                Ok(issue.clone())
            })
            .await?;

        Ok(PaymentOutcome::Boosted(issue))
    }

    pub async fn issue(&self, issue_id: Uuid) -> Result<Issue, CivicError> {
        self.store
            .get(issue_id)
            .await
            .ok_or(CivicError::IssueNotFound(issue_id))
    }

    /// Filtered, triage-ordered, paginated listing for the staff queue.
    pub async fn list_issues(&self, filter: &IssueFilter, page: PageRequest) -> Paged<Issue> {
        let mut issues = self.store.snapshot().await;
        issues.retain(|issue| filter.matches(issue));
        query::triage_sort(&mut issues);
        query::paginate(issues, page)
    }

    pub async fn my_issues(&self, email: &str) -> Vec<Issue> {
        self.store.by_reporter(email).await
    }

    /// Timeline for one issue, newest first.
    pub async fn timeline(&self, issue_id: Uuid) -> Result<Vec<TimelineEntry>, CivicError> {
        if self.store.get(issue_id).await.is_none() {
            return Err(CivicError::IssueNotFound(issue_id));
        }
        Ok(self.timeline.lock().await.entries_for_issue(issue_id))
    }

    pub async fn verify_timeline(&self) -> bool {
        self.timeline.lock().await.verify_chain()
    }

    pub async fn stats(&self) -> Result<PlatformStats, CivicError> {
        let payments = self.payments.read().await;

        Ok(PlatformStats {
            total_users: self.gate.user_count().await?,
            total_issues: self.store.count().await,
            total_payments: payments.len() as u64,
            revenue_minor: payments.iter().map(|p| p.amount_minor).sum(),
            pending_issues: self.store.count_by_status(IssueStatus::Pending).await,
            resolved_issues: self.store.count_by_status(IssueStatus::Resolved).await,
        })
    }

    async fn moderator(
        &self,
        actor_email: &str,
        action: &'static str,
    ) -> Result<Identity, CivicError> {
        let actor = self
            .gate
            .lookup(actor_email)
            .await?
            .ok_or(CivicError::Unauthenticated)?;
        if !actor.role.can_moderate() {
            return Err(CivicError::Forbidden {
                actor: actor.email,
                action,
            });
        }
        Ok(actor)
    }

    /// Validate the transition, append its timeline entry, then mutate the
    /// issue record. The timeline lock is held across all three steps so
    /// concurrent lifecycle operations on the same issue serialize.
    async fn transition(
        &self,
        issue_id: Uuid,
        to: IssueStatus,
        message: String,
        actor: &Identity,
        mutate: impl FnOnce(&mut Issue),
    ) -> Result<Issue, CivicError> {
        let mut timeline = self.timeline.lock().await;

        let current = self
            .store
            .get(issue_id)
            .await
            .ok_or(CivicError::IssueNotFound(issue_id))?;
        lifecycle::check_transition(current.status, to)?;

        timeline
            .append(TimelineEvent::new(
                issue_id,
                to,
                message,
                actor.name.clone(),
                actor.role,
            ))
            .await?;

        self.store
            .update(issue_id, |issue| {
                issue.status = to;
                mutate(issue);
                Ok(issue.clone())
            })
            .await
    }
}
