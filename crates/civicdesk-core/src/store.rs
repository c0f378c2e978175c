use crate::error::CivicError;
use crate::lifecycle::IssueStatus;
use crate::types::{Issue, UpvoteOutcome};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Machine-checkable upvote rejection reasons.
pub const REJECT_OWN_ISSUE: &str = "cannot upvote own issue";
pub const REJECT_ALREADY_UPVOTED: &str = "already upvoted";

/// In-memory issue store, owned exclusively by the engine.
///
/// Every check-then-write sequence on a single issue executes under the
/// store's write lock, so conditional updates (the upvote guard) are
/// indivisible. Reads clone snapshots; callers never hold references into
/// the map.
#[derive(Debug, Default)]
pub struct IssueStore {
    issues: RwLock<HashMap<Uuid, Issue>>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self {
            issues: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, issue: Issue) {
        self.issues.write().await.insert(issue.id, issue);
    }

    pub async fn get(&self, id: Uuid) -> Option<Issue> {
        self.issues.read().await.get(&id).cloned()
    }

    pub async fn count(&self) -> u64 {
        self.issues.read().await.len() as u64
    }

    pub async fn count_by_reporter(&self, email: &str) -> u64 {
        self.issues
            .read()
            .await
            .values()
            .filter(|issue| issue.reporter.email == email)
            .count() as u64
    }

    pub async fn count_by_status(&self, status: IssueStatus) -> u64 {
        self.issues
            .read()
            .await
            .values()
            .filter(|issue| issue.status == status)
            .count() as u64
    }

    pub async fn snapshot(&self) -> Vec<Issue> {
        self.issues.read().await.values().cloned().collect()
    }

    /// The reporter's own issues, newest first.
    pub async fn by_reporter(&self, email: &str) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self
            .issues
            .read()
            .await
            .values()
            .filter(|issue| issue.reporter.email == email)
            .cloned()
            .collect();
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        issues
    }

    /// Apply a mutation to one issue under the write lock and return the
    /// closure's result.
    pub async fn update<F, T>(&self, id: Uuid, mutate: F) -> Result<T, CivicError>
    where
        F: FnOnce(&mut Issue) -> Result<T, CivicError>,
    {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or(CivicError::IssueNotFound(id))?;
        mutate(issue)
    }

    /// Atomic conditional upvote: record the voter and increment the counter
    /// only if the voter is absent, as one indivisible operation. Two
    /// concurrent attempts by the same voter cannot both succeed.
    pub async fn apply_upvote(
        &self,
        id: Uuid,
        voter_email: &str,
    ) -> Result<UpvoteOutcome, CivicError> {
        let mut issues = self.issues.write().await;
        let issue = issues.get_mut(&id).ok_or(CivicError::IssueNotFound(id))?;

        if issue.reporter.email == voter_email {
            return Ok(UpvoteOutcome::Rejected {
                reason: REJECT_OWN_ISSUE,
            });
        }
        if !issue.upvoted_by.insert(voter_email.to_string()) {
            return Ok(UpvoteOutcome::Rejected {
                reason: REJECT_ALREADY_UPVOTED,
            });
        }
        issue.upvotes += 1;
        Ok(UpvoteOutcome::Applied {
            upvotes: issue.upvotes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Priority;
    use crate::types::ReporterRef;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn issue(reporter_email: &str) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            reporter: ReporterRef::new("Ada Citizen", reporter_email),
            title: "Broken streetlight".to_string(),
            description: "Light out on 5th and Main".to_string(),
            category: "lighting".to_string(),
            location: "5th and Main".to_string(),
            photo: None,
            status: IssueStatus::Pending,
            priority: Priority::Normal,
            upvotes: 0,
            upvoted_by: BTreeSet::new(),
            assigned_staff: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upvote_rejects_reporter_and_duplicates() {
        let store = IssueStore::new();
        let subject = issue("ada@example.org");
        let id = subject.id;
        store.insert(subject).await;

        let outcome = store.apply_upvote(id, "ada@example.org").await.unwrap();
        assert_eq!(
            outcome,
            UpvoteOutcome::Rejected {
                reason: REJECT_OWN_ISSUE
            }
        );

        let outcome = store.apply_upvote(id, "carol@example.org").await.unwrap();
        assert_eq!(outcome, UpvoteOutcome::Applied { upvotes: 1 });

        let outcome = store.apply_upvote(id, "carol@example.org").await.unwrap();
        assert_eq!(
            outcome,
            UpvoteOutcome::Rejected {
                reason: REJECT_ALREADY_UPVOTED
            }
        );

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.upvotes, 1);
        assert_eq!(stored.upvotes, stored.upvoted_by.len() as u64);
        assert!(!stored.upvoted_by.contains("ada@example.org"));
    }

    #[tokio::test]
    async fn concurrent_duplicate_upvotes_apply_at_most_once() {
        let store = Arc::new(IssueStore::new());
        let subject = issue("ada@example.org");
        let id = subject.id;
        store.insert(subject).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.apply_upvote(id, "carol@example.org").await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), UpvoteOutcome::Applied { .. }) {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.upvotes, 1);
        assert_eq!(stored.upvoted_by.len(), 1);
    }

    #[tokio::test]
    async fn upvoting_missing_issue_is_not_found() {
        let store = IssueStore::new();
        let err = store
            .apply_upvote(Uuid::new_v4(), "carol@example.org")
            .await
            .unwrap_err();
        assert!(matches!(err, CivicError::IssueNotFound(_)));
    }

    #[tokio::test]
    async fn count_by_reporter_sees_only_that_reporter() {
        let store = IssueStore::new();
        store.insert(issue("ada@example.org")).await;
        store.insert(issue("ada@example.org")).await;
        store.insert(issue("bob@example.org")).await;

        assert_eq!(store.count_by_reporter("ada@example.org").await, 2);
        assert_eq!(store.count_by_reporter("bob@example.org").await, 1);
        assert_eq!(store.count().await, 3);
    }
}
