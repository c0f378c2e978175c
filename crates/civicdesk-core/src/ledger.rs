use crate::error::CivicError;
use crate::identity::ActorRole;
use crate::lifecycle::IssueStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A workflow event to be recorded on an issue's timeline. `status` is the
/// state the issue holds once the event is applied; for priority boosts it is
/// the unchanged current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub issue_id: Uuid,
    pub status: IssueStatus,
    pub message: String,
    pub updated_by: String,
    pub role: ActorRole,
    pub date: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn new(
        issue_id: Uuid,
        status: IssueStatus,
        message: impl Into<String>,
        updated_by: impl Into<String>,
        role: ActorRole,
    ) -> Self {
        Self {
            issue_id,
            status,
            message: message.into(),
            updated_by: updated_by.into(),
            role,
            date: Utc::now(),
        }
    }
}

/// Hash-chained timeline entry. Entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub entry_id: String,
    pub index: u64,
    pub issue_id: Uuid,
    pub status: IssueStatus,
    pub message: String,
    pub updated_by: String,
    pub role: ActorRole,
    pub date: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only audit timeline with hash-chain proofs.
///
/// No in-place mutation APIs are exposed. Every status- or priority-changing
/// operation becomes an additional record, which preserves the full history
/// of who did what and when.
#[derive(Debug, Default, Clone)]
pub struct TimelineLedger {
    entries: Vec<TimelineEntry>,
}

impl TimelineLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a ledger from persisted entries and verify hash-chain
    /// integrity.
    pub fn from_entries(entries: Vec<TimelineEntry>) -> Result<Self, CivicError> {
        let ledger = Self { entries };

        for (expected_index, entry) in ledger.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(CivicError::Ledger(format!(
                    "timeline index gap detected at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !ledger.verify_chain() {
            return Err(CivicError::Ledger(
                "persisted timeline hash-chain verification failed".to_string(),
            ));
        }

        Ok(ledger)
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Entries for one issue, newest first.
    pub fn entries_for_issue(&self, issue_id: Uuid) -> Vec<TimelineEntry> {
        let mut items: Vec<TimelineEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.issue_id == issue_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date).then(b.index.cmp(&a.index)));
        items
    }

    pub fn append(&mut self, event: TimelineEvent) -> Result<TimelineEntry, CivicError> {
        let entry = self.build_entry(event);
        self.commit_entry(entry.clone())?;
        Ok(entry)
    }

    /// Build the next deterministic entry without mutating the in-memory
    /// chain.
    pub fn build_entry(&self, event: TimelineEvent) -> TimelineEntry {
        let index = self.entries.len() as u64;
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(index, &event, previous_hash.as_deref());

        TimelineEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            issue_id: event.issue_id,
            status: event.status,
            message: event.message,
            updated_by: event.updated_by,
            role: event.role,
            date: event.date,
            previous_hash,
            entry_hash,
        }
    }

    /// Commit a pre-built entry after external durability succeeds.
    pub fn commit_entry(&mut self, entry: TimelineEntry) -> Result<(), CivicError> {
        let expected_index = self.entries.len() as u64;
        if entry.index != expected_index {
            return Err(CivicError::Ledger(format!(
                "commit index mismatch: expected {}, got {}",
                expected_index, entry.index
            )));
        }

        let expected_previous_hash = self.entries.last().map(|e| e.entry_hash.clone());
        if entry.previous_hash != expected_previous_hash {
            return Err(CivicError::Ledger(
                "commit previous hash mismatch".to_string(),
            ));
        }

        let material = TimelineEvent {
            issue_id: entry.issue_id,
            status: entry.status,
            message: entry.message.clone(),
            updated_by: entry.updated_by.clone(),
            role: entry.role,
            date: entry.date,
        };
        let expected_hash =
            compute_entry_hash(entry.index, &material, entry.previous_hash.as_deref());
        if entry.entry_hash != expected_hash {
            return Err(CivicError::Ledger(
                "commit hash mismatch for timeline entry".to_string(),
            ));
        }

        self.entries.push(entry);
        Ok(())
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let material = TimelineEvent {
                issue_id: entry.issue_id,
                status: entry.status,
                message: entry.message.clone(),
                updated_by: entry.updated_by.clone(),
                role: entry.role,
                date: entry.date,
            };
            let expected_hash =
                compute_entry_hash(entry.index, &material, previous_hash.as_deref());
            if entry.entry_hash != expected_hash {
                return false;
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }
}

fn compute_entry_hash(index: u64, event: &TimelineEvent, previous_hash: Option<&str>) -> String {
    let material = serde_json::json!({
        "index": index,
        "issue_id": event.issue_id,
        "status": event.status,
        "message": event.message,
        "updated_by": event.updated_by,
        "role": event.role,
        "date": event.date,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(issue_id: Uuid) -> TimelineEvent {
        TimelineEvent::new(
            issue_id,
            IssueStatus::Pending,
            "Issue reported by citizen",
            "Ada Citizen",
            ActorRole::Citizen,
        )
    }

    #[test]
    fn verifies_hash_chain() {
        let mut ledger = TimelineLedger::new();
        let issue_id = Uuid::new_v4();

        ledger.append(reported(issue_id)).expect("reported appended");
        ledger
            .append(TimelineEvent::new(
                issue_id,
                IssueStatus::InProgress,
                "Issue assigned to Sam Staff",
                "Alice Admin",
                ActorRole::Admin,
            ))
            .expect("assigned appended");

        assert!(ledger.verify_chain());
        assert_eq!(ledger.entries().len(), 2);
    }

    #[test]
    fn detects_tampered_entries() {
        let mut ledger = TimelineLedger::new();
        ledger.append(reported(Uuid::new_v4())).expect("appended");

        // Clone and tamper outside of append APIs to validate proof behavior.
        let mut tampered = ledger.clone();
        tampered.entries[0].message = "Issue resolved".to_string();

        assert!(!tampered.verify_chain());
    }

    #[test]
    fn per_issue_reads_are_newest_first() {
        let mut ledger = TimelineLedger::new();
        let ours = Uuid::new_v4();
        let theirs = Uuid::new_v4();

        ledger.append(reported(ours)).unwrap();
        ledger.append(reported(theirs)).unwrap();
        ledger
            .append(TimelineEvent::new(
                ours,
                IssueStatus::InProgress,
                "Issue assigned to Sam Staff",
                "Alice Admin",
                ActorRole::Admin,
            ))
            .unwrap();

        let entries = ledger.entries_for_issue(ours);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, IssueStatus::InProgress);
        assert_eq!(entries[1].status, IssueStatus::Pending);
        assert!(entries[0].date >= entries[1].date);
    }

    #[test]
    fn from_entries_rejects_index_gaps() {
        let mut ledger = TimelineLedger::new();
        ledger.append(reported(Uuid::new_v4())).unwrap();
        ledger.append(reported(Uuid::new_v4())).unwrap();

        let mut entries = ledger.entries().to_vec();
        entries.remove(0);

        assert!(TimelineLedger::from_entries(entries).is_err());
    }
}
