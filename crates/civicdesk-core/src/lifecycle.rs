use crate::error::CivicError;
use serde::{Deserialize, Serialize};

/// Issue workflow states.
///
/// `Resolved`, `Rejected`, and `Closed` are terminal: once an issue reaches
/// one of them, no further transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
    Closed,
}

impl IssueStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Result<Self, CivicError> {
        Self::from_name(value).ok_or_else(|| CivicError::InvalidStatus(value.to_string()))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected | Self::Closed)
    }
}

/// Issue priority.
///
/// Variant order is load-bearing: `High` is declared before `Normal` so the
/// derived `Ord` (and `ordinal`) sort boosted issues ahead of normal ones in
/// ascending order. String comparison would get this backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

impl Priority {
    pub fn name(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "normal" => Some(Self::Normal),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
        }
    }
}

/// Explicit transition table for the issue workflow.
///
/// `InProgress -> InProgress` is a legal edge so re-assignment can overwrite
/// the staff snapshot without inventing a synthetic status.
pub fn transition_allowed(from: IssueStatus, to: IssueStatus) -> bool {
    use IssueStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress)
            | (Pending, Rejected)
            | (InProgress, InProgress)
            | (InProgress, Resolved)
            | (InProgress, Closed)
            | (InProgress, Rejected)
    )
}

pub fn check_transition(from: IssueStatus, to: IssueStatus) -> Result<(), CivicError> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(CivicError::transition_violation(from.name(), to.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_in_progress_or_rejected() {
        assert!(transition_allowed(IssueStatus::Pending, IssueStatus::InProgress));
        assert!(transition_allowed(IssueStatus::Pending, IssueStatus::Rejected));
        assert!(!transition_allowed(IssueStatus::Pending, IssueStatus::Resolved));
        assert!(!transition_allowed(IssueStatus::Pending, IssueStatus::Closed));
    }

    #[test]
    fn in_progress_resolves_closes_or_rejects() {
        assert!(transition_allowed(IssueStatus::InProgress, IssueStatus::Resolved));
        assert!(transition_allowed(IssueStatus::InProgress, IssueStatus::Closed));
        assert!(transition_allowed(IssueStatus::InProgress, IssueStatus::Rejected));
        assert!(transition_allowed(IssueStatus::InProgress, IssueStatus::InProgress));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for terminal in [IssueStatus::Resolved, IssueStatus::Rejected, IssueStatus::Closed] {
            for to in [
                IssueStatus::Pending,
                IssueStatus::InProgress,
                IssueStatus::Resolved,
                IssueStatus::Rejected,
                IssueStatus::Closed,
            ] {
                assert!(!transition_allowed(terminal, to));
            }
        }
    }

    #[test]
    fn rejected_transition_names_both_states() {
        let err = check_transition(IssueStatus::Resolved, IssueStatus::InProgress).unwrap_err();
        assert!(err.to_string().contains("from 'resolved' to 'in-progress'"));
    }

    #[test]
    fn high_priority_sorts_before_normal() {
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::High.ordinal() < Priority::Normal.ordinal());
    }

    #[test]
    fn status_names_round_trip() {
        for status in [
            IssueStatus::Pending,
            IssueStatus::InProgress,
            IssueStatus::Resolved,
            IssueStatus::Rejected,
            IssueStatus::Closed,
        ] {
            assert_eq!(IssueStatus::from_name(status.name()), Some(status));
        }
        assert!(IssueStatus::parse("escalated").is_err());
    }
}
