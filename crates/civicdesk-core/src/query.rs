use crate::lifecycle::IssueStatus;
use crate::types::Issue;
use serde::{Deserialize, Serialize};

/// Filters applied to the issue listing. All active filters must match.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub status: Option<IssueStatus>,
    pub category: Option<String>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(search) = &self.search {
            if !issue
                .title
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        if let Some(status) = self.status {
            if issue.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &issue.category != category {
                return false;
            }
        }
        true
    }
}

/// 1-based pagination request. Page and limit are clamped to at least 1.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// One page of results plus the total match count, so clients can compute
/// page counts without a second request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Triage ordering: boosted issues first (priority ordinal ascending), then
/// newest first. This is what puts boosted and fresh issues at the top of
/// the staff queue.
pub fn triage_sort(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.priority
            .ordinal()
            .cmp(&b.priority.ordinal())
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// Slice one page out of the already filtered and sorted set.
pub fn paginate(issues: Vec<Issue>, page: PageRequest) -> Paged<Issue> {
    let total = issues.len() as u64;
    let offset = page.page.saturating_sub(1).saturating_mul(page.limit);
    let items = issues
        .into_iter()
        .skip(offset as usize)
        .take(page.limit as usize)
        .collect();

    Paged {
        items,
        total,
        page: page.page,
        limit: page.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Priority;
    use crate::types::ReporterRef;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn issue(title: &str, category: &str, priority: Priority, age_minutes: i64) -> Issue {
        Issue {
            id: Uuid::new_v4(),
            reporter: ReporterRef::new("Ada Citizen", "ada@example.org"),
            title: title.to_string(),
            description: String::new(),
            category: category.to_string(),
            location: "downtown".to_string(),
            photo: None,
            status: IssueStatus::Pending,
            priority,
            upvotes: 0,
            upvoted_by: BTreeSet::new(),
            assigned_staff: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let filter = IssueFilter {
            search: Some("pothole".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&issue("Giant POTHOLE on Elm", "roads", Priority::Normal, 0)));
        assert!(!filter.matches(&issue("Broken streetlight", "lighting", Priority::Normal, 0)));
    }

    #[test]
    fn boosted_issues_surface_before_newer_normal_ones() {
        let mut issues = vec![
            issue("newest normal", "roads", Priority::Normal, 1),
            issue("old boosted", "roads", Priority::High, 600),
            issue("older normal", "roads", Priority::Normal, 60),
        ];
        triage_sort(&mut issues);

        assert_eq!(issues[0].title, "old boosted");
        assert_eq!(issues[1].title, "newest normal");
        assert_eq!(issues[2].title, "older normal");
    }

    #[test]
    fn total_reflects_all_matches_regardless_of_page() {
        let issues: Vec<Issue> = (0..25)
            .map(|i| issue(&format!("issue {i}"), "roads", Priority::Normal, i))
            .collect();

        let page = paginate(issues.clone(), PageRequest::new(2, 10));
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);

        let page = paginate(issues, PageRequest::new(9, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 25);
    }
}
