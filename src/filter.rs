//! Client-side task filtering.
//!
//! Filters run over the last fetched task list only; nothing here talks to
//! the server. All active criteria must match (logical AND).

use std::collections::BTreeSet;

use crate::fields::{Status, TaskType};
use crate::task::Task;

/// Search text plus exact-match filters. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub search: String,
    pub project: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<Status>,
    pub task_type: Option<TaskType>,
}

impl TaskFilter {
    /// Whether the task passes every active criterion.
    ///
    /// Search is a case-insensitive substring match against the name or the
    /// description; an empty search matches everything.
    pub fn matches(&self, task: &Task) -> bool {
        let needle = self.search.to_lowercase();
        let matches_search = task.name.to_lowercase().contains(&needle)
            || task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));

        matches_search
            && self.project.as_ref().map_or(true, |p| task.project.as_ref() == Some(p))
            && self.assignee.as_ref().map_or(true, |a| task.task_assignee.as_ref() == Some(a))
            && self.status.map_or(true, |s| task.status == s)
            && self.task_type.map_or(true, |t| task.task_type == Some(t))
    }

    /// Tasks passing the filter, in their original order.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskFilter::default()
    }

    pub fn clear(&mut self) {
        *self = TaskFilter::default();
    }

    /// One-line summary for status bars.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.search.is_empty() {
            parts.push(format!("search '{}'", self.search));
        }
        if let Some(p) = &self.project {
            parts.push(format!("project={p}"));
        }
        if let Some(a) = &self.assignee {
            parts.push(format!("assignee={a}"));
        }
        if let Some(s) = self.status {
            parts.push(format!("status={}", crate::fields::format_status(s)));
        }
        if let Some(t) = self.task_type {
            parts.push(format!("type={}", crate::fields::format_task_type(Some(t))));
        }
        if parts.is_empty() {
            "no filters".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Distinct non-empty project labels, sorted.
pub fn distinct_projects(tasks: &[Task]) -> Vec<String> {
    distinct(tasks.iter().filter_map(|t| t.project.as_deref()))
}

/// Distinct non-empty assignee labels, sorted.
pub fn distinct_assignees(tasks: &[Task]) -> Vec<String> {
    distinct(tasks.iter().filter_map(|t| t.task_assignee.as_deref()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Step to the next value of an "all or one of" selector.
///
/// `None` (all) is followed by the first choice, the last choice wraps back
/// to `None`. A current value that is no longer among the choices resets to `None`.
pub fn cycle<T: Clone + PartialEq>(current: &Option<T>, choices: &[T]) -> Option<T> {
    match current {
        None => choices.first().cloned(),
        Some(value) => {
            let idx = choices.iter().position(|c| c == value)?;
            choices.get(idx + 1).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPayload;
    use chrono::Utc;

    fn task(name: &str, description: Option<&str>, project: Option<&str>, assignee: Option<&str>) -> Task {
        let payload = TaskPayload {
            name: Some(name.into()),
            description: Some(description.map(String::from)),
            project: Some(project.map(String::from)),
            task_assignee: Some(assignee.map(String::from)),
            ..Default::default()
        };
        Task::from_payload("row".into(), payload, Utc::now()).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let tasks = vec![task("a", None, None, None), task("b", Some("x"), Some("p"), Some("q"))];
        assert_eq!(TaskFilter::default().apply(&tasks).len(), 2);
        assert!(TaskFilter::default().is_empty());
    }

    #[test]
    fn test_search_covers_name_and_description() {
        let tasks = vec![
            task("Fix Login", None, None, None),
            task("Refactor", Some("touches the LOGIN page"), None, None),
            task("Docs", Some("readme"), None, None),
        ];
        let filter = TaskFilter { search: "login".into(), ..Default::default() };
        let names: Vec<&str> = filter.apply(&tasks).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Fix Login", "Refactor"]);
    }

    #[test]
    fn test_exact_filters_are_anded() {
        let mut a = task("a", None, Some("Mobile App"), Some("John Doe"));
        a.status = Status::Review;
        a.task_type = Some(TaskType::Bug);
        let mut b = task("b", None, Some("Mobile App"), Some("Mike Johnson"));
        b.status = Status::Review;
        b.task_type = Some(TaskType::Bug);
        let c = task("c", None, Some("Mobile"), Some("John Doe"));
        let tasks = vec![a, b, c];

        let filter = TaskFilter {
            project: Some("Mobile App".into()),
            assignee: Some("John Doe".into()),
            status: Some(Status::Review),
            task_type: Some(TaskType::Bug),
            ..Default::default()
        };
        let hits = filter.apply(&tasks);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a");

        let only_type = TaskFilter { task_type: Some(TaskType::Feature), ..Default::default() };
        assert!(only_type.apply(&tasks).is_empty());
    }

    #[test]
    fn test_distinct_values_are_sorted_and_unique() {
        let tasks = vec![
            task("a", None, Some("Mobile App"), Some("Sam")),
            task("b", None, Some("Analytics"), None),
            task("c", None, Some("Mobile App"), Some(" ")),
        ];
        assert_eq!(distinct_projects(&tasks), vec!["Analytics", "Mobile App"]);
        assert_eq!(distinct_assignees(&tasks), vec!["Sam"]);
    }

    #[test]
    fn test_cycle_wraps_through_all() {
        let choices = ["x", "y"];
        assert_eq!(cycle(&None, &choices), Some("x"));
        assert_eq!(cycle(&Some("x"), &choices), Some("y"));
        assert_eq!(cycle(&Some("y"), &choices), None);
        assert_eq!(cycle(&Some("gone"), &choices), None);
        assert_eq!(cycle::<&str>(&None, &[]), None);
    }

    #[test]
    fn test_describe_and_clear() {
        let mut filter = TaskFilter { search: "api".into(), status: Some(Status::InProgress), ..Default::default() };
        assert_eq!(filter.describe(), "search 'api', status=In Progress");
        filter.clear();
        assert_eq!(filter.describe(), "no filters");
    }
}
