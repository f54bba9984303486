//! Enumerations and field types for task records.
//!
//! This module defines the fixed value sets a task may carry: its type,
//! priority and workflow status. The serialized names are the wire names
//! used by the API, so renaming a variant is a breaking change.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What kind of work a task represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum TaskType {
    Bug,
    Feature,
    Enhancement,
    Research,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Bug,
        TaskType::Feature,
        TaskType::Enhancement,
        TaskType::Research,
    ];
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

/// Workflow status. New tasks start as `Todo`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    Review,
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Review, Status::Done];
}

/// Format a task type for display.
pub fn format_task_type(t: Option<TaskType>) -> &'static str {
    match t {
        Some(TaskType::Bug) => "Bug",
        Some(TaskType::Feature) => "Feature",
        Some(TaskType::Enhancement) => "Enhancement",
        Some(TaskType::Research) => "Research",
        None => "-",
    }
}

/// Format a priority for display.
pub fn format_priority(p: Option<Priority>) -> &'static str {
    match p {
        Some(Priority::Low) => "Low",
        Some(Priority::Medium) => "Medium",
        Some(Priority::High) => "High",
        Some(Priority::Critical) => "Critical",
        None => "-",
    }
}

/// Format a status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "Todo",
        Status::InProgress => "In Progress",
        Status::Review => "Review",
        Status::Done => "Done",
    }
}

/// Shorten `s` to at most `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"In Progress\"");
        assert_eq!(serde_json::from_str::<Status>("\"Review\"").unwrap(), Status::Review);
        assert!(serde_json::from_str::<Status>("\"in-progress\"").is_err());
    }

    #[test]
    fn test_default_status_is_todo() {
        assert_eq!(Status::default(), Status::Todo);
    }

    #[test]
    fn test_enums_reject_unknown_values() {
        assert!(serde_json::from_str::<TaskType>("\"Chore\"").is_err());
        assert!(serde_json::from_str::<Priority>("\"urgent\"").is_err());
    }

    #[test]
    fn test_display_names_match_wire_names() {
        for s in Status::ALL {
            let wire = serde_json::to_string(&s).unwrap();
            assert_eq!(wire.trim_matches('"'), format_status(s));
        }
        for p in Priority::ALL {
            let wire = serde_json::to_string(&p).unwrap();
            assert_eq!(wire.trim_matches('"'), format_priority(Some(p)));
        }
        for t in TaskType::ALL {
            let wire = serde_json::to_string(&t).unwrap();
            assert_eq!(wire.trim_matches('"'), format_task_type(Some(t)));
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name", 10), "a much ...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
