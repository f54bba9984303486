//! Task data structure and related functionality.
//!
//! This module defines the persisted `Task` document with its nested
//! acceptance criteria and subtasks, the `TaskPayload` accepted by create and
//! update requests, and the field rules both of them are checked against.
//! Field names serialize in camelCase because they are the API's wire format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::fields::*;

/// A stored work item.
///
/// `task_id` is the public identifier used in every lookup. `row_id` is the
/// store's own document key and is never used to address a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub row_id: String,
    pub task_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_assignee: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_value: Option<String>,
    #[serde(
        default,
        deserialize_with = "due_date::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A text requirement attached to a task. Ids are unique only within the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceCriterion {
    pub criteria_id: String,
    pub value: String,
}

/// A text sub-item attached to a task. Ids are unique only within the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub subtask_id: String,
    pub value: String,
}

/// A criterion as sent by a client. The id is generated when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_id: Option<String>,
    #[serde(default)]
    pub value: String,
}

/// A subtask as sent by a client. The id is generated when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask_id: Option<String>,
    #[serde(default)]
    pub value: String,
}

/// Request body for create and full update.
///
/// Every field is optional on the wire. For updates an absent field leaves the
/// stored value alone, while an explicit `null` clears an optional field; the
/// double `Option` keeps those two cases apart. `name` and `status` cannot be
/// cleared, so a `null` there fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    #[serde(default, deserialize_with = "non_null_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub task_details: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<Option<TaskType>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<Option<Priority>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub project: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub task_assignee: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub business_value: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable_due_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<CriterionInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<SubtaskInput>>,
}

/// A field rule a task document failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task validation failed: {0}: Path `{0}` is required.")]
    Required(String),
    #[error("Task validation failed: {0}: `null` is not a valid enum value for path `{0}`.")]
    NullEnum(String),
}

/// Generate a fresh identifier for a task or nested item.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl From<CriterionInput> for AcceptanceCriterion {
    fn from(input: CriterionInput) -> Self {
        AcceptanceCriterion {
            criteria_id: input
                .criteria_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_id),
            value: input.value,
        }
    }
}

impl From<SubtaskInput> for Subtask {
    fn from(input: SubtaskInput) -> Self {
        Subtask {
            subtask_id: input
                .subtask_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_id),
            value: input.value,
        }
    }
}

impl Task {
    /// Build a new task from a create payload.
    ///
    /// Assigns a fresh `task_id`, defaults the status, stamps both timestamps
    /// and checks the field rules. Nothing is built if a rule fails.
    pub fn from_payload(
        row_id: String,
        payload: TaskPayload,
        now: DateTime<Utc>,
    ) -> Result<Task, ValidationError> {
        let mut task = Task {
            row_id,
            task_id: new_id(),
            name: payload.name.unwrap_or_default(),
            task_details: payload.task_details.flatten(),
            task_type: payload.task_type.flatten(),
            task_priority: payload.task_priority.flatten(),
            project: payload.project.flatten(),
            task_assignee: payload.task_assignee.flatten(),
            status: payload.status.unwrap_or_default(),
            description: payload.description.flatten(),
            business_value: payload.business_value.flatten(),
            task_due_date: payload.task_due_date.flatten(),
            acceptance_criteria: payload
                .acceptance_criteria
                .unwrap_or_default()
                .into_iter()
                .map(AcceptanceCriterion::from)
                .collect(),
            subtasks: payload
                .subtasks
                .unwrap_or_default()
                .into_iter()
                .map(Subtask::from)
                .collect(),
            created_at: now,
            updated_at: now,
        };
        task.normalise();
        task.validate()?;
        Ok(task)
    }

    /// Return a copy of this task with the payload's fields written over it.
    ///
    /// Identity and `created_at` never change. Nested collections are replaced
    /// wholesale only when the payload carries them. The result is validated
    /// before it is returned, so a failing update leaves `self` untouched.
    pub fn updated_with(
        &self,
        payload: TaskPayload,
        now: DateTime<Utc>,
    ) -> Result<Task, ValidationError> {
        let mut task = self.clone();
        if let Some(name) = payload.name {
            task.name = name;
        }
        if let Some(v) = payload.task_details {
            task.task_details = v;
        }
        if let Some(v) = payload.task_type {
            task.task_type = v;
        }
        if let Some(v) = payload.task_priority {
            task.task_priority = v;
        }
        if let Some(v) = payload.project {
            task.project = v;
        }
        if let Some(v) = payload.task_assignee {
            task.task_assignee = v;
        }
        if let Some(v) = payload.status {
            task.status = v;
        }
        if let Some(v) = payload.description {
            task.description = v;
        }
        if let Some(v) = payload.business_value {
            task.business_value = v;
        }
        if let Some(v) = payload.task_due_date {
            task.task_due_date = v;
        }
        if let Some(items) = payload.acceptance_criteria {
            task.acceptance_criteria = items.into_iter().map(AcceptanceCriterion::from).collect();
        }
        if let Some(items) = payload.subtasks {
            task.subtasks = items.into_iter().map(Subtask::from).collect();
        }
        task.updated_at = now;
        task.normalise();
        task.validate()?;
        Ok(task)
    }

    /// Remove every criterion with the given id. Returns whether anything was removed.
    pub fn pull_criterion(&mut self, criteria_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.acceptance_criteria.len();
        self.acceptance_criteria.retain(|c| c.criteria_id != criteria_id);
        let removed = self.acceptance_criteria.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Remove every subtask with the given id. Returns whether anything was removed.
    pub fn pull_subtask(&mut self, subtask_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.subtasks.len();
        self.subtasks.retain(|s| s.subtask_id != subtask_id);
        let removed = self.subtasks.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Check the field rules: a non-blank name and non-blank nested values.
    /// Enumerated fields are already constrained by their types.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name".into()));
        }
        for (i, c) in self.acceptance_criteria.iter().enumerate() {
            if c.value.trim().is_empty() {
                return Err(ValidationError::Required(format!("acceptanceCriteria.{i}.value")));
            }
        }
        for (i, s) in self.subtasks.iter().enumerate() {
            if s.value.trim().is_empty() {
                return Err(ValidationError::Required(format!("subtasks.{i}.value")));
            }
        }
        Ok(())
    }

    fn normalise(&mut self) {
        self.name = self.name.trim().to_string();
        if let Some(details) = self.task_details.as_mut() {
            *details = details.trim().to_string();
        }
    }
}

/// Parse a due date given either as RFC 3339 or as a bare `YYYY-MM-DD`,
/// which is taken as midnight UTC. Blank input means no due date.
pub fn parse_due_date(s: &str) -> Result<Option<DateTime<Utc>>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| Some(d.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| format!("Cast to date failed for value \"{s}\" at path \"taskDueDate\""))
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A present `null` where only a value or absence is accepted.
fn reject_null<'de, D, T>(deserializer: D, err: ValidationError) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<T>::deserialize(deserializer)? {
        Some(value) => Ok(Some(value)),
        None => Err(de::Error::custom(err)),
    }
}

fn non_null_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    reject_null(deserializer, ValidationError::Required("name".into()))
}

fn non_null_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    reject_null(deserializer, ValidationError::NullEnum("status".into()))
}

fn nullable_due_date<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    due_date::deserialize(deserializer).map(Some)
}

mod due_date {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse_due_date(&raw).map_err(de::Error::custom),
        }
    }
}
