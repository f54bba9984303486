//! Task form handling for the terminal user interface.
//!
//! This module provides the `TaskForm` structure used by both the create and
//! the edit screens, the field ordering used for navigation, and the
//! conversion of form state into request payloads.

use chrono::Utc;
use thiserror::Error;

use crate::{
    fields::{Priority, Status, TaskType},
    task::{parse_due_date, CriterionInput, SubtaskInput, Task, TaskPayload},
    tui::{
        input::InputField,
        item_list::{ItemList, Removal},
    },
};

/// Global order constants for task form fields.
pub const NAME_GLOBAL_ORDER: usize = 0;
pub const TASK_DETAILS_GLOBAL_ORDER: usize = 1;
pub const TYPE_GLOBAL_ORDER: usize = 2;
pub const PRIORITY_GLOBAL_ORDER: usize = 3;
pub const PROJECT_GLOBAL_ORDER: usize = 4;
pub const ASSIGNEE_GLOBAL_ORDER: usize = 5;
pub const STATUS_GLOBAL_ORDER: usize = 6;
pub const DESCRIPTION_GLOBAL_ORDER: usize = 7;
pub const BUSINESS_VALUE_GLOBAL_ORDER: usize = 8;
pub const DUE_GLOBAL_ORDER: usize = 9;
pub const CRITERIA_GLOBAL_ORDER: usize = 10;
pub const SUBTASKS_GLOBAL_ORDER: usize = 11;

const FIELD_COUNT: usize = 12;

/// Which nested collection an item operation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Criterion,
    Subtask,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Name is required")]
    MissingName,
    #[error("Invalid due date: {0}")]
    InvalidDueDate(String),
}

/// Task form for creating and editing tasks.
pub struct TaskForm {
    /// Server task id when editing, `None` when creating.
    pub task_id: Option<String>,
    pub name: InputField,
    pub task_details: InputField,
    pub project: InputField,
    pub assignee: InputField,
    pub description: InputField,
    pub business_value: InputField,
    pub due: InputField,
    pub task_type: usize,
    pub priority: usize,
    pub status: usize,
    pub criteria: ItemList,
    pub subtasks: ItemList,
    pub current_field: usize,
    pub task_types: Vec<Option<TaskType>>,
    pub priorities: Vec<Option<Priority>>,
    pub statuses: Vec<Status>,
}

impl TaskForm {
    /// Create an empty form for a new task.
    pub fn new() -> Self {
        let mut form = Self {
            task_id: None,
            name: InputField::new(),
            task_details: InputField::new(),
            project: InputField::new(),
            assignee: InputField::new(),
            description: InputField::new(),
            business_value: InputField::new(),
            due: InputField::new(),
            task_type: 0,
            priority: 0,
            status: 0, // Todo
            criteria: ItemList::new(),
            subtasks: ItemList::new(),
            current_field: NAME_GLOBAL_ORDER,
            task_types: std::iter::once(None).chain(TaskType::ALL.map(Some)).collect(),
            priorities: std::iter::once(None).chain(Priority::ALL.map(Some)).collect(),
            statuses: Status::ALL.to_vec(),
        };
        form.update_active_field();
        form
    }

    /// Create a form populated from an existing task.
    pub fn from_task(task: &Task) -> Self {
        let mut form = Self::new();
        form.task_id = Some(task.task_id.clone());
        form.name = InputField::with_value(&task.name);
        form.task_details = InputField::with_value(task.task_details.as_deref().unwrap_or_default());
        form.project = InputField::with_value(task.project.as_deref().unwrap_or_default());
        form.assignee = InputField::with_value(task.task_assignee.as_deref().unwrap_or_default());
        form.description = InputField::with_value(task.description.as_deref().unwrap_or_default());
        form.business_value =
            InputField::with_value(task.business_value.as_deref().unwrap_or_default());
        form.due = InputField::with_value(
            &task
                .task_due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
        form.task_type = form.task_types.iter().position(|&t| t == task.task_type).unwrap_or(0);
        form.priority = form.priorities.iter().position(|&p| p == task.task_priority).unwrap_or(0);
        form.status = form.statuses.iter().position(|&s| s == task.status).unwrap_or(0);
        form.criteria = ItemList::from_persisted(
            task.acceptance_criteria
                .iter()
                .map(|c| (c.criteria_id.clone(), c.value.clone())),
        );
        form.subtasks = ItemList::from_persisted(
            task.subtasks.iter().map(|s| (s.subtask_id.clone(), s.value.clone())),
        );
        form.update_active_field();
        form
    }

    pub fn is_edit(&self) -> bool {
        self.task_id.is_some()
    }

    fn text_field_mut(&mut self, order: usize) -> Option<&mut InputField> {
        match order {
            NAME_GLOBAL_ORDER => Some(&mut self.name),
            TASK_DETAILS_GLOBAL_ORDER => Some(&mut self.task_details),
            PROJECT_GLOBAL_ORDER => Some(&mut self.project),
            ASSIGNEE_GLOBAL_ORDER => Some(&mut self.assignee),
            DESCRIPTION_GLOBAL_ORDER => Some(&mut self.description),
            BUSINESS_VALUE_GLOBAL_ORDER => Some(&mut self.business_value),
            DUE_GLOBAL_ORDER => Some(&mut self.due),
            _ => None,
        }
    }

    /// The input receiving keystrokes: a text field, or the focused pending list entry.
    fn active_input_mut(&mut self) -> Option<&mut InputField> {
        match self.current_field {
            CRITERIA_GLOBAL_ORDER => self.criteria.selected_text_mut(),
            SUBTASKS_GLOBAL_ORDER => self.subtasks.selected_text_mut(),
            order => self.text_field_mut(order),
        }
    }

    /// The list under focus, if the focused field is one.
    pub fn current_list(&self) -> Option<(ItemKind, &ItemList)> {
        match self.current_field {
            CRITERIA_GLOBAL_ORDER => Some((ItemKind::Criterion, &self.criteria)),
            SUBTASKS_GLOBAL_ORDER => Some((ItemKind::Subtask, &self.subtasks)),
            _ => None,
        }
    }

    fn current_list_mut(&mut self) -> Option<(ItemKind, &mut ItemList)> {
        match self.current_field {
            CRITERIA_GLOBAL_ORDER => Some((ItemKind::Criterion, &mut self.criteria)),
            SUBTASKS_GLOBAL_ORDER => Some((ItemKind::Subtask, &mut self.subtasks)),
            _ => None,
        }
    }

    pub fn field_count(&self) -> usize {
        FIELD_COUNT
    }

    /// Move to the next field in the form.
    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % self.field_count();
        self.update_active_field();
    }

    /// Move to the previous field in the form.
    pub fn prev_field(&mut self) {
        self.current_field = if self.current_field == 0 {
            self.field_count() - 1
        } else {
            self.current_field - 1
        };
        self.update_active_field();
    }

    /// Update which text field is currently active for editing.
    pub fn update_active_field(&mut self) {
        for order in 0..FIELD_COUNT {
            if let Some(field) = self.text_field_mut(order) {
                field.active = false;
            }
        }
        let current = self.current_field;
        if let Some(field) = self.text_field_mut(current) {
            field.active = true;
        }
    }

    /// Handle character input for the currently active field.
    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.active_input_mut() {
            field.handle_char(c);
        }
    }

    /// Handle backspace input for the currently active field.
    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.active_input_mut() {
            field.handle_backspace();
        }
    }

    pub fn handle_delete(&mut self) {
        if let Some(field) = self.active_input_mut() {
            field.handle_delete();
        }
    }

    /// Handle left/right arrow keys for cursor movement or selector changes.
    pub fn handle_left_right(&mut self, right: bool) {
        match self.current_field {
            TYPE_GLOBAL_ORDER => self.task_type = step(self.task_type, self.task_types.len(), right),
            PRIORITY_GLOBAL_ORDER => {
                self.priority = step(self.priority, self.priorities.len(), right)
            }
            STATUS_GLOBAL_ORDER => self.status = step(self.status, self.statuses.len(), right),
            _ => {
                if let Some(field) = self.active_input_mut() {
                    if right {
                        field.move_cursor_right()
                    } else {
                        field.move_cursor_left()
                    }
                }
            }
        }
    }

    /// Move the focus inside a list field. Returns false when nothing moved.
    pub fn handle_up_down(&mut self, down: bool) -> bool {
        match self.current_list_mut() {
            Some((_, list)) if down => list.select_next(),
            Some((_, list)) => list.select_prev(),
            None => false,
        }
    }

    /// Add a blank pending entry to the focused list, or to the criteria when no list has focus.
    pub fn add_item(&mut self, now_ms: u64) -> ItemKind {
        if self.current_list().is_none() {
            self.current_field = CRITERIA_GLOBAL_ORDER;
            self.update_active_field();
        }
        match self.current_list_mut() {
            Some((kind, list)) => {
                list.add_pending(now_ms);
                kind
            }
            None => ItemKind::Criterion,
        }
    }

    /// Remove the focused entry of the focused list.
    ///
    /// A `Removal::Remote` leaves the entry in place: the caller deletes it on
    /// the server, then calls `forget_item`.
    pub fn remove_item(&mut self) -> Option<(ItemKind, Removal)> {
        let (kind, list) = self.current_list_mut()?;
        list.remove_selected().map(|removal| (kind, removal))
    }

    pub fn forget_item(&mut self, kind: ItemKind, server_id: &str) {
        match kind {
            ItemKind::Criterion => self.criteria.forget(server_id),
            ItemKind::Subtask => self.subtasks.forget(server_id),
        }
    }

    /// Throw away entries added in this session.
    pub fn discard_pending(&mut self) {
        self.criteria.discard_pending();
        self.subtasks.discard_pending();
    }

    pub fn has_pending(&self) -> bool {
        self.criteria.has_pending() || self.subtasks.has_pending()
    }

    pub fn selected_task_type(&self) -> Option<TaskType> {
        self.task_types.get(self.task_type).copied().flatten()
    }

    pub fn selected_priority(&self) -> Option<Priority> {
        self.priorities.get(self.priority).copied().flatten()
    }

    pub fn selected_status(&self) -> Status {
        self.statuses.get(self.status).copied().unwrap_or_default()
    }

    fn checked_name(&self) -> Result<String, FormError> {
        self.name.non_blank().ok_or(FormError::MissingName)
    }

    fn checked_due(&self) -> Result<Option<chrono::DateTime<Utc>>, FormError> {
        parse_due_date(&self.due.value).map_err(FormError::InvalidDueDate)
    }

    fn criteria_inputs(&self) -> Vec<CriterionInput> {
        self.criteria
            .submitted_values()
            .into_iter()
            .map(|(criteria_id, value)| CriterionInput { criteria_id, value })
            .collect()
    }

    fn subtask_inputs(&self) -> Vec<SubtaskInput> {
        self.subtasks
            .submitted_values()
            .into_iter()
            .map(|(subtask_id, value)| SubtaskInput { subtask_id, value })
            .collect()
    }

    /// Payload for creating a task. Blank optional fields and blank list entries are left out.
    pub fn to_create_payload(&self) -> Result<TaskPayload, FormError> {
        let name = self.checked_name()?;
        let due = self.checked_due()?;
        let present = |f: &InputField| f.non_blank().map(Some);
        Ok(TaskPayload {
            name: Some(name),
            task_details: present(&self.task_details),
            task_type: self.selected_task_type().map(Some),
            task_priority: self.selected_priority().map(Some),
            project: present(&self.project),
            task_assignee: present(&self.assignee),
            status: Some(self.selected_status()),
            description: present(&self.description),
            business_value: present(&self.business_value),
            task_due_date: due.map(Some),
            acceptance_criteria: Some(self.criteria_inputs()),
            subtasks: Some(self.subtask_inputs()),
        })
    }

    /// Payload for saving an edit.
    ///
    /// Every top-level field is sent, blanks as `null`. The nested collections
    /// are only sent when this session added entries; saved entries keep their ids.
    pub fn to_update_payload(&self) -> Result<TaskPayload, FormError> {
        let name = self.checked_name()?;
        let due = self.checked_due()?;
        let (acceptance_criteria, subtasks) = if self.has_pending() {
            (Some(self.criteria_inputs()), Some(self.subtask_inputs()))
        } else {
            (None, None)
        };
        Ok(TaskPayload {
            name: Some(name),
            task_details: Some(self.task_details.non_blank()),
            task_type: Some(self.selected_task_type()),
            task_priority: Some(self.selected_priority()),
            project: Some(self.project.non_blank()),
            task_assignee: Some(self.assignee.non_blank()),
            status: Some(self.selected_status()),
            description: Some(self.description.non_blank()),
            business_value: Some(self.business_value.non_blank()),
            task_due_date: Some(due),
            acceptance_criteria,
            subtasks,
        })
    }
}

impl Default for TaskForm {
    fn default() -> Self {
        Self::new()
    }
}

fn step(idx: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (idx + 1) % len
    } else if idx == 0 {
        len - 1
    } else {
        idx - 1
    }
}
