//! Enumerations for TUI state management.

/// Application state for the terminal user interface.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AppState {
    TaskList,
    TaskDetail,
    AddTask,
    EditTask,
    Help,
    Confirm,
    /// Blocking error message; any key dismisses it and returns to the previous screen.
    Alert,
}

/// Destructive action waiting for a yes/no answer.
#[derive(Clone, PartialEq, Debug)]
pub enum ConfirmAction {
    DeleteTask { task_id: String, name: String },
}

impl ConfirmAction {
    /// Question shown in the confirmation dialog.
    pub fn prompt(&self) -> String {
        match self {
            ConfirmAction::DeleteTask { name, .. } => format!("Delete task '{name}'"),
        }
    }
}
