//! Command implementations for the CLI interface.
//!
//! This module contains the command handlers behind each subcommand: the
//! API server, the terminal UI, and one-shot commands that call the task API
//! and print the result.

use std::fmt::Display;

use clap::{Args, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use crate::client::{ApiClient, ClientError};
use crate::fields::*;
use crate::filter::TaskFilter;
use crate::server::{self, ServerConfig};
use crate::task::{parse_due_date, CriterionInput, SubtaskInput, Task, TaskPayload};
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the task API server.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
        /// Document store location: file://<path> or memory://
        #[arg(long, env = "STORE_URL", default_value = "file://tasks.json")]
        store_url: String,
    },

    /// Launch the interactive UI interface.
    Ui,

    /// Add a new task.
    Add {
        /// Task name.
        name: String,
        #[command(flatten)]
        fields: TaskFields,
    },

    /// List tasks, filtered locally like the UI does.
    List {
        /// Case-insensitive text to find in name or description.
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
    },

    /// View one task in detail.
    View {
        /// Task ID or exact task name.
        id: String,
    },

    /// Update fields on a task. Only the flags given are sent.
    Update {
        /// Task ID or exact task name.
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: TaskFields,
        /// Clear an optional field.
        #[arg(long, value_enum)]
        clear: Vec<ClearField>,
    },

    /// Delete a task.
    Delete {
        /// Task ID or exact task name.
        id: String,
    },

    /// Remove one acceptance criterion from a task.
    RmCriterion { task_id: String, criteria_id: String },

    /// Remove one subtask from a task.
    RmSubtask { task_id: String, subtask_id: String },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Task fields shared by `add` and `update`.
#[derive(Args, Debug, Default, Clone)]
pub struct TaskFields {
    #[arg(long)]
    pub details: Option<String>,
    #[arg(long = "type", value_enum)]
    pub task_type: Option<TaskType>,
    #[arg(long, value_enum)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<Status>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub business_value: Option<String>,
    /// Due date, YYYY-MM-DD or RFC 3339.
    #[arg(long)]
    pub due: Option<String>,
    /// Acceptance criterion (repeatable). On update, replaces all criteria.
    #[arg(long = "criterion")]
    pub criteria: Vec<String>,
    /// Subtask (repeatable). On update, replaces all subtasks.
    #[arg(long = "subtask")]
    pub subtasks: Vec<String>,
}

/// Optional fields that `update --clear` can reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClearField {
    Details,
    Type,
    Priority,
    Project,
    Assignee,
    Description,
    BusinessValue,
    Due,
}

/// Print an error and exit with status 1.
fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

/// Copy the given flags into `payload`. Blank text and blank entries are skipped.
pub fn apply_fields(fields: TaskFields, payload: &mut TaskPayload) -> Result<(), String> {
    let present = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Some)
    };
    if let Some(details) = present(fields.details) {
        payload.task_details = Some(details);
    }
    if let Some(t) = fields.task_type {
        payload.task_type = Some(Some(t));
    }
    if let Some(p) = fields.priority {
        payload.task_priority = Some(Some(p));
    }
    if let Some(project) = present(fields.project) {
        payload.project = Some(project);
    }
    if let Some(assignee) = present(fields.assignee) {
        payload.task_assignee = Some(assignee);
    }
    if let Some(s) = fields.status {
        payload.status = Some(s);
    }
    if let Some(description) = present(fields.description) {
        payload.description = Some(description);
    }
    if let Some(value) = present(fields.business_value) {
        payload.business_value = Some(value);
    }
    if let Some(due) = fields.due {
        if let Some(date) = parse_due_date(&due).map_err(|e| format!("invalid --due: {e}"))? {
            payload.task_due_date = Some(Some(date));
        }
    }
    let criteria: Vec<CriterionInput> = fields
        .criteria
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .map(|value| CriterionInput { criteria_id: None, value })
        .collect();
    if !criteria.is_empty() {
        payload.acceptance_criteria = Some(criteria);
    }
    let subtasks: Vec<SubtaskInput> = fields
        .subtasks
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .map(|value| SubtaskInput { subtask_id: None, value })
        .collect();
    if !subtasks.is_empty() {
        payload.subtasks = Some(subtasks);
    }
    Ok(())
}

fn apply_clears(clear: &[ClearField], payload: &mut TaskPayload) {
    for field in clear {
        match field {
            ClearField::Details => payload.task_details = Some(None),
            ClearField::Type => payload.task_type = Some(None),
            ClearField::Priority => payload.task_priority = Some(None),
            ClearField::Project => payload.project = Some(None),
            ClearField::Assignee => payload.task_assignee = Some(None),
            ClearField::Description => payload.description = Some(None),
            ClearField::BusinessValue => payload.business_value = Some(None),
            ClearField::Due => payload.task_due_date = Some(None),
        }
    }
}

/// Find a task by its task ID, falling back to a case-insensitive exact name match.
pub fn resolve_task(client: &ApiClient, ident: &str) -> Result<Task, String> {
    match client.get_task(ident) {
        Ok(task) => return Ok(task),
        Err(e) if !e.is_not_found() => return Err(e.to_string()),
        Err(_) => {}
    }
    let tasks = client.list_tasks().map_err(|e| e.to_string())?;
    let mut matches = tasks
        .into_iter()
        .filter(|t| t.name.eq_ignore_ascii_case(ident.trim()));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task),
        (Some(_), Some(_)) => Err(format!("'{ident}' matches more than one task; use the task ID")),
        (None, _) => Err(format!("no task with ID or name '{ident}'")),
    }
}

/// Run the API server until Ctrl-C.
pub fn cmd_serve(config: ServerConfig) {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => fail("Failed to start runtime", e),
    };
    if let Err(e) = runtime.block_on(server::run(config)) {
        fail("Server error", e);
    }
}

pub fn cmd_ui(client: ApiClient) {
    if let Err(e) = run_tui(client) {
        fail("UI error", e);
    }
}

/// Create a task and print it.
pub fn cmd_add(client: &ApiClient, name: String, fields: TaskFields) {
    let mut payload = TaskPayload {
        name: Some(name),
        ..Default::default()
    };
    if let Err(e) = apply_fields(fields, &mut payload) {
        fail("Error", e);
    }
    match client.create_task(&payload) {
        Ok(task) => {
            println!("Task created successfully: {}", task.task_id);
            print_task_detail(&task);
        }
        Err(e) => fail("Failed to create task", e),
    }
}

/// List tasks matching the filter flags.
pub fn cmd_list(client: &ApiClient, filter: TaskFilter) {
    let tasks = match client.list_tasks() {
        Ok(tasks) => tasks,
        Err(e) => fail("Failed to fetch tasks", e),
    };
    let shown = filter.apply(&tasks);
    print_table(&shown);
    if !filter.is_empty() {
        println!("\n{} of {} tasks ({})", shown.len(), tasks.len(), filter.describe());
    }
}

pub fn cmd_view(client: &ApiClient, id: String) {
    match resolve_task(client, &id) {
        Ok(task) => print_task_detail(&task),
        Err(e) => fail("Failed to fetch task", e),
    }
}

/// Update a task with only the flags given.
pub fn cmd_update(
    client: &ApiClient,
    id: String,
    name: Option<String>,
    fields: TaskFields,
    clear: Vec<ClearField>,
) {
    let mut payload = TaskPayload {
        name,
        ..Default::default()
    };
    if let Err(e) = apply_fields(fields, &mut payload) {
        fail("Error", e);
    }
    apply_clears(&clear, &mut payload);
    if payload == TaskPayload::default() {
        fail("Error", "nothing to update; pass at least one field flag");
    }

    let task = match resolve_task(client, &id) {
        Ok(task) => task,
        Err(e) => fail("Failed to update task", e),
    };
    match client.update_task(&task.task_id, &payload) {
        Ok(task) => {
            println!("Task updated successfully");
            print_task_detail(&task);
        }
        Err(e) => fail("Failed to update task", e),
    }
}

pub fn cmd_delete(client: &ApiClient, id: String) {
    let task = match resolve_task(client, &id) {
        Ok(task) => task,
        Err(e) => fail("Failed to delete task", e),
    };
    match client.delete_task(&task.task_id) {
        Ok(task) => println!("Task deleted successfully: {} ({})", task.name, task.task_id),
        Err(e) => fail("Failed to delete task", e),
    }
}

pub fn cmd_rm_criterion(client: &ApiClient, task_id: String, criteria_id: String) {
    report_item_removal(
        client.delete_criterion(&task_id, &criteria_id),
        "Acceptance criteria deleted successfully",
        "Failed to delete acceptance criteria",
    );
}

pub fn cmd_rm_subtask(client: &ApiClient, task_id: String, subtask_id: String) {
    report_item_removal(
        client.delete_subtask(&task_id, &subtask_id),
        "Subtask deleted successfully",
        "Failed to delete subtask",
    );
}

fn report_item_removal(result: Result<Task, ClientError>, ok: &str, failed: &str) {
    match result {
        Ok(task) => {
            println!("{ok}");
            print_task_detail(&task);
        }
        Err(e) => fail(failed, e),
    }
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Render tasks as a fixed-width table.
pub fn format_table(tasks: &[&Task]) -> String {
    let mut out = format!(
        "{:<36} {:<30} {:<11} {:<8} {:<11} {:<14} {:<14} {}\n",
        "Task ID", "Name", "Type", "Priority", "Status", "Project", "Assignee", "Due"
    );
    for t in tasks {
        out.push_str(&format!(
            "{:<36} {:<30} {:<11} {:<8} {:<11} {:<14} {:<14} {}\n",
            t.task_id,
            truncate(&t.name, 30),
            format_task_type(t.task_type),
            format_priority(t.task_priority),
            format_status(t.status),
            truncate(t.project.as_deref().unwrap_or("-"), 14),
            truncate(t.task_assignee.as_deref().unwrap_or("-"), 14),
            t.task_due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".into()),
        ));
    }
    if tasks.is_empty() {
        out.push_str("No tasks found.\n");
    }
    out
}

pub fn print_table(tasks: &[&Task]) {
    print!("{}", format_table(tasks));
}

/// Render every field of a task, nested entries with their ids.
pub fn format_task_detail(task: &Task) -> String {
    let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    let mut out = String::new();
    out.push_str(&format!("Task ID:        {}\n", task.task_id));
    out.push_str(&format!("Name:           {}\n", task.name));
    out.push_str(&format!("Details:        {}\n", dash(&task.task_details)));
    out.push_str(&format!("Type:           {}\n", format_task_type(task.task_type)));
    out.push_str(&format!("Priority:       {}\n", format_priority(task.task_priority)));
    out.push_str(&format!("Status:         {}\n", format_status(task.status)));
    out.push_str(&format!("Project:        {}\n", dash(&task.project)));
    out.push_str(&format!("Assignee:       {}\n", dash(&task.task_assignee)));
    out.push_str(&format!(
        "Due:            {}\n",
        task.task_due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into())
    ));
    out.push_str(&format!("Business value: {}\n", dash(&task.business_value)));
    out.push_str(&format!("Created UTC:    {}\n", task.created_at.to_rfc3339()));
    out.push_str(&format!("Updated UTC:    {}\n", task.updated_at.to_rfc3339()));
    out.push_str(&format!("Description:\n{}\n", dash(&task.description)));
    out.push_str("Acceptance criteria:\n");
    if task.acceptance_criteria.is_empty() {
        out.push_str("  -\n");
    }
    for c in &task.acceptance_criteria {
        out.push_str(&format!("  - {} ({})\n", c.value, c.criteria_id));
    }
    out.push_str("Subtasks:\n");
    if task.subtasks.is_empty() {
        out.push_str("  -\n");
    }
    for s in &task.subtasks {
        out.push_str(&format!("  - {} ({})\n", s.value, s.subtask_id));
    }
    out
}

pub fn print_task_detail(task: &Task) {
    print!("{}", format_task_detail(task));
}
