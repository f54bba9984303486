//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which manages the TUI state,
//! handles user input, renders the interface, and talks to the task API.
//! Every mutation is followed by a full re-fetch of the task list; filtering
//! always runs locally over that list.

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};

use crate::{
    client::ApiClient,
    fields::{format_priority, format_status, format_task_type, truncate, Status, TaskType},
    filter::{cycle, distinct_assignees, distinct_projects, TaskFilter},
    task::Task,
    tui::{
        colors::{priority_color, status_color, DARK_RED, SLATE},
        enums::{AppState, ConfirmAction},
        input::InputField,
        item_list::{ItemList, Removal},
        task_form::{
            ItemKind, TaskForm, ASSIGNEE_GLOBAL_ORDER, BUSINESS_VALUE_GLOBAL_ORDER,
            CRITERIA_GLOBAL_ORDER, DESCRIPTION_GLOBAL_ORDER, DUE_GLOBAL_ORDER, NAME_GLOBAL_ORDER,
            PRIORITY_GLOBAL_ORDER, PROJECT_GLOBAL_ORDER, STATUS_GLOBAL_ORDER,
            SUBTASKS_GLOBAL_ORDER, TASK_DETAILS_GLOBAL_ORDER, TYPE_GLOBAL_ORDER,
        },
        utils::centered_rect,
    },
};

/// Main application state for the terminal user interface.
pub struct App {
    state: AppState,
    /// Screen to return to when a help, confirm or alert overlay closes.
    previous_state: AppState,
    client: ApiClient,
    tasks: Vec<Task>,
    /// Set when the last list fetch failed; the list shows a retry panel.
    load_error: Option<String>,
    task_list_state: TableState,
    /// Indices into `tasks` that pass the filter.
    filtered_tasks: Vec<usize>,
    detail: Option<Task>,
    task_form: TaskForm,
    filter: TaskFilter,
    search_active: bool,
    status_message: String,
    confirm_action: Option<ConfirmAction>,
    alert_message: Option<String>,
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

impl App {
    /// Create the app and load the task list from the server.
    pub fn new(client: ApiClient) -> Self {
        let mut app = App {
            state: AppState::TaskList,
            previous_state: AppState::TaskList,
            client,
            tasks: Vec::new(),
            load_error: None,
            task_list_state: TableState::default(),
            filtered_tasks: Vec::new(),
            detail: None,
            task_form: TaskForm::new(),
            filter: TaskFilter::default(),
            search_active: false,
            status_message: String::new(),
            confirm_action: None,
            alert_message: None,
        };
        app.refresh_tasks();
        app
    }

    /// Re-fetch the full task list, keeping the selected task selected when it still exists.
    fn refresh_tasks(&mut self) {
        let selected_id = self.get_selected_task().map(|t| t.task_id.clone());
        match self.client.list_tasks() {
            Ok(tasks) => {
                self.tasks = tasks;
                self.load_error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch tasks");
                self.load_error = Some(e.to_string());
            }
        }
        self.update_filtered_tasks();
        if let Some(id) = selected_id {
            self.select_task_id(&id);
        }
    }

    /// Recompute the visible rows from the current filter.
    fn update_filtered_tasks(&mut self) {
        self.filtered_tasks = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| self.filter.matches(task))
            .map(|(i, _)| i)
            .collect();

        let len = self.filtered_tasks.len();
        match self.task_list_state.selected() {
            _ if len == 0 => self.task_list_state.select(None),
            Some(i) if i >= len => self.task_list_state.select(Some(len - 1)),
            None => self.task_list_state.select(Some(0)),
            _ => {}
        }
    }

    fn select_task_id(&mut self, task_id: &str) {
        if let Some(row) = self
            .filtered_tasks
            .iter()
            .position(|&i| self.tasks.get(i).is_some_and(|t| t.task_id == task_id))
        {
            self.task_list_state.select(Some(row));
        }
    }

    fn get_selected_task(&self) -> Option<&Task> {
        self.task_list_state
            .selected()
            .and_then(|row| self.filtered_tasks.get(row))
            .and_then(|&i| self.tasks.get(i))
    }

    fn selected_task_id(&self) -> Option<String> {
        self.get_selected_task().map(|t| t.task_id.clone())
    }

    /// Set a status message to display in the status bar.
    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Show a blocking error dialog over the current screen.
    fn show_alert(&mut self, msg: String) {
        tracing::warn!(message = %msg, "showing alert");
        if self.state != AppState::Alert {
            self.previous_state = self.state;
        }
        self.state = AppState::Alert;
        self.alert_message = Some(msg);
    }

    fn announce_filter(&mut self) {
        let msg = format!(
            "Filter: {} ({} of {} tasks)",
            self.filter.describe(),
            self.filtered_tasks.len(),
            self.tasks.len()
        );
        self.set_status_message(msg);
    }

    /// Fetch one task from the server and show it in the detail view.
    fn open_detail(&mut self, task_id: &str) {
        match self.client.get_task(task_id) {
            Ok(task) => {
                self.detail = Some(task);
                self.state = AppState::TaskDetail;
            }
            Err(e) => {
                if e.is_not_found() {
                    self.refresh_tasks();
                }
                self.show_alert(format!("Failed to fetch task: {e}"));
            }
        }
    }

    /// Fetch the latest copy of a task and open the edit form on it.
    fn open_edit(&mut self, task_id: &str) {
        match self.client.get_task(task_id) {
            Ok(task) => {
                self.task_form = TaskForm::from_task(&task);
                self.state = AppState::EditTask;
            }
            Err(e) => {
                if e.is_not_found() {
                    self.refresh_tasks();
                }
                self.show_alert(format!("Failed to fetch task: {e}"));
            }
        }
    }

    fn ask_delete(&mut self, task: Option<(String, String)>) {
        if let Some((task_id, name)) = task {
            self.confirm_action = Some(ConfirmAction::DeleteTask { task_id, name });
            self.previous_state = self.state;
            self.state = AppState::Confirm;
        }
    }

    /// Handle keyboard input on the task list.
    ///
    /// Returns true if the application should quit.
    fn handle_task_list_input(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> io::Result<bool> {
        if self.search_active {
            match key {
                KeyCode::Esc => {
                    self.search_active = false;
                    self.filter.search.clear();
                    self.update_filtered_tasks();
                }
                KeyCode::Enter => {
                    self.search_active = false;
                    self.announce_filter();
                }
                KeyCode::Backspace => {
                    if self.filter.search.pop().is_some() {
                        self.update_filtered_tasks();
                    }
                }
                KeyCode::Char(c) => {
                    self.filter.search.push(c);
                    self.update_filtered_tasks();
                }
                _ => {}
            }
            return Ok(false);
        }

        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                if self.filter.is_empty() {
                    return Ok(true);
                }
                self.filter.clear();
                self.update_filtered_tasks();
                self.set_status_message("Filters cleared".to_string());
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(selected) = self.task_list_state.selected() {
                    if selected > 0 {
                        self.task_list_state.select(Some(selected - 1));
                    }
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(selected) = self.task_list_state.selected() {
                    if selected + 1 < self.filtered_tasks.len() {
                        self.task_list_state.select(Some(selected + 1));
                    }
                }
            }
            KeyCode::Char('/') => {
                self.search_active = true;
            }
            KeyCode::Char('p') => {
                let projects = distinct_projects(&self.tasks);
                self.filter.project = cycle(&self.filter.project, &projects);
                self.update_filtered_tasks();
                self.announce_filter();
            }
            KeyCode::Char('a') => {
                let assignees = distinct_assignees(&self.tasks);
                self.filter.assignee = cycle(&self.filter.assignee, &assignees);
                self.update_filtered_tasks();
                self.announce_filter();
            }
            KeyCode::Char('s') => {
                self.filter.status = cycle(&self.filter.status, &Status::ALL);
                self.update_filtered_tasks();
                self.announce_filter();
            }
            KeyCode::Char('t') => {
                self.filter.task_type = cycle(&self.filter.task_type, &TaskType::ALL);
                self.update_filtered_tasks();
                self.announce_filter();
            }
            KeyCode::Char('c') => {
                self.filter.clear();
                self.update_filtered_tasks();
                self.set_status_message("Filters cleared".to_string());
            }
            KeyCode::Char('r') => {
                self.refresh_tasks();
                if self.load_error.is_none() {
                    self.set_status_message(format!("Loaded {} tasks", self.tasks.len()));
                }
            }
            KeyCode::Char('n') => {
                self.task_form = TaskForm::new();
                self.state = AppState::AddTask;
            }
            KeyCode::Char('e') => {
                if let Some(task_id) = self.selected_task_id() {
                    self.open_edit(&task_id);
                }
            }
            KeyCode::Enter => {
                if let Some(task_id) = self.selected_task_id() {
                    self.open_detail(&task_id);
                }
            }
            KeyCode::Char('d') => {
                let target = self
                    .get_selected_task()
                    .map(|t| (t.task_id.clone(), t.name.clone()));
                self.ask_delete(target);
            }
            KeyCode::Char('h') | KeyCode::F(1) => {
                self.previous_state = self.state;
                self.state = AppState::Help;
            }
            _ => {}
        }
        Ok(false)
    }

    /// Handle keyboard input in the task detail view.
    fn handle_detail_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        let current = self
            .detail
            .as_ref()
            .map(|t| (t.task_id.clone(), t.name.clone()));
        match key {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.detail = None;
                self.state = AppState::TaskList;
            }
            KeyCode::Char('e') => {
                if let Some((task_id, _)) = current {
                    self.open_edit(&task_id);
                }
            }
            KeyCode::Char('d') => self.ask_delete(current),
            KeyCode::Char('r') => {
                if let Some((task_id, _)) = current {
                    self.open_detail(&task_id);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    /// Handle keyboard input when in task creation or editing forms.
    ///
    /// Returns true if the application should quit.
    fn handle_form_input(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
        is_edit: bool,
    ) -> io::Result<bool> {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('c') => return Ok(true),
                KeyCode::Char('s') => self.submit_form(is_edit),
                KeyCode::Char('a') => {
                    let kind = self.task_form.add_item(now_ms());
                    self.set_status_message(format!("Added {}", item_label(kind)));
                }
                KeyCode::Char('d') => self.remove_form_item(),
                _ => {}
            }
            return Ok(false);
        }

        match key {
            KeyCode::Esc => {
                self.task_form.discard_pending();
                self.state = AppState::TaskList;
                self.set_status_message("Cancelled".to_string());
            }
            KeyCode::Tab => self.task_form.next_field(),
            KeyCode::BackTab => self.task_form.prev_field(),
            KeyCode::Up => {
                if !self.task_form.handle_up_down(false) {
                    self.task_form.prev_field();
                }
            }
            KeyCode::Down => {
                if !self.task_form.handle_up_down(true) {
                    self.task_form.next_field();
                }
            }
            KeyCode::Left => self.task_form.handle_left_right(false),
            KeyCode::Right => self.task_form.handle_left_right(true),
            KeyCode::Backspace => self.task_form.handle_backspace(),
            KeyCode::Delete => self.task_form.handle_delete(),
            KeyCode::Enter => self.submit_form(is_edit),
            KeyCode::Char(c) => self.task_form.handle_char(c),
            _ => {}
        }
        Ok(false)
    }

    /// Send the form to the server, then go back to the refreshed list.
    fn submit_form(&mut self, is_edit: bool) {
        let payload = if is_edit {
            self.task_form.to_update_payload()
        } else {
            self.task_form.to_create_payload()
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                self.set_status_message(e.to_string());
                return;
            }
        };

        let result = match (&self.task_form.task_id, is_edit) {
            (Some(task_id), true) => self.client.update_task(task_id, &payload),
            _ => self.client.create_task(&payload),
        };
        match result {
            Ok(task) => {
                self.state = AppState::TaskList;
                self.detail = None;
                self.refresh_tasks();
                self.select_task_id(&task.task_id);
                self.set_status_message(
                    if is_edit { "Task updated" } else { "Task created" }.to_string(),
                );
            }
            Err(e) => {
                let action = if is_edit { "update" } else { "create" };
                self.show_alert(format!("Failed to {action} task: {e}"));
            }
        }
    }

    /// Remove the focused collection entry; saved entries are deleted on the server right away.
    fn remove_form_item(&mut self) {
        let Some((kind, removal)) = self.task_form.remove_item() else {
            self.set_status_message("Nothing to remove".to_string());
            return;
        };
        let server_id = match removal {
            Removal::Local => {
                self.set_status_message(format!("Removed {}", item_label(kind)));
                return;
            }
            Removal::Remote(server_id) => server_id,
        };
        let Some(task_id) = self.task_form.task_id.clone() else {
            return;
        };

        let result = match kind {
            ItemKind::Criterion => self.client.delete_criterion(&task_id, &server_id),
            ItemKind::Subtask => self.client.delete_subtask(&task_id, &server_id),
        };
        match result {
            Ok(_) => {
                self.task_form.forget_item(kind, &server_id);
                self.refresh_tasks();
                self.set_status_message(format!("Deleted {}", item_label(kind)));
            }
            Err(e) => self.show_alert(format!("Failed to delete {}: {e}", item_label(kind))),
        }
    }

    fn delete_task(&mut self, task_id: &str, name: &str) {
        match self.client.delete_task(task_id) {
            Ok(_) => {
                self.detail = None;
                self.state = AppState::TaskList;
                self.refresh_tasks();
                self.set_status_message(format!("Deleted task '{name}'"));
            }
            Err(e) => {
                self.state = self.previous_state;
                self.show_alert(format!("Failed to delete task: {e}"));
            }
        }
    }

    /// Handle keyboard input in the confirmation dialog.
    fn handle_confirm_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                match self.confirm_action.take() {
                    Some(ConfirmAction::DeleteTask { task_id, name }) => {
                        self.delete_task(&task_id, &name)
                    }
                    None => self.state = self.previous_state,
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state = self.previous_state;
                self.confirm_action = None;
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_alert_input(&mut self, _key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        self.alert_message = None;
        self.state = self.previous_state;
        Ok(false)
    }

    fn handle_help_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        if let KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('h') = key {
            self.state = self.previous_state;
        }
        Ok(false)
    }

    /// Dispatch one key press to the handler for the current screen.
    ///
    /// Returns true if the application should quit.
    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        self.clear_status_message();
        match self.state {
            AppState::TaskList => self.handle_task_list_input(key, modifiers),
            AppState::TaskDetail => self.handle_detail_input(key, modifiers),
            AppState::AddTask => self.handle_form_input(key, modifiers, false),
            AppState::EditTask => self.handle_form_input(key, modifiers, true),
            AppState::Help => self.handle_help_input(key, modifiers),
            AppState::Confirm => self.handle_confirm_input(key, modifiers),
            AppState::Alert => self.handle_alert_input(key, modifiers),
        }
    }

    /// Poll for and handle keyboard events.
    ///
    /// Returns true if the application should quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return self.handle_key(key.code, key.modifiers);
            }
        }
        Ok(false)
    }

    /// Render the task list, or the retry panel when the last fetch failed.
    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let search = if self.search_active {
            format!("Search: {}_", self.filter.search)
        } else {
            format!("Filter: {}", self.filter.describe())
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{}  {}", self.client.base_url(), search),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, chunks[0]);

        if let Some(error) = &self.load_error {
            let text = vec![
                Line::from(""),
                Line::from(Span::styled(
                    "Could not load tasks",
                    Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(error.as_str()),
                Line::from(""),
                Line::from("Press 'r' to retry"),
            ];
            let panel = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("Error"))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            f.render_widget(panel, chunks[1]);
            return;
        }

        let header_cells = ["Name", "Type", "Priority", "Status", "Project", "Assignee", "Due"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(SLATE).fg(Color::White))
            .height(1);

        let rows: Vec<Row> = self
            .filtered_tasks
            .iter()
            .filter_map(|&i| self.tasks.get(i))
            .map(|task| {
                Row::new(vec![
                    Cell::from(truncate(&task.name, 40)),
                    Cell::from(format_task_type(task.task_type)),
                    Cell::from(format_priority(task.task_priority))
                        .style(Style::default().fg(priority_color(task.task_priority))),
                    Cell::from(format_status(task.status))
                        .style(Style::default().fg(status_color(task.status))),
                    Cell::from(task.project.as_deref().unwrap_or("-").to_string()),
                    Cell::from(task.task_assignee.as_deref().unwrap_or("-").to_string()),
                    Cell::from(
                        task.task_due_date
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ])
            })
            .collect();

        let widths = [
            Constraint::Min(24),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(11),
        ];
        let empty_hint = if self.tasks.is_empty() {
            "No tasks yet - press 'n' to add one"
        } else {
            "Press 'h' for help"
        };
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{}) - {}",
                self.filtered_tasks.len(),
                self.tasks.len(),
                empty_hint
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut self.task_list_state);
    }

    /// Render the detailed view of a single task.
    fn render_task_detail(&mut self, f: &mut Frame, area: Rect) {
        let Some(task) = &self.detail else {
            return;
        };
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let field = |label: &str, value: String| {
            Line::from(vec![Span::styled(format!("{label}: "), bold), Span::raw(value)])
        };
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

        let mut text = vec![
            field("Task ID", task.task_id.clone()),
            field("Name", task.name.clone()),
            field("Details", or_dash(&task.task_details)),
            field("Type", format_task_type(task.task_type).to_string()),
            field("Priority", format_priority(task.task_priority).to_string()),
            field("Status", format_status(task.status).to_string()),
            field("Project", or_dash(&task.project)),
            field("Assignee", or_dash(&task.task_assignee)),
            field(
                "Due",
                task.task_due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            field("Business Value", or_dash(&task.business_value)),
            field("Created", task.created_at.format("%Y-%m-%d %H:%M").to_string()),
            field("Updated", task.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            Line::from(""),
            Line::from(Span::styled("Description:", bold)),
            Line::from(task.description.as_deref().unwrap_or("-").to_string()),
            Line::from(""),
            Line::from(Span::styled("Acceptance Criteria:", bold)),
        ];
        if task.acceptance_criteria.is_empty() {
            text.push(Line::from("  -"));
        }
        for criterion in &task.acceptance_criteria {
            text.push(Line::from(format!("  - {}", criterion.value)));
        }
        text.push(Line::from(""));
        text.push(Line::from(Span::styled("Subtasks:", bold)));
        if task.subtasks.is_empty() {
            text.push(Line::from("  -"));
        }
        for subtask in &task.subtasks {
            text.push(Line::from(format!("  - {}", subtask.value)));
        }

        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Task Details - [e]dit, [d]elete, [r]eload, [Esc] back"),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    /// Render the task creation or editing form.
    fn render_task_form(&mut self, f: &mut Frame, area: Rect, is_edit: bool) {
        let outer = Block::default().borders(Borders::ALL).title(if is_edit {
            "Edit Task - Ctrl-S save, Ctrl-A add entry, Ctrl-D remove entry, Esc cancel"
        } else {
            "New Task - Ctrl-S create, Ctrl-A add entry, Ctrl-D remove entry, Esc cancel"
        });
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(18), Constraint::Min(4)])
            .split(inner);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3); 6])
            .split(columns[0]);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3); 4])
            .split(columns[1]);
        let lists = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let form = &self.task_form;
        let current = form.current_field;

        render_input(f, left[0], "Name *", &form.name, current == NAME_GLOBAL_ORDER);
        render_input(f, left[1], "Task Details", &form.task_details, current == TASK_DETAILS_GLOBAL_ORDER);
        render_selector(f, left[2], "Type", format_task_type(form.selected_task_type()), current == TYPE_GLOBAL_ORDER);
        render_selector(f, left[3], "Priority", format_priority(form.selected_priority()), current == PRIORITY_GLOBAL_ORDER);
        render_input(f, left[4], "Project", &form.project, current == PROJECT_GLOBAL_ORDER);
        render_input(f, left[5], "Assignee", &form.assignee, current == ASSIGNEE_GLOBAL_ORDER);
        render_selector(f, right[0], "Status", format_status(form.selected_status()), current == STATUS_GLOBAL_ORDER);
        render_input(f, right[1], "Description", &form.description, current == DESCRIPTION_GLOBAL_ORDER);
        render_input(f, right[2], "Business Value", &form.business_value, current == BUSINESS_VALUE_GLOBAL_ORDER);
        render_input(f, right[3], "Due (YYYY-MM-DD)", &form.due, current == DUE_GLOBAL_ORDER);
        render_item_list(f, lists[0], "Acceptance Criteria", &form.criteria, current == CRITERIA_GLOBAL_ORDER);
        render_item_list(f, lists[1], "Subtasks", &form.subtasks, current == SUBTASKS_GLOBAL_ORDER);

        let cursor_field = match current {
            NAME_GLOBAL_ORDER => Some((left[0], &form.name)),
            TASK_DETAILS_GLOBAL_ORDER => Some((left[1], &form.task_details)),
            PROJECT_GLOBAL_ORDER => Some((left[4], &form.project)),
            ASSIGNEE_GLOBAL_ORDER => Some((left[5], &form.assignee)),
            DESCRIPTION_GLOBAL_ORDER => Some((right[1], &form.description)),
            BUSINESS_VALUE_GLOBAL_ORDER => Some((right[2], &form.business_value)),
            DUE_GLOBAL_ORDER => Some((right[3], &form.due)),
            _ => None,
        };
        if let Some((chunk, field)) = cursor_field {
            f.set_cursor_position((chunk.x + field.cursor as u16 + 1, chunk.y + 1));
        }
    }

    /// Render the help screen with keyboard shortcuts.
    fn render_help(&mut self, f: &mut Frame, area: Rect) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled("Task Board Help", bold)),
            Line::from(""),
            Line::from(Span::styled("Task List:", bold)),
            Line::from("  Up/Down, k/j   Move selection"),
            Line::from("  Enter          View task details"),
            Line::from("  n              New task"),
            Line::from("  e              Edit selected task"),
            Line::from("  d              Delete selected task"),
            Line::from("  /              Search name and description"),
            Line::from("  p / a          Cycle project / assignee filter"),
            Line::from("  s / t          Cycle status / type filter"),
            Line::from("  c              Clear all filters"),
            Line::from("  r              Re-fetch tasks (retry after an error)"),
            Line::from("  h/F1           Show this help"),
            Line::from("  q/Ctrl+C       Quit"),
            Line::from(""),
            Line::from(Span::styled("Task Form:", bold)),
            Line::from("  Tab/Shift+Tab  Move between fields"),
            Line::from("  Left/Right     Move cursor or change selector"),
            Line::from("  Up/Down        Move within a list, or between fields"),
            Line::from("  Ctrl+A         Add an entry to the focused list"),
            Line::from("  Ctrl+D         Remove the focused entry (saved entries are deleted at once)"),
            Line::from("  Ctrl+S/Enter   Save"),
            Line::from("  Esc            Cancel"),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - Press Esc to return"),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    /// Render a confirmation dialog for destructive actions.
    fn render_confirm(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Confirm Action")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 25, area);
        f.render_widget(Clear, area);

        let prompt = self
            .confirm_action
            .as_ref()
            .map(ConfirmAction::prompt)
            .unwrap_or_default();
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Are you sure you want to:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(prompt),
            Line::from(""),
            Line::from("This action cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_alert(&mut self, f: &mut Frame, area: Rect) {
        let area = centered_rect(60, 30, area);
        f.render_widget(Clear, area);

        let text = vec![
            Line::from(""),
            Line::from(self.alert_message.as_deref().unwrap_or_default().to_string()),
            Line::from(""),
            Line::from("Press any key to continue"),
        ];
        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Error")
                    .borders(Borders::ALL)
                    .style(Style::default().bg(DARK_RED)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    /// Render the status bar at the bottom of the screen.
    fn render_status_bar(&mut self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else if self.search_active {
            format!("Search: {} (Esc to clear, Enter to confirm)", self.filter.search)
        } else {
            match self.state {
                AppState::TaskList if self.load_error.is_some() => {
                    "Failed to load tasks | Press 'r' to retry".to_string()
                }
                AppState::TaskList => format!(
                    "Tasks: {} | {} | Press 'h' for help",
                    self.filtered_tasks.len(),
                    self.filter.describe()
                ),
                AppState::TaskDetail => "Task Details".to_string(),
                AppState::AddTask => "Add New Task".to_string(),
                AppState::EditTask => "Edit Task".to_string(),
                AppState::Help => "Help".to_string(),
                AppState::Confirm => "Confirm Action".to_string(),
                AppState::Alert => "Error".to_string(),
            }
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(SLATE).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_screen(&mut self, state: AppState, f: &mut Frame, area: Rect) {
        match state {
            AppState::TaskDetail => self.render_task_detail(f, area),
            AppState::AddTask => self.render_task_form(f, area, false),
            AppState::EditTask => self.render_task_form(f, area, true),
            AppState::Help => self.render_help(f, area),
            _ => self.render_task_list(f, area),
        }
    }

    /// Main render function that dispatches to appropriate view renderers.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        match self.state {
            AppState::Confirm => {
                self.render_screen(self.previous_state, f, chunks[0]);
                self.render_confirm(f, chunks[0]);
            }
            AppState::Alert => {
                self.render_screen(self.previous_state, f, chunks[0]);
                self.render_alert(f, chunks[0]);
            }
            state => self.render_screen(state, f, chunks[0]),
        }

        self.render_status_bar(f, chunks[1]);
    }

    /// Main event loop for the TUI application.
    ///
    /// Handles rendering and input processing until the user exits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

fn item_label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Criterion => "acceptance criterion",
        ItemKind::Subtask => "subtask",
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_input(f: &mut Frame, area: Rect, title: &str, field: &InputField, focused: bool) {
    let widget = Paragraph::new(field.value.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(focus_style(focused)),
    );
    f.render_widget(widget, area);
}

fn render_selector(f: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let text = if focused {
        format!("< {value} >")
    } else {
        value.to_string()
    };
    let widget = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(focus_style(focused)),
    );
    f.render_widget(widget, area);
}

fn render_item_list(f: &mut Frame, area: Rect, title: &str, list: &ItemList, focused: bool) {
    let lines: Vec<Line> = if list.is_empty() {
        vec![Line::from(Span::styled(
            "(none - Ctrl-A to add)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        list.items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let selected = focused && list.selected == Some(i);
                let marker = if selected { "> " } else { "  " };
                if item.is_pending() {
                    let text = if selected {
                        item.text.display_with_cursor()
                    } else {
                        item.text.value.clone()
                    };
                    Line::from(vec![
                        Span::raw(marker),
                        Span::styled(text, Style::default().fg(Color::Cyan)),
                        Span::styled(" (new)", Style::default().fg(Color::DarkGray)),
                    ])
                } else {
                    Line::from(vec![Span::raw(marker), Span::raw(item.text.value.clone())])
                }
            })
            .collect()
    };
    let widget = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{title} ({})", list.len()))
                .border_style(focus_style(focused)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}
