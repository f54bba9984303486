//! # TB - Task Board
//!
//! A task-tracking service: a JSON REST API over a document store, plus a
//! terminal client that lists, filters, creates, edits and deletes tasks
//! through that API.
//!
//! ## Key Features
//!
//! - **REST API**: seven endpoints under `/api` answering with a uniform
//!   `{ success, message, data?, error? }` envelope
//! - **Document store**: a JSON file written atomically, or an in-memory store
//! - **Terminal UI**: local search and exact-match filters, create and edit
//!   forms with acceptance criteria and subtasks
//! - **One-shot commands** for scripting against a running server
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API (defaults: 0.0.0.0:5000, file://tasks.json)
//! tb serve
//!
//! # In another terminal, open the board
//! tb ui
//!
//! # Or script it
//! tb add "Fix login bug" --type bug --priority high --criterion "Users can log in"
//! tb list --status todo
//! ```
//!
//! ## Configuration
//!
//! Flags fall back to environment variables, and a `.env` file in the working
//! directory is loaded first: `HOST`, `PORT`, `STORE_URL` for `serve`,
//! `TB_API_URL` for client commands, `RUST_LOG` for log filtering.

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod api;
pub mod cli;
pub mod client;
pub mod cmd;
pub mod db;
pub mod fields;
pub mod filter;
pub mod server;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod item_list;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}

use cli::Cli;
use client::ApiClient;
use cmd::*;
use filter::TaskFilter;
use server::ServerConfig;

/// Log to stderr, filtered by `RUST_LOG` or the given default directive.
fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Commands that don't need an API client first
    match &cli.command {
        Commands::Serve { host, port, store_url } => {
            init_tracing("info,tower_http=info");
            cmd_serve(ServerConfig {
                host: host.clone(),
                port: *port,
                store_url: store_url.clone(),
            });
            return;
        }
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            return;
        }
        _ => {}
    }

    let is_ui = matches!(cli.command, Commands::Ui);
    init_tracing(if is_ui { "off" } else { "warn" });

    let client = match ApiClient::new(&cli.api_url) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create API client for {}: {}", cli.api_url, e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve { .. } => unreachable!("serve handled above"),
        Commands::Completions { .. } => unreachable!("completions handled above"),

        Commands::Ui => cmd_ui(client),

        Commands::Add { name, fields } => cmd_add(&client, name, fields),

        Commands::List { search, project, assignee, status, task_type } => {
            let filter = TaskFilter {
                search: search.unwrap_or_default(),
                project,
                assignee,
                status,
                task_type,
            };
            cmd_list(&client, filter)
        }

        Commands::View { id } => cmd_view(&client, id),

        Commands::Update { id, name, fields, clear } => cmd_update(&client, id, name, fields, clear),

        Commands::Delete { id } => cmd_delete(&client, id),

        Commands::RmCriterion { task_id, criteria_id } => {
            cmd_rm_criterion(&client, task_id, criteria_id)
        }

        Commands::RmSubtask { task_id, subtask_id } => cmd_rm_subtask(&client, task_id, subtask_id),
    }
}
