use clap::Parser;

use crate::cmd::Commands;

/// Task board: a task-tracking REST API with a terminal client.
/// Client commands talk to the API at --api-url.
#[derive(Parser)]
#[command(name = "tb", version, about = "Task tracking API server and terminal client")]
pub struct Cli {
    /// Base URL of the task API.
    #[arg(long, global = true, env = "TB_API_URL", default_value = "http://localhost:5000/api")]
    pub api_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Status, TaskType};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["tb", "serve", "--port", "8080", "--store-url", "memory://"]).unwrap();
        match cli.command {
            Commands::Serve { port, store_url, .. } => {
                assert_eq!(port, 8080);
                assert_eq!(store_url, "memory://");
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "tb", "list", "--status", "in-progress", "--type", "bug", "--api-url", "http://h:1/api",
        ])
        .unwrap();
        assert_eq!(cli.api_url, "http://h:1/api");
        match cli.command {
            Commands::List { status, task_type, .. } => {
                assert_eq!(status, Some(Status::InProgress));
                assert_eq!(task_type, Some(TaskType::Bug));
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_parse_add_with_repeated_entries() {
        let cli = Cli::try_parse_from([
            "tb", "add", "Write docs", "--criterion", "one", "--criterion", "two", "--subtask", "draft",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { name, fields } => {
                assert_eq!(name, "Write docs");
                assert_eq!(fields.criteria, vec!["one", "two"]);
                assert_eq!(fields.subtasks, vec!["draft"]);
            }
            _ => panic!("expected add"),
        }
    }
}
