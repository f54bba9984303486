//! Blocking HTTP client for the task API.
//!
//! Used by the terminal UI and the one-shot CLI commands. Each call is a single
//! request; non-2xx answers are turned into `ClientError::Status` carrying the
//! envelope's message so callers can show it as is.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::Envelope;
use crate::task::{Task, TaskPayload};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error! status: {status} ({message})")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Rejected(String),
    #[error("invalid API URL '{0}'")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

/// Client bound to one API base URL, e.g. `http://localhost:5000/api`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base = Url::parse(trimmed)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::InvalidUrl(base_url.to_string()))?;
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(ApiClient { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn task_url(&self, task_id: &str) -> Url {
        self.endpoint(&[task_id])
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let tasks: Option<Vec<Task>> = self.send(self.http.get(self.endpoint(&[""])))?;
        Ok(tasks.unwrap_or_default())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, ClientError> {
        self.send_task(self.http.get(self.task_url(task_id)))
    }

    pub fn create_task(&self, payload: &TaskPayload) -> Result<Task, ClientError> {
        self.send_task(self.http.post(self.endpoint(&[""])).json(payload))
    }

    pub fn update_task(&self, task_id: &str, payload: &TaskPayload) -> Result<Task, ClientError> {
        self.send_task(self.http.put(self.task_url(task_id)).json(payload))
    }

    pub fn delete_task(&self, task_id: &str) -> Result<Task, ClientError> {
        self.send_task(self.http.delete(self.task_url(task_id)))
    }

    pub fn delete_criterion(&self, task_id: &str, criteria_id: &str) -> Result<Task, ClientError> {
        let url = self.endpoint(&[task_id, "acceptance-criteria", criteria_id]);
        self.send_task(self.http.delete(url))
    }

    pub fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> Result<Task, ClientError> {
        let url = self.endpoint(&[task_id, "subtasks", subtask_id]);
        self.send_task(self.http.delete(url))
    }

    fn send_task(&self, req: RequestBuilder) -> Result<Task, ClientError> {
        self.send(req)?
            .ok_or_else(|| ClientError::Rejected("response carried no task".to_string()))
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>, ClientError> {
        let res = req.send()?;
        let status = res.status();
        let body = res.text()?;
        tracing::debug!(status = status.as_u16(), "api response");

        if !status.is_success() {
            let message = match serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
                Ok(env) => match env.error {
                    Some(detail) => format!("{}: {}", env.message, detail),
                    None => env.message,
                },
                Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
            };
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(ClientError::Rejected(envelope.message));
        }
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;
    use crate::server::spawn_test_server as spawn_server;
    use crate::task::{CriterionInput, SubtaskInput};

    #[test]
    fn test_client_round_trip_against_live_server() {
        let client = ApiClient::new(&spawn_server()).unwrap();
        assert!(client.list_tasks().unwrap().is_empty());

        let payload = TaskPayload {
            name: Some("Client task".into()),
            acceptance_criteria: Some(vec![
                CriterionInput { criteria_id: None, value: "one".into() },
                CriterionInput { criteria_id: None, value: "two".into() },
            ]),
            ..Default::default()
        };
        let created = client.create_task(&payload).unwrap();
        assert_eq!(created.status, Status::Todo);
        assert_eq!(client.get_task(&created.task_id).unwrap(), created);

        let update = TaskPayload { status: Some(Status::Done), ..Default::default() };
        let updated = client.update_task(&created.task_id, &update).unwrap();
        assert_eq!(updated.status, Status::Done);
        assert_eq!(updated.acceptance_criteria, created.acceptance_criteria);

        let first = created.acceptance_criteria[0].criteria_id.clone();
        let pulled = client.delete_criterion(&created.task_id, &first).unwrap();
        assert_eq!(pulled.acceptance_criteria.len(), 1);

        client.delete_task(&created.task_id).unwrap();
        let err = client.get_task(&created.task_id).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Task not found"));
    }

    #[test]
    fn test_client_surfaces_validation_message() {
        let client = ApiClient::new(&spawn_server()).unwrap();
        let err = client.create_task(&TaskPayload::default()).unwrap_err();
        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 500);
                assert!(message.starts_with("Failed to create task"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unreachable_server_is_http_error() {
        let client = ApiClient::new("http://127.0.0.1:1/api").unwrap();
        assert!(matches!(client.list_tasks(), Err(ClientError::Http(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.task_url("abc").as_str(), "http://localhost:5000/api/abc");
        assert_eq!(client.endpoint(&[""]).as_str(), "http://localhost:5000/api/");
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let client = ApiClient::new("http://localhost:5000/api").unwrap();
        assert_eq!(
            client.endpoint(&["t 1", "subtasks", "s/1?x#y"]).as_str(),
            "http://localhost:5000/api/t%201/subtasks/s%2F1%3Fx%23y"
        );
        assert!(matches!(ApiClient::new("not a url"), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_delete_items_with_reserved_characters() {
        let client = ApiClient::new(&spawn_server()).unwrap();
        let payload = TaskPayload {
            name: Some("Reserved ids".into()),
            acceptance_criteria: Some(vec![
                CriterionInput { criteria_id: Some("c#1".into()), value: "hash".into() },
                CriterionInput { criteria_id: Some("c?2".into()), value: "query".into() },
            ]),
            subtasks: Some(vec![SubtaskInput { subtask_id: Some("s/1".into()), value: "slash".into() }]),
            ..Default::default()
        };
        let task = client.create_task(&payload).unwrap();

        let after = client.delete_criterion(&task.task_id, "c#1").unwrap();
        let ids: Vec<&str> = after.acceptance_criteria.iter().map(|c| c.criteria_id.as_str()).collect();
        assert_eq!(ids, vec!["c?2"]);
        let after = client.delete_criterion(&task.task_id, "c?2").unwrap();
        assert!(after.acceptance_criteria.is_empty());
        let after = client.delete_subtask(&task.task_id, "s/1").unwrap();
        assert!(after.subtasks.is_empty());

        let stored = client.get_task(&task.task_id).unwrap();
        assert!(stored.acceptance_criteria.is_empty());
        assert!(stored.subtasks.is_empty());
    }
}
