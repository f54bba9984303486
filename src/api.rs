//! HTTP handlers for the task resource.
//!
//! Every handler performs exactly one store operation and answers with the
//! same `Envelope` shape. Not-found lookups are 404; every other failure,
//! including a payload that cannot be decoded, is a 500 that carries the
//! underlying error text.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{DocumentStore, StoreError};
use crate::task::{Task, TaskPayload};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
}

impl AppState {
    pub fn new(store: DocumentStore) -> Self {
        AppState { store: Arc::new(store) }
    }
}

/// Uniform response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(message: &str, data: T) -> Self {
        Envelope {
            success: true,
            message: message.to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: &str, error: Option<String>) -> Self {
        Envelope {
            success: false,
            message: message.to_string(),
            data: None,
            error,
        }
    }
}

/// A handler failure, already tagged with the message the caller sees.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Task not found")]
    NotFound,
    #[error("{message}: {source}")]
    Store {
        message: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{message}: {detail}")]
    Payload { message: &'static str, detail: String },
}

impl ApiError {
    fn store(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { message, source }
    }

    fn payload(message: &'static str) -> impl FnOnce(JsonRejection) -> ApiError {
        move |rejection| ApiError::Payload {
            message,
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Envelope::<Task>::failure("Task not found", None),
            ),
            ApiError::Store { message, source } => {
                tracing::error!(error = %source, "{message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Envelope::failure(message, Some(source.to_string())),
                )
            }
            ApiError::Payload { message, detail } => {
                tracing::warn!(%detail, "{message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Envelope::failure(message, Some(detail)),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Run a store operation on the blocking pool; file-backed stores write to disk
/// while holding the collection lock.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&DocumentStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

/// `POST /api/`
pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<TaskPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Task>>), ApiError> {
    const FAILED: &str = "Failed to create task";
    let Json(payload) = payload.map_err(ApiError::payload(FAILED))?;
    let task = with_store(&state, move |store| store.insert(payload))
        .await
        .map_err(ApiError::store(FAILED))?;
    tracing::info!(task_id = %task.task_id, name = %task.name, "task created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok("Task created successfully", task)),
    ))
}

/// `GET /api/`
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    let tasks = with_store(&state, |store| store.find_all())
        .await
        .map_err(ApiError::store("Failed to fetch tasks"))?;
    Ok(Json(Envelope::ok("Tasks fetched successfully", tasks)))
}

/// `GET /api/{task_id}`
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Task> {
    let task = with_store(&state, move |store| store.find_one(&task_id))
        .await
        .map_err(ApiError::store("Failed to fetch task"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(Envelope::ok("Task fetched successfully", task)))
}

/// `PUT /api/{task_id}`
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: Result<Json<TaskPayload>, JsonRejection>,
) -> ApiResult<Task> {
    const FAILED: &str = "Failed to update task";
    let Json(payload) = payload.map_err(ApiError::payload(FAILED))?;
    let task = with_store(&state, move |store| store.find_one_and_update(&task_id, payload))
        .await
        .map_err(ApiError::store(FAILED))?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(task_id = %task.task_id, "task updated");
    Ok(Json(Envelope::ok("Task updated successfully", task)))
}

/// `DELETE /api/{task_id}`
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Task> {
    let task = with_store(&state, move |store| store.find_one_and_delete(&task_id))
        .await
        .map_err(ApiError::store("Failed to delete task"))?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(task_id = %task.task_id, "task deleted");
    Ok(Json(Envelope::ok("Task deleted successfully", task)))
}

/// `DELETE /api/{task_id}/acceptance-criteria/{criteria_id}`
pub async fn delete_criterion(
    State(state): State<AppState>,
    Path((task_id, criteria_id)): Path<(String, String)>,
) -> ApiResult<Task> {
    let target = criteria_id.clone();
    let task = with_store(&state, move |store| store.pull_criterion(&task_id, &target))
        .await
        .map_err(ApiError::store("Failed to delete acceptance criteria"))?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(task_id = %task.task_id, %criteria_id, "acceptance criterion removed");
    Ok(Json(Envelope::ok("Acceptance criteria deleted successfully", task)))
}

/// `DELETE /api/{task_id}/subtasks/{subtask_id}`
pub async fn delete_subtask(
    State(state): State<AppState>,
    Path((task_id, subtask_id)): Path<(String, String)>,
) -> ApiResult<Task> {
    let target = subtask_id.clone();
    let task = with_store(&state, move |store| store.pull_subtask(&task_id, &target))
        .await
        .map_err(ApiError::store("Failed to delete subtask"))?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(task_id = %task.task_id, %subtask_id, "subtask removed");
    Ok(Json(Envelope::ok("Subtask deleted successfully", task)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::db::DocumentStore;
    use crate::server::build_router;

    use super::*;

    fn app() -> Router {
        build_router(AppState::new(DocumentStore::memory()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn create(app: &Router, body: Value) -> Value {
        let (status, res) = call(app, Method::POST, "/api/", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{res}");
        res["data"].clone()
    }

    #[tokio::test]
    async fn test_create_with_only_a_name() {
        let app = app();
        let (status, res) = call(&app, Method::POST, "/api/", Some(json!({"name": "Fix login"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(res["success"], true);
        assert_eq!(res["message"], "Task created successfully");
        assert_eq!(res["data"]["status"], "Todo");
        assert!(res["data"]["taskId"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(res.get("error").is_none());

        let second = create(&app, json!({"name": "Fix logout"})).await;
        assert_ne!(second["taskId"], res["data"]["taskId"]);
    }

    #[tokio::test]
    async fn test_create_without_name_is_a_500_envelope() {
        let app = app();
        let (status, res) = call(&app, Method::POST, "/api/", Some(json!({"description": "no name"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res["success"], false);
        assert_eq!(res["message"], "Failed to create task");
        assert!(res["error"].as_str().unwrap().contains("name"));
        assert!(res.get("data").is_none());
    }

    #[tokio::test]
    async fn test_create_with_unknown_enum_value_fails() {
        let app = app();
        let (status, res) =
            call(&app, Method::POST, "/api/", Some(json!({"name": "x", "status": "Blocked"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res["message"], "Failed to create task");
        assert!(res["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_task_is_404_for_fetch_update_and_delete() {
        let app = app();
        for (method, uri) in [
            (Method::GET, "/api/does-not-exist"),
            (Method::DELETE, "/api/does-not-exist"),
            (Method::DELETE, "/api/does-not-exist/acceptance-criteria/c1"),
            (Method::DELETE, "/api/does-not-exist/subtasks/s1"),
        ] {
            let (status, res) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(res, json!({"success": false, "message": "Task not found"}));
        }
        let (status, _) =
            call(&app, Method::PUT, "/api/does-not-exist", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_then_fetch_keeps_nested_collections() {
        let app = app();
        let task = create(
            &app,
            json!({
                "name": "Checkout flow",
                "project": "E-commerce Platform",
                "acceptanceCriteria": [{"value": "Card payments work"}],
                "subtasks": [{"value": "Wire payment SDK"}]
            }),
        )
        .await;
        let id = task["taskId"].as_str().unwrap();

        let (status, res) = call(
            &app,
            Method::PUT,
            &format!("/api/{id}"),
            Some(json!({"name": "Checkout v2", "status": "In Progress", "taskPriority": "High"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "Task updated successfully");

        let (_, fetched) = call(&app, Method::GET, &format!("/api/{id}"), None).await;
        let fetched = &fetched["data"];
        assert_eq!(fetched["name"], "Checkout v2");
        assert_eq!(fetched["status"], "In Progress");
        assert_eq!(fetched["taskPriority"], "High");
        assert_eq!(fetched["project"], "E-commerce Platform");
        assert_eq!(fetched["acceptanceCriteria"], task["acceptanceCriteria"]);
        assert_eq!(fetched["subtasks"], task["subtasks"]);
    }

    #[tokio::test]
    async fn test_update_validation_failure() {
        let app = app();
        let task = create(&app, json!({"name": "valid"})).await;
        let id = task["taskId"].as_str().unwrap();
        let (status, res) = call(&app, Method::PUT, &format!("/api/{id}"), Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res["message"], "Failed to update task");
        let (_, fetched) = call(&app, Method::GET, &format!("/api/{id}"), None).await;
        assert_eq!(fetched["data"]["name"], "valid");
    }

    #[tokio::test]
    async fn test_delete_one_criterion_twice() {
        let app = app();
        let task = create(
            &app,
            json!({
                "name": "Search",
                "acceptanceCriteria": [{"value": "by name"}, {"value": "by tag"}, {"value": "by date"}]
            }),
        )
        .await;
        let id = task["taskId"].as_str().unwrap();
        let target = task["acceptanceCriteria"][1]["criteriaId"].as_str().unwrap();
        let uri = format!("/api/{id}/acceptance-criteria/{target}");

        let (status, res) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "Acceptance criteria deleted successfully");
        let after = &res["data"];
        assert_eq!(
            after["acceptanceCriteria"],
            json!([task["acceptanceCriteria"][0], task["acceptanceCriteria"][2]])
        );
        assert_eq!(after["name"], task["name"]);
        assert_eq!(after["status"], task["status"]);

        let (status, again) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&again["data"], after);
    }

    #[tokio::test]
    async fn test_delete_one_subtask() {
        let app = app();
        let task = create(&app, json!({"name": "Release", "subtasks": [{"value": "tag"}, {"value": "publish"}]})).await;
        let id = task["taskId"].as_str().unwrap();
        let target = task["subtasks"][0]["subtaskId"].as_str().unwrap();
        let (status, res) =
            call(&app, Method::DELETE, &format!("/api/{id}/subtasks/{target}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "Subtask deleted successfully");
        assert_eq!(res["data"]["subtasks"], json!([task["subtasks"][1]]));
    }

    #[tokio::test]
    async fn test_list_after_three_creates_and_one_delete() {
        let app = app();
        let a = create(&app, json!({"name": "a"})).await;
        let b = create(&app, json!({"name": "b"})).await;
        let c = create(&app, json!({"name": "c"})).await;
        let (status, res) =
            call(&app, Method::DELETE, &format!("/api/{}", b["taskId"].as_str().unwrap()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "Task deleted successfully");
        assert_eq!(res["data"], b);

        let (status, res) = call(&app, Method::GET, "/api", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["message"], "Tasks fetched successfully");
        assert_eq!(res["data"], json!([a, c]));
    }

    #[tokio::test]
    async fn test_create_fetch_round_trip() {
        let app = app();
        let body = json!({
            "name": "Dashboard charts",
            "taskDetails": "Use the existing palette",
            "taskType": "Feature",
            "taskPriority": "Medium",
            "project": "Analytics Dashboard",
            "taskAssignee": "Sarah Willson",
            "status": "Review",
            "description": "Weekly and monthly views",
            "businessValue": "Faster reporting",
            "taskDueDate": "2024-09-15T00:00:00Z",
            "acceptanceCriteria": [{"value": "Weekly view"}],
            "subtasks": [{"value": "Pick chart lib"}]
        });
        let created = create(&app, body.clone()).await;
        let id = created["taskId"].as_str().unwrap();
        let (_, fetched) = call(&app, Method::GET, &format!("/api/{id}"), None).await;
        let fetched = &fetched["data"];
        assert_eq!(fetched, &created);

        for key in [
            "name", "taskDetails", "taskType", "taskPriority", "project", "taskAssignee",
            "status", "description", "businessValue",
        ] {
            assert_eq!(fetched[key], body[key], "{key}");
        }
        let due: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(fetched["taskDueDate"].clone()).unwrap();
        assert_eq!(due.to_rfc3339(), "2024-09-15T00:00:00+00:00");
        assert_eq!(fetched["acceptanceCriteria"][0]["value"], "Weekly view");
        assert_eq!(fetched["subtasks"][0]["value"], "Pick chart lib");
    }

    #[tokio::test]
    async fn test_malformed_body_is_reported() {
        let app = app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ nope"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let env: Envelope<Task> = serde_json::from_slice(&bytes).unwrap();
        assert!(!env.success);
        assert_eq!(env.message, "Failed to create task");
        assert!(env.error.is_some());
    }

    #[tokio::test]
    async fn test_failure_envelope_decodes_without_data() {
        let app = app();
        let (_, res) = call(&app, Method::GET, "/api/nope", None).await;
        let env: Envelope<Task> = serde_json::from_value(res).unwrap();
        assert!(!env.success);
        assert_eq!(env.message, "Task not found");
        assert_eq!(env.data, None);
        assert_eq!(env.error, None);
    }

    #[tokio::test]
    async fn test_update_rejects_null_name_and_status() {
        let app = app();
        let task = create(&app, json!({"name": "keep", "status": "Review"})).await;
        let uri = format!("/api/{}", task["taskId"].as_str().unwrap());

        let (status, res) = call(&app, Method::PUT, &uri, Some(json!({"name": null}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res["message"], "Failed to update task");
        assert!(res["error"].as_str().unwrap().contains("Path `name` is required"));

        let (status, res) = call(&app, Method::PUT, &uri, Some(json!({"status": null}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res["error"].as_str().unwrap().contains("`status`"));

        let (_, fetched) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(fetched["data"]["name"], "keep");
        assert_eq!(fetched["data"]["status"], "Review");
    }

    #[tokio::test]
    async fn test_encoded_item_ids_reach_the_right_entry() {
        let app = app();
        let task = create(
            &app,
            json!({
                "name": "Reserved",
                "acceptanceCriteria": [
                    {"criteriaId": "c#1", "value": "hash"},
                    {"criteriaId": "c?2", "value": "query"}
                ]
            }),
        )
        .await;
        let id = task["taskId"].as_str().unwrap();
        let (status, res) =
            call(&app, Method::DELETE, &format!("/api/{id}/acceptance-criteria/c%231"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["data"]["acceptanceCriteria"], json!([{"criteriaId": "c?2", "value": "query"}]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("tasks.json").display());
        let app = build_router(AppState::new(DocumentStore::open(&url).unwrap()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                call(&app, Method::POST, "/api/", Some(json!({"name": format!("task {i}")}))).await.0
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
        }
        assert_eq!(DocumentStore::open(&url).unwrap().len(), 16);
    }
}
