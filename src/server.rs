//! API service bootstrap: router, configuration and the serve loop.

use axum::{
    routing::{delete, get},
    Router,
};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{self, AppState};
use crate::db::{DocumentStore, StoreError};

/// Server configuration, resolved from flags and environment by the CLI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            store_url: "file://tasks.json".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Build the router with every task route mounted under `/api`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(api::list_tasks).post(api::create_task))
        .route("/api/", get(api::list_tasks).post(api::create_task))
        .route(
            "/api/{task_id}",
            get(api::get_task).put(api::update_task).delete(api::delete_task),
        )
        .route(
            "/api/{task_id}/acceptance-criteria/{criteria_id}",
            delete(api::delete_criterion),
        )
        .route("/api/{task_id}/subtasks/{subtask_id}", delete(api::delete_subtask))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Open the store, bind the listener and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let store = match DocumentStore::open(&config.store_url) {
        Ok(store) => {
            tracing::info!(store = %store.location(), tasks = store.len(), "Database connected successfully");
            store
        }
        Err(e) => {
            tracing::error!(store = %config.store_url, error = %e, "Database connection failed");
            return Err(e.into());
        }
    };

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Server is running on http://{local_addr}");

    axum::serve(listener, build_router(AppState::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Serve a fresh in-memory API on an ephemeral port from a background thread.
#[cfg(test)]
pub(crate) fn spawn_test_server() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let app = build_router(AppState::new(DocumentStore::memory()));
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{addr}/api")
}
