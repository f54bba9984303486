//! Document store for task records.
//!
//! This module provides `DocumentStore`, the single task collection behind the
//! API. A store is opened from a connection string: `file://<path>` keeps the
//! collection in a JSON document file, `memory://` keeps it in process only.
//! Every operation touches one document and is applied atomically: the new
//! collection is written out before it replaces the in-memory one.
//! Calls block, file writes included, so async callers run them on a blocking thread.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{new_id, Task, TaskPayload, ValidationError};

/// Failure reported by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt document file: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported store url '{0}' (expected file://<path> or memory://)")]
    UnsupportedUrl(String),
}

/// On-disk layout of a document file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
enum Backend {
    Memory,
    File(PathBuf),
}

/// The task collection.
#[derive(Debug)]
pub struct DocumentStore {
    backend: Backend,
    docs: RwLock<Vec<Task>>,
}

impl DocumentStore {
    /// Open a store from its connection string.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let url = url.trim();
        if url == "memory://" || url == "memory" {
            return Ok(Self::memory());
        }
        match url.strip_prefix("file://") {
            Some(path) if !path.is_empty() => Self::open_file(Path::new(path)),
            _ => Err(StoreError::UnsupportedUrl(url.to_string())),
        }
    }

    /// An empty in-process store.
    pub fn memory() -> Self {
        DocumentStore {
            backend: Backend::Memory,
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Open a document file, starting an empty collection if it does not exist yet.
    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        let tasks = if path.exists() {
            let mut buf = String::new();
            File::open(path)?.read_to_string(&mut buf)?;
            if buf.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str::<Collection>(&buf)?.tasks
            }
        } else {
            Vec::new()
        };
        Ok(DocumentStore {
            backend: Backend::File(path.to_path_buf()),
            docs: RwLock::new(tasks),
        })
    }

    /// Human-readable location, for logs.
    pub fn location(&self) -> String {
        match &self.backend {
            Backend::Memory => "memory://".to_string(),
            Backend::File(path) => format!("file://{}", path.display()),
        }
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Insert a new task built from a create payload.
    pub fn insert(&self, payload: TaskPayload) -> Result<Task, StoreError> {
        let mut docs = self.docs.write();
        let mut task = Task::from_payload(new_id(), payload, Utc::now())?;
        while docs.iter().any(|t| t.task_id == task.task_id) {
            task.task_id = new_id();
        }
        let mut next = docs.clone();
        next.push(task.clone());
        self.commit(&mut docs, next)?;
        Ok(task)
    }

    /// Every task in insertion order.
    pub fn find_all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.docs.read().clone())
    }

    /// Look up one task by its public id.
    pub fn find_one(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.docs.read().iter().find(|t| t.task_id == task_id).cloned())
    }

    /// Apply a full update and return the updated document, or `None` if no task matched.
    pub fn find_one_and_update(
        &self,
        task_id: &str,
        payload: TaskPayload,
    ) -> Result<Option<Task>, StoreError> {
        self.modify(task_id, |task| {
            *task = task.updated_with(payload, Utc::now())?;
            Ok(true)
        })
    }

    /// Remove a task and return it, or `None` if no task matched.
    pub fn find_one_and_delete(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let mut docs = self.docs.write();
        let Some(idx) = docs.iter().position(|t| t.task_id == task_id) else {
            return Ok(None);
        };
        let mut next = docs.clone();
        let removed = next.remove(idx);
        self.commit(&mut docs, next)?;
        Ok(Some(removed))
    }

    /// Remove one acceptance criterion from a task. Returns the task as it now
    /// stands, whether or not a criterion matched, or `None` if no task matched.
    pub fn pull_criterion(
        &self,
        task_id: &str,
        criteria_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        self.modify(task_id, |task| Ok(task.pull_criterion(criteria_id, Utc::now())))
    }

    /// Remove one subtask from a task. Same contract as `pull_criterion`.
    pub fn pull_subtask(&self, task_id: &str, subtask_id: &str) -> Result<Option<Task>, StoreError> {
        self.modify(task_id, |task| Ok(task.pull_subtask(subtask_id, Utc::now())))
    }

    /// Run `f` against a copy of the matching task and commit it if `f` reports a change.
    fn modify<F>(&self, task_id: &str, f: F) -> Result<Option<Task>, StoreError>
    where
        F: FnOnce(&mut Task) -> Result<bool, StoreError>,
    {
        let mut docs = self.docs.write();
        let Some(idx) = docs.iter().position(|t| t.task_id == task_id) else {
            return Ok(None);
        };
        let mut task = docs[idx].clone();
        if !f(&mut task)? {
            return Ok(Some(task));
        }
        let mut next = docs.clone();
        next[idx] = task.clone();
        self.commit(&mut docs, next)?;
        Ok(Some(task))
    }

    /// Persist `next` and only then make it the live collection.
    fn commit(&self, docs: &mut Vec<Task>, next: Vec<Task>) -> Result<(), StoreError> {
        if let Backend::File(path) = &self.backend {
            save(path, &next)?;
        }
        *docs = next;
        Ok(())
    }
}

/// Write the collection using atomic write (temp file + rename).
fn save(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    #[derive(Serialize)]
    struct CollectionRef<'a> {
        tasks: &'a [Task],
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_string_pretty(&CollectionRef { tasks })?;
    let mut f = File::create(&tmp)?;
    f.write_all(data.as_bytes())?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;
    use crate::task::CriterionInput;

    fn named(name: &str) -> TaskPayload {
        TaskPayload {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_rejects_unknown_scheme() {
        let err = DocumentStore::open("mongodb://localhost/tasks").unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedUrl(_)));
        assert!(DocumentStore::open("file://").is_err());
        assert!(DocumentStore::open("memory://").is_ok());
    }

    #[test]
    fn test_insert_generates_unique_ids() {
        let store = DocumentStore::memory();
        let a = store.insert(named("a")).unwrap();
        let b = store.insert(named("b")).unwrap();
        assert_ne!(a.task_id, b.task_id);
        assert_ne!(a.row_id, b.row_id);
        assert_eq!(a.status, Status::Todo);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_validation_failure_stores_nothing() {
        let store = DocumentStore::memory();
        let err = store.insert(TaskPayload::default()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_ids_return_none() {
        let store = DocumentStore::memory();
        store.insert(named("present")).unwrap();
        assert!(store.find_one("nope").unwrap().is_none());
        assert!(store.find_one_and_delete("nope").unwrap().is_none());
        assert!(store.find_one_and_update("nope", named("x")).unwrap().is_none());
        assert!(store.pull_criterion("nope", "c").unwrap().is_none());
        assert!(store.pull_subtask("nope", "s").unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_then_find_returns_new_values() {
        let store = DocumentStore::memory();
        let task = store.insert(named("before")).unwrap();
        let updated = store
            .find_one_and_update(&task.task_id, TaskPayload { status: Some(Status::Done), ..named("after") })
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "after");
        let fetched = store.find_one(&task.task_id).unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[test]
    fn test_failed_update_leaves_document_untouched() {
        let store = DocumentStore::memory();
        let task = store.insert(named("keep")).unwrap();
        let err = store.find_one_and_update(&task.task_id, named(" ")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.find_one(&task.task_id).unwrap().unwrap(), task);
    }

    #[test]
    fn test_pull_criterion_is_idempotent() {
        let store = DocumentStore::memory();
        let mut payload = named("with criteria");
        payload.acceptance_criteria = Some(vec![
            CriterionInput { criteria_id: None, value: "one".into() },
            CriterionInput { criteria_id: None, value: "two".into() },
        ]);
        let task = store.insert(payload).unwrap();
        let target = task.acceptance_criteria[0].criteria_id.clone();

        let first = store.pull_criterion(&task.task_id, &target).unwrap().unwrap();
        assert_eq!(first.acceptance_criteria, task.acceptance_criteria[1..].to_vec());
        assert_eq!(first.name, task.name);

        let second = store.pull_criterion(&task.task_id, &target).unwrap().unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_list_after_three_creates_and_one_delete() {
        let store = DocumentStore::memory();
        let a = store.insert(named("a")).unwrap();
        let b = store.insert(named("b")).unwrap();
        let c = store.insert(named("c")).unwrap();
        let deleted = store.find_one_and_delete(&b.task_id).unwrap().unwrap();
        assert_eq!(deleted, b);
        let remaining: Vec<String> = store.find_all().unwrap().into_iter().map(|t| t.task_id).collect();
        assert_eq!(remaining, vec![a.task_id, c.task_id]);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tasks.json");
        let url = format!("file://{}", path.display());

        let store = DocumentStore::open(&url).unwrap();
        let kept = store.insert(named("kept")).unwrap();
        let gone = store.insert(named("gone")).unwrap();
        store.find_one_and_delete(&gone.task_id).unwrap();
        drop(store);

        let reopened = DocumentStore::open(&url).unwrap();
        assert_eq!(reopened.find_all().unwrap(), vec![kept]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();
        let err = DocumentStore::open_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
