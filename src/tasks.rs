//! Ingestion task progress registry.
//!
//! Owned by the API layer: coordinators only ever see a progress callback.
//! Entries are evicted a fixed time after their last touch, so a finished
//! (or abandoned) task stays pollable for a while and then disappears
//! instead of accumulating for the life of the process.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Transcoding,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskState {
    pub status: TaskStatus,
    pub progress: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    touched: Instant,
}

#[derive(Debug)]
pub struct TaskRegistry {
    ttl: Duration,
    tasks: Mutex<HashMap<String, TaskState>>,
}

impl TaskRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new task and return its identifier.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let mut tasks = self.tasks.lock().unwrap();
        Self::evict_expired(&mut tasks, self.ttl);
        tasks.insert(
            id.clone(),
            TaskState {
                status: TaskStatus::Processing,
                progress: 0,
                error: None,
                touched: Instant::now(),
            },
        );
        id
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) {
        self.touch(id, |state| state.status = status);
    }

    pub fn set_progress(&self, id: &str, progress: u32) {
        self.touch(id, |state| state.progress = progress.min(100));
    }

    pub fn complete(&self, id: &str) {
        self.touch(id, |state| {
            state.status = TaskStatus::Completed;
            state.progress = 100;
        });
    }

    pub fn fail(&self, id: &str, message: String) {
        self.touch(id, |state| {
            state.status = TaskStatus::Failed;
            state.error = Some(message);
        });
    }

    pub fn get(&self, id: &str) -> Option<TaskState> {
        let mut tasks = self.tasks.lock().unwrap();
        Self::evict_expired(&mut tasks, self.ttl);
        tasks.get(id).cloned()
    }

    fn touch(&self, id: &str, apply: impl FnOnce(&mut TaskState)) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(state) = tasks.get_mut(id) {
            apply(state);
            state.touched = Instant::now();
        }
    }

    fn evict_expired(tasks: &mut HashMap<String, TaskState>, ttl: Duration) {
        tasks.retain(|_, state| state.touched.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_processing_to_completed() {
        let registry = TaskRegistry::new(Duration::from_secs(60));
        let id = registry.create();

        let state = registry.get(&id).unwrap();
        assert_eq!(state.status, TaskStatus::Processing);
        assert_eq!(state.progress, 0);

        registry.set_status(&id, TaskStatus::Transcoding);
        registry.set_progress(&id, 42);
        let state = registry.get(&id).unwrap();
        assert_eq!(state.status, TaskStatus::Transcoding);
        assert_eq!(state.progress, 42);

        registry.complete(&id);
        let state = registry.get(&id).unwrap();
        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn test_failure_keeps_the_message() {
        let registry = TaskRegistry::new(Duration::from_secs(60));
        let id = registry.create();
        registry.fail(&id, "encoder failed: boom".into());

        let state = registry.get(&id).unwrap();
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("encoder failed: boom"));
    }

    #[test]
    fn test_progress_is_clamped() {
        let registry = TaskRegistry::new(Duration::from_secs(60));
        let id = registry.create();
        registry.set_progress(&id, 250);
        assert_eq!(registry.get(&id).unwrap().progress, 100);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let registry = TaskRegistry::new(Duration::from_millis(10));
        let id = registry.create();
        registry.complete(&id);

        std::thread::sleep(Duration::from_millis(25));
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_unknown_id_is_none() {
        let registry = TaskRegistry::new(Duration::from_secs(60));
        assert!(registry.get("nope").is_none());
    }
}
