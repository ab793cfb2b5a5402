use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use super::types::{TaskStatus, TaskUpdate, VeoTask};
use crate::storage::{SharedStorage, TASKS_KEY};

/// Ordered, persisted collection of generation tasks (newest first).
///
/// Every mutation is written to storage while the write lock is still held,
/// so readers never see a state that was not also handed to storage, and a
/// batch of updates becomes visible all at once.
pub struct TaskStore {
    tasks: RwLock<Vec<VeoTask>>,
    storage: SharedStorage,
    /// Bumped whenever a task is added or removed.
    membership: watch::Sender<u64>,
}

impl TaskStore {
    /// Create a store, loading any previously saved tasks.
    ///
    /// An absent or unreadable saved collection yields an empty store.
    pub fn new(storage: SharedStorage) -> Self {
        let tasks = Self::load(&storage);
        let (membership, _) = watch::channel(0);

        Self {
            tasks: RwLock::new(tasks),
            storage,
            membership,
        }
    }

    fn load(storage: &SharedStorage) -> Vec<VeoTask> {
        let raw = match storage.load(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read saved tasks: {}, starting empty", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<VeoTask>>(&raw) {
            Ok(mut tasks) => {
                // Keep the first occurrence if a saved blob carries duplicate ids
                let mut seen = std::collections::HashSet::new();
                tasks.retain(|t| seen.insert(t.id.clone()));
                tracing::info!("Loaded {} saved tasks", tasks.len());
                tasks
            }
            Err(e) => {
                tracing::warn!("Saved tasks are malformed: {}, starting empty", e);
                Vec::new()
            }
        }
    }

    fn persist(&self, tasks: &[VeoTask]) {
        let contents = match serde_json::to_string(tasks) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to serialize tasks: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.save(TASKS_KEY, &contents) {
            tracing::error!("Failed to save tasks: {}", e);
        }
    }

    fn notify_membership(&self) {
        self.membership.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Receiver that changes whenever a task is added or removed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.membership.subscribe()
    }

    pub async fn list(&self) -> Vec<VeoTask> {
        self.tasks.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<VeoTask> {
        let tasks = self.tasks.read().await;
        tasks.iter().find(|t| t.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    pub async fn selected_count(&self) -> usize {
        let tasks = self.tasks.read().await;
        tasks.iter().filter(|t| t.selected).count()
    }

    /// Insert a new task at the front with `Pending` status.
    ///
    /// Returns false, leaving the store untouched, if the id is already present.
    pub async fn create(&self, mut task: VeoTask) -> bool {
        task.status = TaskStatus::Pending;
        {
            let mut tasks = self.tasks.write().await;
            if tasks.iter().any(|t| t.id == task.id) {
                tracing::warn!(task_id = %task.id, "Refusing to add duplicate task");
                return false;
            }

            tracing::info!(task_id = %task.id, model = %task.model, "Task created");
            tasks.insert(0, task);
            self.persist(&tasks);
        }

        self.notify_membership();
        true
    }

    /// Remove one task. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> bool {
        let existed = {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            let existed = tasks.len() != before;
            if existed {
                self.persist(&tasks);
            }
            existed
        };

        if existed {
            tracing::info!(task_id = %id, "Task deleted");
            self.notify_membership();
        }

        existed
    }

    /// Remove every selected task. Returns how many were removed.
    ///
    /// Callers are expected to have confirmed the batch delete with the user.
    pub async fn delete_selected(&self) -> usize {
        let removed = {
            let mut tasks = self.tasks.write().await;
            let before = tasks.len();
            tasks.retain(|t| !t.selected);
            let removed = before - tasks.len();
            if removed > 0 {
                self.persist(&tasks);
            }
            removed
        };

        if removed > 0 {
            tracing::info!("Deleted {} selected tasks", removed);
            self.notify_membership();
        }

        removed
    }

    /// Flip the selection flag of one task.
    ///
    /// Returns the new flag, or `None` if the task does not exist. Does not
    /// touch `updated_at`.
    pub async fn toggle_selected(&self, id: &str) -> Option<bool> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.iter_mut().find(|t| t.id == id)?;
        task.selected = !task.selected;
        let selected = task.selected;
        self.persist(&tasks);
        Some(selected)
    }

    /// Merge a batch of per-task updates in one step.
    ///
    /// Ids that are no longer in the store are skipped. Returns the number of
    /// tasks that were updated.
    pub async fn apply_updates(&self, updates: &HashMap<String, TaskUpdate>) -> usize {
        if updates.is_empty() {
            return 0;
        }

        let mut tasks = self.tasks.write().await;
        let mut applied = 0;
        for task in tasks.iter_mut() {
            if let Some(update) = updates.get(&task.id) {
                task.apply(update);
                applied += 1;
            }
        }

        if applied > 0 {
            self.persist(&tasks);
        }

        applied
    }
}

/// Shared task store wrapped in Arc for concurrent access.
pub type SharedTaskStore = Arc<TaskStore>;
