//! Status reconciliation.
//!
//! A [`Reconciler`] runs one pass at a time: it picks the tasks to check,
//! queries the feed endpoint for all of them concurrently, waits for every
//! lookup to settle, and merges the resulting changes into the task store as
//! a single batch.
//!
//! The first pass after construction (or after [`Reconciler::reset`]) checks
//! every task, which refreshes expiring video URLs and catches status changes
//! missed while the client was not running. Later passes only check tasks
//! that are still pending.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::settings::Connection;
use crate::task::{SharedTaskStore, TaskStatus, TaskUpdate, VeoTask};
use crate::veo::{FeedResponse, VeoApi};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Tasks queried
    pub checked: usize,
    /// Tasks whose local record changed
    pub updated: usize,
    /// Lookups that failed and will be retried next pass
    pub failed: usize,
}

/// Decide what, if anything, should change locally for `task` given a feed response.
///
/// A task is updated when the mapped status differs from the local one, or
/// when the task is completed and the response carries a different video URL.
/// The video URL is only taken for completed tasks.
pub fn plan_update(task: &VeoTask, feed: &FeedResponse, now: DateTime<Utc>) -> Option<TaskUpdate> {
    let status = TaskStatus::from_remote(feed.task_status());
    let video_url = feed.video_url();

    let status_changed = status != task.status;
    let url_changed = status == TaskStatus::Completed
        && video_url.is_some()
        && video_url != task.video_url.as_deref();

    if !status_changed && !url_changed {
        return None;
    }

    let mut update = TaskUpdate::new(now).status(status);
    if status == TaskStatus::Completed {
        if let Some(url) = video_url {
            update = update.video_url(url);
        }
    }
    Some(update)
}

/// Runs reconciliation passes against the task store.
pub struct Reconciler {
    store: SharedTaskStore,
    api: Arc<dyn VeoApi>,
    first_pass_done: bool,
}

impl Reconciler {
    pub fn new(store: SharedTaskStore, api: Arc<dyn VeoApi>) -> Self {
        Self {
            store,
            api,
            first_pass_done: false,
        }
    }

    /// Make the next pass check every task again.
    pub fn reset(&mut self) {
        self.first_pass_done = false;
    }

    /// Whether the next pass will check every task.
    pub fn is_first_pass(&self) -> bool {
        !self.first_pass_done
    }

    /// Snapshot of the tasks the next pass should query.
    async fn tasks_to_check(&self) -> Vec<VeoTask> {
        let tasks = self.store.list().await;
        if self.first_pass_done {
            tasks.into_iter().filter(VeoTask::is_pending).collect()
        } else {
            tasks
        }
    }

    /// Run one pass.
    ///
    /// Lookup failures are logged and skipped; they never fail the pass.
    pub async fn run_pass(&mut self, conn: &Connection) -> PassReport {
        let tasks = self.tasks_to_check().await;
        let full = !self.first_pass_done;

        if tasks.is_empty() {
            self.first_pass_done = true;
            return PassReport::default();
        }

        tracing::debug!(count = tasks.len(), full, "Checking task status");

        let lookups = tasks.iter().map(|task| {
            let api = Arc::clone(&self.api);
            async move { (task, api.feed(conn, &task.id).await) }
        });
        let results = join_all(lookups).await;

        let now = Utc::now();
        let mut report = PassReport {
            checked: tasks.len(),
            ..PassReport::default()
        };
        let mut updates: HashMap<String, TaskUpdate> = HashMap::new();

        for (task, result) in results {
            match result {
                Ok(feed) => {
                    if let Some(update) = plan_update(task, &feed, now) {
                        if update.status == Some(TaskStatus::Failed) {
                            tracing::info!(
                                task_id = %task.id,
                                reason = feed.fail_reason().unwrap_or("unknown"),
                                "Task failed remotely"
                            );
                        }
                        updates.insert(task.id.clone(), update);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(task_id = %task.id, error = %e, "Error polling task");
                }
            }
        }

        report.updated = self.store.apply_updates(&updates).await;
        self.first_pass_done = true;

        if report.updated > 0 {
            tracing::info!(updated = report.updated, "Merged task status updates");
        }
        report
    }
}
