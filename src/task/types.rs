use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local lifecycle state of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Map the remote API's status vocabulary onto the local enum.
    ///
    /// `SUCCESS` is completed, `FAILURE`/`FAILED` is failed, and anything
    /// else (including `IN_PROGRESS` or a value we have never seen) is
    /// still pending.
    pub fn from_remote(status: Option<&str>) -> Self {
        match status {
            Some("SUCCESS") => TaskStatus::Completed,
            Some("FAILURE") | Some("FAILED") => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generation task as tracked locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeoTask {
    /// Remote task id, unique within the store
    pub id: String,
    pub status: TaskStatus,
    /// Model id the task was submitted with
    pub model: String,
    /// Prompt text as the user entered it
    pub prompt: String,
    /// Prompt rewritten by the remote side at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// UI selection flag for batch deletion. Not part of reconciliation.
    #[serde(default)]
    pub selected: bool,
}

impl VeoTask {
    /// Create a freshly submitted task in the pending state.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        enhanced_prompt: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            model: model.into(),
            prompt: prompt.into(),
            enhanced_prompt: enhanced_prompt.filter(|p| !p.is_empty()),
            video_url: None,
            created_at: now,
            updated_at: now,
            selected: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Merge a partial update into this task.
    ///
    /// Fields the update leaves unset are untouched, and an empty video URL
    /// never replaces a stored one.
    pub fn apply(&mut self, update: &TaskUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(url) = update.video_url.as_deref().filter(|u| !u.is_empty()) {
            self.video_url = Some(url.to_string());
        }
        self.updated_at = update.updated_at;
    }
}

/// Partial field update for one task, produced by a reconciliation pass.
///
/// The timestamp travels with the update so applying the same update twice
/// leaves the task in the same state.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub video_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskUpdate {
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            video_url: None,
            updated_at,
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(TaskStatus::from_remote(Some("SUCCESS")), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_remote(Some("FAILURE")), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_remote(Some("FAILED")), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_remote(Some("IN_PROGRESS")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_remote(Some("NOT_START")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_remote(Some("success")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_remote(None), TaskStatus::Pending);
    }

    #[test]
    fn test_apply_keeps_video_url_when_update_has_none() {
        let mut task = VeoTask::new("t1", "veo3", "a cat", None);
        let t1 = task.created_at + Duration::seconds(1);
        task.apply(
            &TaskUpdate::new(t1)
                .status(TaskStatus::Completed)
                .video_url("https://x/video.mp4"),
        );

        let t2 = t1 + Duration::seconds(1);
        task.apply(&TaskUpdate::new(t2).status(TaskStatus::Pending));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.video_url.as_deref(), Some("https://x/video.mp4"));

        task.apply(&TaskUpdate::new(t2).video_url(""));
        assert_eq!(task.video_url.as_deref(), Some("https://x/video.mp4"));
        assert_eq!(task.prompt, "a cat");
        assert_eq!(task.updated_at, t2);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut task = VeoTask::new("t1", "veo3", "a cat", Some("a cat, cinematic".into()));
        task.video_url = Some("https://x/v.mp4".into());

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["enhancedPrompt"], "a cat, cinematic");
        assert_eq!(value["videoUrl"], "https://x/v.mp4");
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["selected"], false);

        let back: VeoTask = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }
}
