//! Client for the remote video-generation API.
//!
//! Two endpoints are used:
//! - `POST {base}/veo/v1/generate` submits a prompt and returns a task id
//! - `GET {base}/veo/v1/feed/{id}` reports the task's status and result
//!
//! The [`VeoApi`] trait is the seam the rest of the crate talks to, so the
//! reconciliation loop and the generation flow can run against a fake.

mod client;
mod error;

pub use client::VeoClient;
pub use error::VeoError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::settings::Connection;

/// Model ids offered to users. The core treats models as opaque strings.
pub const MODELS: &[&str] = &[
    "veo3.1",
    "veo3.1-pro",
    "veo3.1-components",
    "veo2",
    "veo2-fast",
    "veo2-fast-components",
    "veo2-fast-frames",
    "veo2-pro",
    "veo3",
    "veo3-fast",
    "veo3-fast-frames",
    "veo3-frames",
    "veo3-pro",
    "veo3-pro-frames",
];

pub const DEFAULT_MODEL: &str = "veo3.1";

/// Body of a generation request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub enhance_prompt: bool,
    /// Reference images as data URIs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Response to an accepted generation request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GenerateResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub enhanced_prompt: Option<String>,
}

/// Response of the task feed endpoint.
///
/// Every field is optional; a missing status simply classifies as pending.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedResponse {
    /// Provider result code; some deployments send a number here
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<FeedData>,
}

/// Task-level wrapper inside a feed response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedData {
    #[serde(default)]
    pub task_id: Option<String>,
    /// `SUCCESS`, `FAILURE`, `IN_PROGRESS`, ...
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub fail_reason: Option<String>,
    /// Progress as reported, e.g. `"40%"`
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<FeedResult>,
}

/// Generation result nested inside [`FeedData`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl FeedResponse {
    /// Status used for classification: the task wrapper's status, falling
    /// back to a top-level one.
    pub fn task_status(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.status.as_deref())
            .or(self.status.as_deref())
    }

    /// Non-empty video URL from the nested result, if any.
    pub fn video_url(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.data.as_ref())
            .and_then(|r| r.video_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    pub fn fail_reason(&self) -> Option<&str> {
        let data = self.data.as_ref()?;
        data.fail_reason
            .as_deref()
            .or_else(|| data.data.as_ref().and_then(|r| r.error.as_deref()))
    }
}

/// Remote video API operations.
#[async_trait]
pub trait VeoApi: Send + Sync {
    /// Submit a generation request.
    async fn generate(
        &self,
        conn: &Connection,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, VeoError>;

    /// Fetch the current state of one task.
    async fn feed(&self, conn: &Connection, task_id: &str) -> Result<FeedResponse, VeoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_response_nested_fields() {
        let raw = r#"{
            "code": "success",
            "message": "",
            "data": {
                "task_id": "t1",
                "status": "SUCCESS",
                "progress": "100%",
                "data": { "status": "completed", "video_url": "https://x/video.mp4" }
            }
        }"#;
        let feed: FeedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(feed.task_status(), Some("SUCCESS"));
        assert_eq!(feed.video_url(), Some("https://x/video.mp4"));
    }

    #[test]
    fn test_feed_response_falls_back_to_top_level_status() {
        let raw = r#"{ "status": "FAILURE", "data": { "fail_reason": "nsfw" } }"#;
        let feed: FeedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(feed.task_status(), Some("FAILURE"));
        assert_eq!(feed.video_url(), None);
        assert_eq!(feed.fail_reason(), Some("nsfw"));
    }

    #[test]
    fn test_feed_response_tolerates_missing_fields() {
        let feed: FeedResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(feed.task_status(), None);

        let raw = r#"{ "data": { "status": "SUCCESS", "data": { "video_url": "" } } }"#;
        let feed: FeedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(feed.video_url(), None);
    }

    #[test]
    fn test_generate_request_omits_empty_images() {
        let req = GenerateRequest {
            prompt: "a cat".into(),
            model: "veo3".into(),
            enhance_prompt: true,
            images: vec![],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["enhance_prompt"], true);
        assert!(value.get("images").is_none());
    }
}
