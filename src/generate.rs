//! Generation request flow.
//!
//! Submits a prompt (and optional reference images) to the remote API and
//! records the resulting task. Only one submission may be outstanding at a
//! time; further submissions are rejected until it settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::settings::SharedSettingsStore;
use crate::task::{SharedTaskStore, VeoTask};
use crate::veo::{GenerateRequest, VeoApi, VeoError, DEFAULT_MODEL};

/// Prompt label stored for tasks submitted with images only.
pub const IMAGE_ONLY_PROMPT: &str = "图片转视频 (Image to Video)";

/// A user's generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Reference images as `data:<mime>;base64,<payload>` URIs
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_enhance")]
    pub enhance_prompt: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_enhance() -> bool {
    true
}

impl SubmitRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            images: Vec::new(),
            enhance_prompt: true,
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    fn has_content(&self) -> bool {
        !self.prompt.trim().is_empty() || !self.images.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no API endpoint configured")]
    NotConfigured,

    #[error("a prompt or at least one reference image is required")]
    EmptyRequest,

    #[error("invalid reference image #{index}: {reason}")]
    InvalidImage { index: usize, reason: String },

    #[error("a generation request is already in flight")]
    Busy,

    #[error(transparent)]
    Remote(#[from] VeoError),

    #[error("remote API returned task id {0}, which is already recorded")]
    DuplicateId(String),
}

/// Check that `uri` is a base64 data URI.
fn validate_image(uri: &str) -> Result<(), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "expected a data: URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "missing ',' separator".to_string())?;

    if !meta.ends_with(";base64") {
        return Err("payload must be base64 encoded".to_string());
    }
    if payload.is_empty() {
        return Err("empty payload".to_string());
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map(|_| ())
        .map_err(|e| format!("bad base64 payload: {}", e))
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Submits generation requests and records the created tasks.
pub struct Generator {
    store: SharedTaskStore,
    settings: SharedSettingsStore,
    api: Arc<dyn VeoApi>,
    in_flight: AtomicBool,
}

impl Generator {
    pub fn new(store: SharedTaskStore, settings: SharedSettingsStore, api: Arc<dyn VeoApi>) -> Self {
        Self {
            store,
            settings,
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a submission is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit a request and add the resulting task to the store.
    ///
    /// Nothing is added to the store unless the remote API accepts the request.
    pub async fn submit(&self, request: SubmitRequest) -> Result<VeoTask, SubmitError> {
        let conn = self
            .settings
            .get()
            .await
            .connection()
            .ok_or(SubmitError::NotConfigured)?;

        if !request.has_content() {
            return Err(SubmitError::EmptyRequest);
        }

        for (index, image) in request.images.iter().enumerate() {
            validate_image(image).map_err(|reason| SubmitError::InvalidImage { index, reason })?;
        }

        let _guard = InFlight::acquire(&self.in_flight).ok_or(SubmitError::Busy)?;

        let body = GenerateRequest {
            prompt: request.prompt.clone(),
            model: request.model.clone(),
            enhance_prompt: request.enhance_prompt,
            images: request.images,
        };

        let response = self.api.generate(&conn, &body).await.map_err(|e| {
            tracing::error!(model = %body.model, "Generation request failed: {}", e);
            SubmitError::from(e)
        })?;

        let prompt = if request.prompt.trim().is_empty() {
            IMAGE_ONLY_PROMPT.to_string()
        } else {
            request.prompt
        };

        let task = VeoTask::new(response.id, request.model, prompt, response.enhanced_prompt);
        if !self.store.create(task.clone()).await {
            return Err(SubmitError::DuplicateId(task.id));
        }
        Ok(task)
    }
}
