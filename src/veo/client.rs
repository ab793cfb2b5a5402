//! reqwest implementation of the remote video API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{FeedResponse, GenerateRequest, GenerateResponse, VeoApi, VeoError};
use crate::settings::Connection;

/// HTTP client for the video API.
///
/// Holds no endpoint of its own; every call takes the [`Connection`] to use,
/// so one client survives settings changes.
#[derive(Debug, Clone, Default)]
pub struct VeoClient {
    client: Client,
}

impl VeoClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Build a client on top of an existing reqwest client (shared pool, custom timeouts).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn generate_url(conn: &Connection) -> String {
        format!("{}/veo/v1/generate", conn.base_url)
    }

    fn feed_url(conn: &Connection, task_id: &str) -> String {
        format!(
            "{}/veo/v1/feed/{}",
            conn.base_url,
            urlencoding::encode(task_id)
        )
    }

    fn authorize(request: RequestBuilder, conn: &Connection) -> RequestBuilder {
        match conn.api_key.as_deref() {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Send a request and decode a successful JSON body.
    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, VeoError> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(VeoError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| VeoError::Decode { source, body })
    }
}

#[async_trait]
impl VeoApi for VeoClient {
    async fn generate(
        &self,
        conn: &Connection,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, VeoError> {
        tracing::debug!(
            model = %request.model,
            images = request.images.len(),
            "Submitting generation request"
        );

        let builder = self
            .client
            .post(Self::generate_url(conn))
            .header("Content-Type", "application/json")
            .json(request);

        Self::execute(Self::authorize(builder, conn)).await
    }

    async fn feed(&self, conn: &Connection, task_id: &str) -> Result<FeedResponse, VeoError> {
        let builder = self.client.get(Self::feed_url(conn, task_id));
        Self::execute(Self::authorize(builder, conn)).await
    }
}
