//! veo-studio - local task tracker for an asynchronous video-generation API.

use tracing_subscriber::EnvFilter;

use veo_studio::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("veo_studio=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        working_dir = %config.working_dir.display(),
        poll_interval = ?config.poll_interval,
        "Starting veo-studio"
    );

    api::serve(config).await
}
