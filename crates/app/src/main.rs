mod auth;
mod routes;

use anyhow::Context;
use clap::Parser;
use rag_relay_core::{
    ChatOrchestrator, HttpSnippetRetriever, IngestPipeline, OpenAiClient, RestStore,
    SystemPromptCell,
};
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-relay-server", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Ranked snippet provider endpoint.
    #[arg(long, env = "RETRIEVAL_URL")]
    retrieval_url: String,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "COMPLETION_API_URL", default_value = "https://api.openai.com/v1")]
    completion_api_url: String,

    /// API key for the completion/embedding provider.
    #[arg(long, env = "COMPLETION_API_KEY")]
    completion_api_key: String,

    /// Chat completion model.
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,

    /// Embedding model used during ingestion.
    #[arg(long, env = "EMBED_MODEL", default_value = "text-embedding-3-small")]
    embed_model: String,

    /// Document store REST base URL.
    #[arg(long, env = "STORE_URL")]
    store_url: String,

    /// Anonymous API key forwarded as the `apikey` header.
    #[arg(long, env = "STORE_API_KEY")]
    store_api_key: Option<String>,

    /// Privileged bearer token for the store and retrieval endpoints.
    #[arg(long, env = "STORE_BEARER")]
    store_bearer: Option<String>,

    /// Secret used to verify session tokens.
    #[arg(long, env = "SESSION_SECRET", default_value = "dev_secret_change_me")]
    session_secret: String,

    /// Seconds between system prompt refreshes.
    #[arg(long, env = "SETTINGS_REFRESH_SECS", default_value = "60")]
    settings_refresh_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let retriever = HttpSnippetRetriever::new(
        &cli.retrieval_url,
        cli.store_api_key.clone(),
        cli.store_bearer.clone(),
    )
    .context("building retrieval client")?;
    let provider = OpenAiClient::new(
        &cli.completion_api_url,
        &cli.completion_api_key,
        &cli.chat_model,
        &cli.embed_model,
    )
    .context("building completion client")?;
    let store = RestStore::new(
        &cli.store_url,
        cli.store_api_key.clone(),
        cli.store_bearer.clone(),
    )
    .context("building store client")?;

    let prompt = SystemPromptCell::default();
    match prompt.refresh_from(&store).await {
        Ok(true) => info!(chars = prompt.current().len(), "loaded system prompt from store"),
        Ok(false) => warn!("stored system prompt empty; keeping built-in default"),
        Err(error) => warn!(%error, "could not fetch system prompt; keeping built-in default"),
    }
    spawn_prompt_refresh(prompt.clone(), store.clone(), cli.settings_refresh_secs);

    let orchestrator = ChatOrchestrator::new(retriever, provider.clone(), prompt);
    let pipeline = IngestPipeline::new(store.clone(), provider);

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        pipeline: Arc::new(pipeline),
        store,
        session_secret: Arc::from(cli.session_secret.as_str()),
    };

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(
        addr = %cli.bind,
        started_at = %chrono::Utc::now().to_rfc3339(),
        "rag-relay-server boot"
    );
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}

fn spawn_prompt_refresh(prompt: SystemPromptCell, store: RestStore, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // The boot path already refreshed once; skip the immediate tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match prompt.refresh_from(&store).await {
                Ok(true) => info!("system prompt refreshed from store"),
                Ok(false) => {}
                Err(error) => warn!(%error, "system prompt refresh failed"),
            }
        }
    });
}
