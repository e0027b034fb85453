use crate::error::{ChatError, IngestError};
use crate::models::ChatMessage;
use crate::traits::{CompletionByteStream, CompletionProvider, EmbeddingClient};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(120);
const COMPLETION_TEMPERATURE: f64 = 0.2;

/// Client for an OpenAI-compatible API: streaming chat completions plus
/// batch embeddings.
///
/// Only a connect timeout is set on the shared client so long completion
/// streams are not cut off; the embeddings call carries its own
/// whole-request timeout.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    chat_model: String,
    embed_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embed_model: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn open_stream(&self, messages: &[ChatMessage]) -> Result<CompletionByteStream, ChatError> {
        let body = json!({
            "model": self.chat_model,
            "stream": true,
            "temperature": COMPLETION_TEMPERATURE,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| ChatError::Completion(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Completion(format!("{status} {text}")));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|error| ChatError::Completion(error.to_string())));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Option<Vec<f32>>>, IngestError> {
        let body = json!({
            "model": self.embed_model,
            "input": inputs,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .timeout(EMBEDDING_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(IngestError::Embedding(format!("{status} {text}")));
        }

        let parsed: Value = response.json().await?;
        let data = parsed
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(data
            .iter()
            .map(|entry| {
                entry
                    .pointer("/embedding")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_f64)
                            .map(|value| value as f32)
                            .collect()
                    })
            })
            .collect())
    }
}
