use crate::error::ChatError;
use crate::models::{RetrievalMatch, RetrievalRequest};
use crate::traits::SnippetRetriever;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the ranked snippet provider.
#[derive(Clone)]
pub struct HttpSnippetRetriever {
    endpoint: String,
    api_key: Option<String>,
    bearer: Option<String>,
    client: Client,
}

impl HttpSnippetRetriever {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        bearer: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            bearer,
            client,
        })
    }
}

#[async_trait]
impl SnippetRetriever for HttpSnippetRetriever {
    async fn query(&self, request: &RetrievalRequest) -> Result<Vec<RetrievalMatch>, ChatError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("apikey", api_key);
        }
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Retrieval(format!("{status} {body}")));
        }

        // A response without a matches key is an empty result, not an error.
        let parsed: Value = response.json().await?;
        let matches = parsed
            .pointer("/matches")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(matches
            .iter()
            .enumerate()
            .map(|(position, raw)| RetrievalMatch::from_value(position, raw))
            .collect())
    }
}
