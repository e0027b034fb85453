use crate::error::{ChatError, IngestError};
use crate::models::{ChunkRecord, DocumentEntry};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DOCUMENTS_TABLE: &str = "documents";
const SETTINGS_TABLE: &str = "project_settings";

/// Client for a PostgREST-style filtered collection interface: equality
/// filters in the query string, ordering, and merge-on-conflict inserts
/// keyed by an explicit column list.
#[derive(Clone)]
pub struct RestStore {
    base_url: String,
    api_key: Option<String>,
    bearer: Option<String>,
    client: Client,
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        bearer: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bearer,
            client,
        })
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}/{table}", self.base_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("apikey", api_key);
        }
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        }
        builder
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn existing_document_id(&self, doc_name: &str) -> Result<Option<String>, IngestError> {
        let url = self.table_url(
            DOCUMENTS_TABLE,
            &[
                ("select", "document_id".to_string()),
                ("doc_name", format!("eq.{doc_name}")),
                ("limit", "1".to_string()),
            ],
        )?;

        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Store(format!("document lookup failed: {status} {body}")));
        }

        let rows: Value = response.json().await?;
        Ok(rows
            .pointer("/0/document_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string))
    }

    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize, IngestError> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = self.table_url(
            DOCUMENTS_TABLE,
            &[("on_conflict", "doc_name,chunk_index".to_string())],
        )?;

        let response = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(records)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Store(format!("upsert rejected: {status} {body}")));
        }

        let rows: Value = response.json().await?;
        Ok(rows.as_array().map_or(records.len(), |rows| rows.len()))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentEntry>, ChatError> {
        let url = self.table_url(
            DOCUMENTS_TABLE,
            &[
                ("select", "doc_name,uploaded_by".to_string()),
                ("order", "uploaded_by.asc,doc_name.asc".to_string()),
            ],
        )?;

        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Store(format!("document list failed: {status} {body}")));
        }

        let rows: Value = response.json().await?;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for row in rows.as_array().into_iter().flatten() {
            let doc_name = row
                .pointer("/doc_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            if doc_name.is_empty() || !seen.insert(doc_name.clone()) {
                continue;
            }

            entries.push(DocumentEntry {
                doc_name,
                uploaded_by: row
                    .pointer("/uploaded_by")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(entries)
    }

    async fn delete_document(&self, doc_name: &str) -> Result<u64, ChatError> {
        let url = self.table_url(DOCUMENTS_TABLE, &[("doc_name", format!("eq.{doc_name}"))])?;

        let response = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Store(format!("delete failed: {status} {body}")));
        }

        let rows: Value = response.json().await?;
        Ok(rows.as_array().map_or(0, |deleted| deleted.len() as u64))
    }

    async fn fetch_setting(&self, name: &str) -> Result<Option<String>, ChatError> {
        let url = self.table_url(
            SETTINGS_TABLE,
            &[
                ("select", "setting_content".to_string()),
                ("setting_name", format!("eq.{name}")),
                ("limit", "1".to_string()),
            ],
        )?;

        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Store(format!("setting fetch failed: {status} {body}")));
        }

        let rows: Value = response.json().await?;
        Ok(rows
            .pointer("/0/setting_content")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
