use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::collapse_whitespace;

/// One ingested row of source material, keyed by (`doc_name`, `chunk_index`).
///
/// Records are written whole and replaced whole on re-ingestion; they are
/// never patched field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub document_id: String,
    pub doc_name: String,
    pub uploaded_by: String,
    pub chunk_index: u64,
    pub date: String,
    pub label: String,
    pub source_name: String,
    pub source_link: String,
    pub influence_text: String,
    pub content: String,
    pub content_embedding: Option<Vec<f32>>,
    pub influence_embedding: Option<Vec<f32>>,
    pub date_uploaded: Option<String>,
}

/// A normalized row before document attribution and index assignment.
///
/// `chunk_index` stays `None` ("unset", distinct from 0) until the assigner
/// fills it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub chunk_index: Option<u64>,
    pub date: String,
    pub label: String,
    pub source_name: String,
    pub source_link: String,
    pub influence_text: String,
    pub content: String,
}

impl ChunkDraft {
    pub fn into_record(self, document_id: &str, doc_name: &str, uploaded_by: &str) -> ChunkRecord {
        ChunkRecord {
            document_id: document_id.to_string(),
            doc_name: doc_name.to_string(),
            uploaded_by: uploaded_by.to_string(),
            chunk_index: self.chunk_index.unwrap_or_default(),
            date: self.date,
            label: self.label,
            source_name: self.source_name,
            source_link: self.source_link,
            influence_text: self.influence_text,
            content: self.content,
            content_embedding: None,
            influence_embedding: None,
            date_uploaded: None,
        }
    }
}

/// A ranked snippet returned by the retrieval collaborator. Lives only for
/// the duration of one chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalMatch {
    /// 1-based position in the ranked list; used for numbering only.
    pub rank: usize,
    pub title: String,
    pub snippet_text: String,
}

impl RetrievalMatch {
    /// Builds a match from one raw collaborator object, applying the field
    /// fallback chains: title is `doc_name`, then `source_name`, then a
    /// synthesized `Source #n`; the snippet is `influence_text`, then
    /// `content`, trimmed with internal whitespace collapsed.
    pub fn from_value(position: usize, raw: &Value) -> Self {
        let rank = position + 1;
        let title = non_empty_str(raw, "doc_name")
            .or_else(|| non_empty_str(raw, "source_name"))
            .unwrap_or_else(|| format!("Source #{rank}"));
        let snippet = non_empty_str(raw, "influence_text")
            .or_else(|| non_empty_str(raw, "content"))
            .unwrap_or_default();

        Self {
            rank,
            title,
            snippet_text: collapse_whitespace(&snippet),
        }
    }
}

fn non_empty_str(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// One entry of the citation manifest surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub n: usize,
    pub title: String,
}

/// Output of the context budgeter: formatted blocks, the citations that
/// survived the budget, and the running character total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPacket {
    pub blocks: Vec<String>,
    pub citations: Vec<Citation>,
    pub used_chars: usize,
}

impl ContextPacket {
    pub fn context_text(&self) -> String {
        self.blocks.concat()
    }
}

/// One prompt message forwarded to the completion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Both,
    Content,
    Influence,
}

pub const DEFAULT_MATCH_COUNT: u32 = 6;
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.0;

/// Caller-tunable knobs for one retrieval query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    pub match_count: u32,
    pub match_threshold: f64,
    pub search_mode: SearchMode,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            match_count: DEFAULT_MATCH_COUNT,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            search_mode: SearchMode::Both,
        }
    }
}

/// Wire request sent to the retrieval collaborator.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    pub match_count: u32,
    pub match_threshold: f64,
    pub search_mode: SearchMode,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, options: RetrievalOptions) -> Self {
        Self {
            query: query.into(),
            match_count: options.match_count,
            match_threshold: options.match_threshold,
            search_mode: options.search_mode,
        }
    }
}

/// One unique document known to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentEntry {
    pub doc_name: String,
    pub uploaded_by: String,
}
