use crate::error::{ChatError, IngestError};
use crate::models::{ChatMessage, ChunkRecord, DocumentEntry, RetrievalMatch, RetrievalRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;

/// Byte stream handed back by the completion collaborator once it has
/// accepted a streaming request.
pub type CompletionByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Ranked snippet provider consulted once per chat request.
#[async_trait]
pub trait SnippetRetriever {
    /// An absent or empty match list is a successful, empty result.
    async fn query(&self, request: &RetrievalRequest) -> Result<Vec<RetrievalMatch>, ChatError>;
}

/// Token-streaming completion provider.
#[async_trait]
pub trait CompletionProvider {
    /// Returns the raw newline-delimited frame stream, or an error when the
    /// provider rejects the request.
    async fn open_stream(&self, messages: &[ChatMessage]) -> Result<CompletionByteStream, ChatError>;
}

/// Vector-batch embedding provider.
#[async_trait]
pub trait EmbeddingClient {
    /// One slot per input, aligned by index; a slot the provider leaves out
    /// comes back as `None`. Empty-string inputs are submitted like any
    /// other and callers never resize the result.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Option<Vec<f32>>>, IngestError>;
}

/// Filtered-collection interface over the relational document store.
#[async_trait]
pub trait DocumentStore {
    /// `document_id` of a prior upload of the same document, if any.
    async fn existing_document_id(&self, doc_name: &str) -> Result<Option<String>, IngestError>;

    /// Batch upsert keyed by (`doc_name`, `chunk_index`); a conflicting row
    /// is replaced whole. All-or-nothing from the caller's perspective:
    /// a non-success response means no record is considered committed.
    async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize, IngestError>;

    /// Unique (`doc_name`, `uploaded_by`) pairs, ordered by uploader then name.
    async fn list_documents(&self) -> Result<Vec<DocumentEntry>, ChatError>;

    /// Bulk delete by document name; returns the number of rows removed.
    async fn delete_document(&self, doc_name: &str) -> Result<u64, ChatError>;

    /// One named row from the settings collection.
    async fn fetch_setting(&self, name: &str) -> Result<Option<String>, ChatError>;
}
