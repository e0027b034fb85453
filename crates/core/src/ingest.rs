use crate::error::IngestError;
use crate::models::{ChunkDraft, ChunkRecord};
use crate::normalize::{assign_chunk_indices, normalize_row};
use crate::sheet::{parse_rows, render_delimited};
use crate::traits::{DocumentStore, EmbeddingClient};
use chrono::Utc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestAction {
    Preview,
    Upload,
}

impl IngestAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preview" => Some(Self::Preview),
            "upload" => Some(Self::Upload),
            _ => None,
        }
    }
}

/// One uploaded file plus its document attribution. A single request covers
/// exactly one document; callers serialize ingestion per `doc_name`.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub doc_name: String,
    pub uploaded_by: String,
}

/// Normalized, index-assigned rows plus a delimited-text rendering. No
/// embedding call and no store write happens for a preview.
#[derive(Debug, Clone)]
pub struct IngestPreview {
    pub document_id: String,
    pub rows: Vec<ChunkRecord>,
    pub rendered: String,
}

#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: String,
    pub written: usize,
}

struct Prepared {
    document_id: String,
    records: Vec<ChunkRecord>,
}

/// Ingestion pipeline: normalize rows, assign chunk indices, embed, upsert.
pub struct IngestPipeline<S, E> {
    store: S,
    embedder: E,
}

impl<S, E> IngestPipeline<S, E>
where
    S: DocumentStore + Send + Sync,
    E: EmbeddingClient + Send + Sync,
{
    pub fn new(store: S, embedder: E) -> Self {
        Self { store, embedder }
    }

    pub async fn preview(&self, request: &IngestRequest) -> Result<IngestPreview, IngestError> {
        let prepared = self.prepare(request).await?;
        let rendered = render_delimited(&prepared.records)?;
        Ok(IngestPreview {
            document_id: prepared.document_id,
            rows: prepared.records,
            rendered,
        })
    }

    /// Runs the full pipeline. Embedding happens in two index-aligned
    /// batches (content, then influence text); any embedding failure aborts
    /// before a single row is written.
    pub async fn upload(&self, request: &IngestRequest) -> Result<IngestReceipt, IngestError> {
        let prepared = self.prepare(request).await?;
        let mut records = prepared.records;

        let content_inputs: Vec<String> =
            records.iter().map(|record| record.content.clone()).collect();
        let influence_inputs: Vec<String> = records
            .iter()
            .map(|record| record.influence_text.clone())
            .collect();

        let content_vectors = self.embedder.embed_batch(&content_inputs).await?;
        let influence_vectors = self.embedder.embed_batch(&influence_inputs).await?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        for (position, record) in records.iter_mut().enumerate() {
            record.content_embedding = content_vectors.get(position).cloned().flatten();
            record.influence_embedding = if record.influence_text.trim().is_empty() {
                None
            } else {
                influence_vectors.get(position).cloned().flatten()
            };
            record.date_uploaded = Some(today.clone());
        }

        let written = self.store.upsert_chunks(&records).await?;
        Ok(IngestReceipt {
            document_id: prepared.document_id,
            written,
        })
    }

    async fn prepare(&self, request: &IngestRequest) -> Result<Prepared, IngestError> {
        if request.bytes.is_empty() {
            return Err(IngestError::InvalidInput("missing file".to_string()));
        }
        let doc_name = request.doc_name.trim();
        if doc_name.is_empty() {
            return Err(IngestError::InvalidInput("missing doc_name".to_string()));
        }
        let uploaded_by = request.uploaded_by.trim();
        if uploaded_by.is_empty() {
            return Err(IngestError::InvalidInput("missing uploaded_by".to_string()));
        }

        let raw_rows = parse_rows(&request.file_name, &request.bytes)?;
        let mut drafts: Vec<ChunkDraft> = raw_rows.iter().filter_map(normalize_row).collect();
        if drafts.is_empty() {
            return Err(IngestError::InvalidInput(
                "no rows found in spreadsheet".to_string(),
            ));
        }

        assign_chunk_indices(&mut drafts);

        // One document_id per document name, stable across re-uploads.
        let document_id = match self.store.existing_document_id(doc_name).await? {
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let records = drafts
            .into_iter()
            .map(|draft| draft.into_record(&document_id, doc_name, uploaded_by))
            .collect();

        Ok(Prepared {
            document_id,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::models::DocumentEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        known_document_id: Option<String>,
        upserted: Mutex<Vec<Vec<ChunkRecord>>>,
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn existing_document_id(&self, _doc_name: &str) -> Result<Option<String>, IngestError> {
            Ok(self.known_document_id.clone())
        }

        async fn upsert_chunks(&self, records: &[ChunkRecord]) -> Result<usize, IngestError> {
            let mut batches = self.upserted.lock().unwrap();
            batches.push(records.to_vec());
            Ok(records.len())
        }

        async fn list_documents(&self) -> Result<Vec<DocumentEntry>, ChatError> {
            Ok(Vec::new())
        }

        async fn delete_document(&self, _doc_name: &str) -> Result<u64, ChatError> {
            Ok(0)
        }

        async fn fetch_setting(&self, _name: &str) -> Result<Option<String>, ChatError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct FakeEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingClient for FakeEmbedder {
        async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Option<Vec<f32>>>, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(IngestError::Embedding("provider unavailable".to_string()));
            }
            Ok(inputs.iter().map(|_| Some(vec![0.5, 0.25])).collect())
        }
    }

    fn csv_request() -> IngestRequest {
        IngestRequest {
            file_name: "report.csv".to_string(),
            bytes: b"content;influence_text;chunk_index\n\
                     first chunk body;;0\n\
                     second chunk body;notable excerpt;\n\
                     third chunk body;;5\n\
                     fourth chunk body;;\n"
                .to_vec(),
            doc_name: "Quarterly Report".to_string(),
            uploaded_by: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn preview_assigns_indices_without_embedding_or_writing() {
        let store = FakeStore::default();
        let embedder = FakeEmbedder::default();
        let pipeline = IngestPipeline::new(store, embedder);

        let preview = pipeline.preview(&csv_request()).await.unwrap();

        let indices: Vec<u64> = preview.rows.iter().map(|row| row.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 5, 6]);
        assert!(preview.rows.iter().all(|row| row.content_embedding.is_none()));
        assert!(preview.rendered.starts_with("document_id,doc_name,uploaded_by,chunk_index"));
        assert_eq!(pipeline.embedder.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.store.upserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_embeds_two_batches_and_writes_once() {
        let store = FakeStore::default();
        let embedder = FakeEmbedder::default();
        let pipeline = IngestPipeline::new(store, embedder);

        let receipt = pipeline.upload(&csv_request()).await.unwrap();
        assert_eq!(receipt.written, 4);
        assert_eq!(pipeline.embedder.calls.load(Ordering::SeqCst), 2);

        let batches = pipeline.store.upserted.lock().unwrap();
        assert_eq!(batches.len(), 1);

        let rows = &batches[0];
        assert!(rows.iter().all(|row| row.content_embedding.is_some()));
        // Influence vectors are attached only where influence text exists.
        assert!(rows[0].influence_embedding.is_none());
        assert!(rows[1].influence_embedding.is_some());
        assert!(rows.iter().all(|row| row.date_uploaded.is_some()));
    }

    #[tokio::test]
    async fn embedding_failure_aborts_before_any_write() {
        let store = FakeStore::default();
        let embedder = FakeEmbedder {
            fail: true,
            ..FakeEmbedder::default()
        };
        let pipeline = IngestPipeline::new(store, embedder);

        let result = pipeline.upload(&csv_request()).await;
        assert!(matches!(result, Err(IngestError::Embedding(_))));
        assert!(pipeline.store.upserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reingesting_the_same_batch_is_idempotent() {
        let store = FakeStore {
            known_document_id: Some("doc-reuse".to_string()),
            ..FakeStore::default()
        };
        let pipeline = IngestPipeline::new(store, FakeEmbedder::default());

        let first = pipeline.preview(&csv_request()).await.unwrap();
        let second = pipeline.preview(&csv_request()).await.unwrap();

        assert_eq!(first.document_id, "doc-reuse");
        assert_eq!(first.document_id, second.document_id);
        assert_eq!(first.rows, second.rows);
    }

    #[tokio::test]
    async fn missing_attribution_fields_are_rejected_up_front() {
        let pipeline = IngestPipeline::new(FakeStore::default(), FakeEmbedder::default());

        let mut no_doc_name = csv_request();
        no_doc_name.doc_name = "  ".to_string();
        assert!(matches!(
            pipeline.preview(&no_doc_name).await,
            Err(IngestError::InvalidInput(_))
        ));

        let mut no_uploader = csv_request();
        no_uploader.uploaded_by = String::new();
        assert!(matches!(
            pipeline.preview(&no_uploader).await,
            Err(IngestError::InvalidInput(_))
        ));

        let mut no_file = csv_request();
        no_file.bytes = Vec::new();
        assert!(matches!(
            pipeline.preview(&no_file).await,
            Err(IngestError::InvalidInput(_))
        ));
    }
}
