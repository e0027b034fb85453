pub mod clients;
pub mod context;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod relay;
pub mod session;
pub mod settings;
pub mod sheet;
pub mod traits;

pub use clients::{HttpSnippetRetriever, OpenAiClient, RestStore};
pub use context::{pack, DEFAULT_CONTEXT_BUDGET, EMPTY_CONTEXT_PLACEHOLDER};
pub use error::{ChatError, IngestError};
pub use ingest::{IngestAction, IngestPipeline, IngestPreview, IngestReceipt, IngestRequest};
pub use models::{
    ChatMessage, ChunkDraft, ChunkRecord, Citation, ContextPacket, DocumentEntry, RetrievalMatch,
    RetrievalOptions, RetrievalRequest, SearchMode,
};
pub use normalize::{assign_chunk_indices, collapse_whitespace, normalize_row};
pub use orchestrator::{prepare_message, ChatOrchestrator, MAX_MESSAGE_CHARS};
pub use relay::{CompletionRelay, Frame};
pub use session::{sign_token, verify_token, Role, SessionClaims, DEFAULT_SESSION_TTL_SECS};
pub use settings::{SystemPromptCell, DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_SETTING};
pub use traits::{
    CompletionByteStream, CompletionProvider, DocumentStore, EmbeddingClient, SnippetRetriever,
};
