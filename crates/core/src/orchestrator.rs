use crate::context::{pack, DEFAULT_CONTEXT_BUDGET, EMPTY_CONTEXT_PLACEHOLDER};
use crate::error::ChatError;
use crate::models::{ChatMessage, RetrievalOptions, RetrievalRequest};
use crate::relay::{CompletionRelay, Frame};
use crate::settings::SystemPromptCell;
use crate::traits::{CompletionProvider, SnippetRetriever};
use tokio::sync::mpsc;

/// Hard cap applied to the raw user message before any collaborator call.
pub const MAX_MESSAGE_CHARS: usize = 8_000;

/// Clips the raw message and rejects input that is empty after trimming.
/// Failure here is synchronous; the pipeline is never entered.
pub fn prepare_message(raw_message: &str) -> Result<String, ChatError> {
    let clipped: String = raw_message.chars().take(MAX_MESSAGE_CHARS).collect();
    if clipped.trim().is_empty() {
        return Err(ChatError::Validation("message is empty".to_string()));
    }
    Ok(clipped)
}

/// End-to-end chat flow: retrieval, context budgeting, prompt composition,
/// completion relay. Stateless across requests apart from the shared system
/// prompt cell.
pub struct ChatOrchestrator<R, C>
where
    R: SnippetRetriever,
    C: CompletionProvider,
{
    retriever: R,
    completions: C,
    prompt: SystemPromptCell,
    context_budget: usize,
}

impl<R, C> ChatOrchestrator<R, C>
where
    R: SnippetRetriever + Send + Sync,
    C: CompletionProvider + Send + Sync,
{
    pub fn new(retriever: R, completions: C, prompt: SystemPromptCell) -> Self {
        Self {
            retriever,
            completions,
            prompt,
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    /// Streams one chat answer as frames into `tx`. Every failure past
    /// validation is delivered in-band as an error frame followed by the
    /// terminal frame; the connection is never severed silently.
    pub async fn stream(&self, message: String, options: RetrievalOptions, tx: mpsc::Sender<Frame>) {
        let request = RetrievalRequest::new(message.clone(), options);

        let matches = match self.retriever.query(&request).await {
            Ok(matches) => matches,
            Err(error) => {
                let _ = tx
                    .send(Frame::Error {
                        message: error.to_string(),
                    })
                    .await;
                let _ = tx.send(Frame::Done).await;
                return;
            }
        };

        let packet = pack(&matches, self.context_budget);
        let context_text = packet.context_text();
        let context_body = if context_text.is_empty() {
            EMPTY_CONTEXT_PLACEHOLDER
        } else {
            context_text.as_str()
        };

        let messages = vec![
            ChatMessage::system(self.prompt.current().as_ref()),
            ChatMessage::user(message),
            ChatMessage::system(format!("CONTEXT:\n{context_body}")),
        ];

        let upstream = match self.completions.open_stream(&messages).await {
            Ok(stream) => stream,
            Err(error) => {
                let _ = tx
                    .send(Frame::Error {
                        message: error.to_string(),
                    })
                    .await;
                let _ = tx.send(Frame::Done).await;
                return;
            }
        };

        CompletionRelay::new(packet.citations).run(upstream, &tx).await;
    }
}
