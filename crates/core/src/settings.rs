use crate::error::ChatError;
use crate::traits::DocumentStore;
use std::sync::{Arc, RwLock};

/// Name of the stored setting carrying the chat system instruction.
pub const SYSTEM_PROMPT_SETTING: &str = "system_prompt";

/// Compiled-in instruction used until the first successful refresh.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a concise assistant. Answer from the provided context and cite sources inline like [#n].";

/// Shared system instruction: many concurrent readers, one timer-driven
/// writer. The value is replaced wholesale; readers clone the inner `Arc`,
/// so a reader observes either the old or the new instruction, never a torn
/// one.
#[derive(Clone)]
pub struct SystemPromptCell {
    inner: Arc<RwLock<Arc<str>>>,
}

impl Default for SystemPromptCell {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl SystemPromptCell {
    pub fn new(initial: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::from(initial))),
        }
    }

    pub fn current(&self) -> Arc<str> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, value: &str) {
        let next: Arc<str> = Arc::from(value);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Pulls the stored prompt and swaps it in. An empty or missing stored
    /// prompt keeps the current value. Returns whether a swap happened.
    pub async fn refresh_from<S>(&self, store: &S) -> Result<bool, ChatError>
    where
        S: DocumentStore + Sync,
    {
        match store.fetch_setting(SYSTEM_PROMPT_SETTING).await? {
            Some(content) if !content.trim().is_empty() => {
                self.replace(content.trim());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::models::{ChunkRecord, DocumentEntry};
    use async_trait::async_trait;

    struct FakeSettings {
        stored: Option<String>,
    }

    #[async_trait]
    impl DocumentStore for FakeSettings {
        async fn existing_document_id(&self, _doc_name: &str) -> Result<Option<String>, IngestError> {
            Ok(None)
        }

        async fn upsert_chunks(&self, _records: &[ChunkRecord]) -> Result<usize, IngestError> {
            Ok(0)
        }

        async fn list_documents(&self) -> Result<Vec<DocumentEntry>, ChatError> {
            Ok(Vec::new())
        }

        async fn delete_document(&self, _doc_name: &str) -> Result<u64, ChatError> {
            Ok(0)
        }

        async fn fetch_setting(&self, _name: &str) -> Result<Option<String>, ChatError> {
            Ok(self.stored.clone())
        }
    }

    #[tokio::test]
    async fn refresh_swaps_in_a_non_empty_stored_prompt() {
        let cell = SystemPromptCell::default();
        let store = FakeSettings {
            stored: Some("  Answer in Dutch.  ".to_string()),
        };

        let swapped = cell.refresh_from(&store).await.unwrap();
        assert!(swapped);
        assert_eq!(cell.current().as_ref(), "Answer in Dutch.");
    }

    #[tokio::test]
    async fn refresh_keeps_the_current_prompt_when_stored_is_empty_or_missing() {
        let cell = SystemPromptCell::new("keep me");

        let empty = FakeSettings {
            stored: Some("   ".to_string()),
        };
        assert!(!cell.refresh_from(&empty).await.unwrap());
        assert_eq!(cell.current().as_ref(), "keep me");

        let missing = FakeSettings { stored: None };
        assert!(!cell.refresh_from(&missing).await.unwrap());
        assert_eq!(cell.current().as_ref(), "keep me");
    }

    #[test]
    fn readers_see_whole_values_across_a_replace() {
        let cell = SystemPromptCell::new("before");
        let held = cell.current();
        cell.replace("after");

        assert_eq!(held.as_ref(), "before");
        assert_eq!(cell.current().as_ref(), "after");
    }
}
