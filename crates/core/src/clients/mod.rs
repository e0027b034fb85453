pub mod openai;
pub mod rest_store;
pub mod retrieval;

pub use openai::OpenAiClient;
pub use rest_store::RestStore;
pub use retrieval::HttpSnippetRetriever;
