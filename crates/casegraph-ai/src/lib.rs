pub mod completion;
pub mod embeddings;
pub mod graph_query;

pub use completion::{CompletionClient, CompletionClientConfig};
pub use embeddings::{EmbeddingClientConfig, HttpEmbeddingService};
pub use graph_query::{GraphQueryClient, GraphQueryClientConfig};
