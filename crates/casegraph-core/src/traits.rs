use crate::{ChatMessage, Completion, ModelTier, Result, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;

/// Language model service consumed by the orchestrator.
///
/// One implementation serves both tiers; the tier picks the configured
/// model name. A failure here is not locally recoverable and surfaces
/// as a request-level error.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
        tier: ModelTier,
    ) -> Result<Completion>;
}

/// Embedding service; the vector dimension is invariant for the life of
/// the process and implementations may cache it.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A name-addressed tool backend (case-data tools or knowledge tools).
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Tool definitions owned by this backend.
    fn definitions(&self) -> Vec<ToolSchema>;

    /// Execute a tool by name. Backends report tool-level failures as an
    /// `{ "error": ... }` payload or an `Err`; the dispatcher converts
    /// either into an in-transcript result.
    async fn execute(&self, name: &str, arguments: Value) -> Result<Value>;
}

/// Graph query service used by the deterministic retrieval planner.
/// Schema introspection and query execution share one endpoint.
#[async_trait]
pub trait GraphQueryService: Send + Sync {
    async fn introspect_schema(&self) -> Result<String>;
    async fn execute_query(&self, query: &str, variables: &Value) -> Result<Value>;
}
