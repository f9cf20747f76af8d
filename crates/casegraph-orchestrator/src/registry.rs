// ABOUTME: Merged tool namespace over the case-data and knowledge backends
// ABOUTME: Dispatches model tool calls by name; unknown names yield an inert result, never a failure

use casegraph_core::{EmbeddingService, ToolBackend, ToolCall, ToolSchema};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Internal graph-analysis capability. It only runs as the deterministic
/// bootstrap step and must never appear in the merged tool list.
pub const INTERNAL_ANALYSIS_TOOL: &str = "AnalyzeCaseGraph";

/// Closed set of tool identifiers the orchestrator knows how to route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetCases,
    GetDeadlines,
    GetContacts,
    GetFinances,
    GetDocuments,
    GetDocumentText,
    SearchTimeline,
    SearchKnowledge,
    GetStats,
    SearchNodes,
    GetNode,
    GetNeighbors,
    FindSimilar,
    Unknown(String),
}

impl ToolName {
    pub fn is_case_data(&self) -> bool {
        matches!(
            self,
            ToolName::GetCases
                | ToolName::GetDeadlines
                | ToolName::GetContacts
                | ToolName::GetFinances
                | ToolName::GetDocuments
                | ToolName::GetDocumentText
                | ToolName::SearchTimeline
        )
    }

    pub fn is_knowledge(&self) -> bool {
        matches!(
            self,
            ToolName::SearchKnowledge
                | ToolName::GetStats
                | ToolName::SearchNodes
                | ToolName::GetNode
                | ToolName::GetNeighbors
                | ToolName::FindSimilar
        )
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolName::GetCases => "GetCases",
            ToolName::GetDeadlines => "GetDeadlines",
            ToolName::GetContacts => "GetContacts",
            ToolName::GetFinances => "GetFinances",
            ToolName::GetDocuments => "GetDocuments",
            ToolName::GetDocumentText => "GetDocumentText",
            ToolName::SearchTimeline => "SearchTimeline",
            ToolName::SearchKnowledge => "SearchKnowledge",
            ToolName::GetStats => "get_stats",
            ToolName::SearchNodes => "search_nodes",
            ToolName::GetNode => "get_node",
            ToolName::GetNeighbors => "get_neighbors",
            ToolName::FindSimilar => "find_similar",
            ToolName::Unknown(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for ToolName {
    fn from(s: &str) -> Self {
        match s {
            "GetCases" => ToolName::GetCases,
            "GetDeadlines" => ToolName::GetDeadlines,
            "GetContacts" => ToolName::GetContacts,
            "GetFinances" => ToolName::GetFinances,
            "GetDocuments" => ToolName::GetDocuments,
            "GetDocumentText" => ToolName::GetDocumentText,
            "SearchTimeline" => ToolName::SearchTimeline,
            "SearchKnowledge" => ToolName::SearchKnowledge,
            "get_stats" => ToolName::GetStats,
            "search_nodes" => ToolName::SearchNodes,
            "get_node" => ToolName::GetNode,
            "get_neighbors" => ToolName::GetNeighbors,
            "find_similar" => ToolName::FindSimilar,
            other => ToolName::Unknown(other.to_string()),
        }
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ToolName::from(s))
    }
}

/// Aggregates the two external tool backends into one namespace visible
/// to the model and resolves tool calls back to their owner.
pub struct ToolRegistry {
    case_backend: Arc<dyn ToolBackend>,
    knowledge_backend: Arc<dyn ToolBackend>,
    embeddings: Arc<dyn EmbeddingService>,
    knowledge_top_k: usize,
}

impl ToolRegistry {
    pub fn new(
        case_backend: Arc<dyn ToolBackend>,
        knowledge_backend: Arc<dyn ToolBackend>,
        embeddings: Arc<dyn EmbeddingService>,
        knowledge_top_k: usize,
    ) -> Self {
        Self {
            case_backend,
            knowledge_backend,
            embeddings,
            knowledge_top_k,
        }
    }

    /// The merged tool list presented to the model. Definitions stay
    /// owned by their backends; the internal analysis capability is
    /// filtered out even if a backend declares it.
    pub fn definitions(&self) -> Vec<ToolSchema> {
        let mut merged = self.case_backend.definitions();
        merged.extend(self.knowledge_backend.definitions());
        merged.retain(|schema| schema.name != INTERNAL_ANALYSIS_TOOL);
        merged
    }

    /// Plain-text tool semantics consumed by the turn optimizer prompt.
    pub fn semantics_summary(&self) -> String {
        self.definitions()
            .iter()
            .map(|schema| format!("- {}: {}", schema.name, schema.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolve and execute one tool call. Failures of any kind become a
    /// result payload; dispatch itself never fails the request.
    pub async fn dispatch(&self, call: &ToolCall) -> Value {
        let name = ToolName::from(call.name.as_str());
        debug!(tool = %name, "dispatching tool call");

        match &name {
            ToolName::Unknown(unknown) => {
                warn!(tool = %unknown, "model requested a tool that does not exist");
                json!({ "error": format!("tool not found: {unknown}") })
            }
            ToolName::SearchKnowledge => self.dispatch_search_knowledge(call).await,
            _ if name.is_case_data() => {
                self.execute_on(&self.case_backend, &name, call.arguments.clone())
                    .await
            }
            _ => {
                self.execute_on(&self.knowledge_backend, &name, call.arguments.clone())
                    .await
            }
        }
    }

    /// `SearchKnowledge` needs the query embedded before the backend
    /// call; the backend receives `{ embedding, text, topK }`.
    async fn dispatch_search_knowledge(&self, call: &ToolCall) -> Value {
        let text = call
            .arguments
            .get("query")
            .or_else(|| call.arguments.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let embedding = match self.embeddings.embed(&text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "embedding pre-step failed");
                return json!({ "error": format!("embedding failed: {e}") });
            }
        };

        let arguments = json!({
            "embedding": embedding,
            "text": text,
            "topK": self.knowledge_top_k,
        });

        self.execute_on(&self.knowledge_backend, &ToolName::SearchKnowledge, arguments)
            .await
    }

    async fn execute_on(
        &self,
        backend: &Arc<dyn ToolBackend>,
        name: &ToolName,
        arguments: Value,
    ) -> Value {
        match backend.execute(&name.to_string(), arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                json!({ "error": format!("tool {name} failed: {e}") })
            }
        }
    }
}
