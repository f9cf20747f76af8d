use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which retrieval strategy drives a request.
///
/// Passed explicitly into the orchestrator constructor; there is no
/// ambient global switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationMode {
    /// Free-form tool-calling loop.
    Adaptive,
    /// Planned, structured graph retrieval.
    Deterministic,
}

impl FromStr for OrchestrationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adaptive" => Ok(OrchestrationMode::Adaptive),
            "deterministic" => Ok(OrchestrationMode::Deterministic),
            other => Err(format!("unknown orchestration mode: {other}")),
        }
    }
}

/// Configuration for the chat orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: OrchestrationMode,
    /// Hard cap on tool-calling loop iterations. Exceeding it is a
    /// graceful degradation path, never an error.
    pub max_tool_iterations: usize,
    /// Top-connected-node bound used by the graph bootstrap.
    pub bootstrap_top_k: usize,
    /// Case bound for the compressed bootstrap payload.
    pub bootstrap_max_cases: usize,
    /// Hot-node bound for the compressed bootstrap payload.
    pub bootstrap_max_nodes: usize,
    /// Result count requested from `SearchKnowledge`.
    pub knowledge_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: OrchestrationMode::Adaptive,
            max_tool_iterations: 10,
            bootstrap_top_k: 8,
            bootstrap_max_cases: 3,
            bootstrap_max_nodes: 5,
            knowledge_top_k: 8,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_mode(mode: OrchestrationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}
