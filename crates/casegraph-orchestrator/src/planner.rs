// ABOUTME: Deterministic retrieval planner - plan, execute, synthesize over the graph query service
// ABOUTME: Alternate orchestration mode; failed queries are dropped, an empty result set still synthesizes

use crate::progress::{ProgressEvent, ProgressSender};
use crate::strategy::{Findings, RetrievalStrategy, TurnContext};
use async_trait::async_trait;
use casegraph_core::{ChatMessage, GraphQueryService, LanguageModel, ModelTier, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Structured plan the model must return before any query executes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalPlan {
    pub intent: String,
    #[serde(default)]
    pub queries: Vec<PlannedQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedQuery {
    pub purpose: String,
    /// Parameterized, schema-introspectable graph query string.
    pub query: String,
    /// Bound arguments for the query.
    #[serde(default)]
    pub variables: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LegalChunk {
    pub source: String,
    pub source_id: String,
    pub content: String,
}

/// Condensed findings handed to final generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SynthesizedFindings {
    pub intent: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub legal_chunks: Vec<LegalChunk>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Strip a markdown code fence if the model wrapped its JSON in one.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

fn parse_plan(content: &str) -> RetrievalPlan {
    match serde_json::from_str(extract_json(content)) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "plan response was not valid JSON; continuing with no queries");
            RetrievalPlan {
                intent: content.trim().to_string(),
                queries: Vec::new(),
            }
        }
    }
}

fn parse_synthesis(intent: String, content: &str) -> SynthesizedFindings {
    match serde_json::from_str(extract_json(content)) {
        Ok(findings) => findings,
        Err(e) => {
            warn!(error = %e, "synthesis response was not valid JSON; carrying raw text");
            SynthesizedFindings {
                intent,
                key_findings: vec![content.trim().to_string()],
                legal_chunks: Vec::new(),
                gaps: vec!["synthesis output was not structured".to_string()],
                confidence: 0.0,
            }
        }
    }
}

fn plan_system_prompt() -> String {
    let schema = serde_json::to_string(&schemars::schema_for!(RetrievalPlan))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are a retrieval planner for a legal case workspace backed by a graph query service. \
Decompose the request into parameterized graph queries with bound variables. \
Respond with a single JSON object matching this schema, nothing else:\n{schema}"
    )
}

fn synthesis_system_prompt() -> String {
    let schema = serde_json::to_string(&schemars::schema_for!(SynthesizedFindings))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        "You condense raw graph query results into findings for a legal assistant. \
Use only the supplied results; if they are empty or insufficient, report that in `gaps` instead of fabricating findings. \
Respond with a single JSON object matching this schema, nothing else:\n{schema}"
    )
}

/// Plans structured graph queries, executes them, and synthesizes the
/// results. Used instead of the free-form tool-calling loop.
pub struct DeterministicPlanner {
    model: Arc<dyn LanguageModel>,
    graph: Arc<dyn GraphQueryService>,
    progress: ProgressSender,
}

impl DeterministicPlanner {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        graph: Arc<dyn GraphQueryService>,
        progress: ProgressSender,
    ) -> Self {
        Self {
            model,
            graph,
            progress,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for DeterministicPlanner {
    async fn run(&self, ctx: &mut TurnContext) -> Result<Findings> {
        let merged_query = ctx
            .optimized_query
            .clone()
            .unwrap_or_else(|| ctx.user_message.clone());

        self.progress.emit(ProgressEvent::Planning);
        let plan_completion = self
            .model
            .complete(
                &[
                    ChatMessage::system(plan_system_prompt()),
                    ChatMessage::user(merged_query),
                ],
                None,
                ModelTier::Tool,
            )
            .await?;
        let plan = parse_plan(plan_completion.content.as_deref().unwrap_or_default());
        info!(intent = %plan.intent, queries = plan.queries.len(), "retrieval plan ready");

        let mut results = Vec::new();
        for planned in &plan.queries {
            self.progress.emit(ProgressEvent::ExecutingQuery {
                purpose: planned.purpose.clone(),
            });

            // Schema discovery first; the client caches it after one
            // success. A failure drops this query, not the plan.
            if let Err(e) = self.graph.introspect_schema().await {
                warn!(purpose = %planned.purpose, error = %e, "schema introspection failed; dropping query");
                continue;
            }

            match self
                .graph
                .execute_query(&planned.query, &planned.variables)
                .await
            {
                Ok(data) => results.push(json!({
                    "purpose": planned.purpose,
                    "query": planned.query,
                    "data": data,
                })),
                Err(e) => {
                    warn!(purpose = %planned.purpose, error = %e, "planned query failed; dropping it");
                }
            }
        }
        debug!(
            executed = results.len(),
            planned = plan.queries.len(),
            "planned query execution finished"
        );

        self.progress.emit(ProgressEvent::Synthesizing);
        let material = json!({ "intent": plan.intent, "results": results });
        let synthesis_completion = self
            .model
            .complete(
                &[
                    ChatMessage::system(synthesis_system_prompt()),
                    ChatMessage::user(material.to_string()),
                ],
                None,
                ModelTier::Tool,
            )
            .await?;
        let findings = parse_synthesis(
            plan.intent.clone(),
            synthesis_completion.content.as_deref().unwrap_or_default(),
        );

        let rendered = serde_json::to_string_pretty(&findings)?;
        ctx.transcript.push(ChatMessage::system(format!(
            "Synthesized retrieval findings:\n{rendered}"
        )));

        Ok(Findings {
            synthesis: Some(findings),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let fenced = "```json\n{\"intent\": \"x\", \"queries\": []}\n```";
        let plan = parse_plan(fenced);
        assert_eq!(plan.intent, "x");
        assert!(plan.queries.is_empty());
    }

    #[test]
    fn plan_parse_failure_degrades_to_zero_queries() {
        let plan = parse_plan("I will look into the filings first.");
        assert!(plan.queries.is_empty());
        assert_eq!(plan.intent, "I will look into the filings first.");
    }

    #[test]
    fn plan_queries_carry_variables() {
        let plan = parse_plan(
            r#"{"intent": "deadlines", "queries": [{"purpose": "open deadlines", "query": "query($caseId: ID!) { case(id: $caseId) { deadlines { title } } }", "variables": {"caseId": "alpha"}}]}"#,
        );
        assert_eq!(plan.queries.len(), 1);
        assert_eq!(plan.queries[0].variables["caseId"], "alpha");
    }

    #[test]
    fn synthesis_parse_failure_reports_a_gap() {
        let findings = parse_synthesis("intent".into(), "nothing structured here");
        assert_eq!(findings.confidence, 0.0);
        assert_eq!(findings.key_findings.len(), 1);
        assert!(!findings.gaps.is_empty());
    }

    #[test]
    fn prompt_schemas_mention_required_fields() {
        assert!(plan_system_prompt().contains("queries"));
        assert!(synthesis_system_prompt().contains("legal_chunks"));
    }
}
