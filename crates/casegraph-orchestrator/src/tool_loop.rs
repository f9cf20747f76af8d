// ABOUTME: Bounded tool-calling loop driving the adaptive retrieval mode
// ABOUTME: Dispatches tool batches concurrently and escalates unproductive graph searches once per request

use crate::progress::{ProgressEvent, ProgressSender};
use crate::registry::{ToolName, ToolRegistry};
use crate::strategy::{Findings, RetrievalStrategy, TurnContext};
use async_trait::async_trait;
use casegraph_core::{
    ChatMessage, FinishReason, LanguageModel, ModelTier, Result, ToolCall, ToolInvocation,
};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Loop phase. The two terminal states differ only in how the loop
/// ended; both proceed to final generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    Stop,
    MaxIterationsExceeded,
}

/// Tracks the unproductive-graph-search pattern: zero results on two
/// consecutive distinct `search_nodes` queries arms the escalation,
/// which fires at most once per request.
#[derive(Debug, Default)]
pub(crate) struct EscalationState {
    last_empty_query: Option<String>,
    armed: bool,
    fired: bool,
}

impl EscalationState {
    pub(crate) fn observe_search_nodes(&mut self, query: &str, zero_results: bool) {
        if !zero_results {
            self.last_empty_query = None;
            return;
        }
        if let Some(prev) = &self.last_empty_query {
            if prev != query {
                self.armed = true;
            }
        }
        self.last_empty_query = Some(query.to_string());
    }

    pub(crate) fn should_force(&self) -> bool {
        self.armed && !self.fired
    }

    pub(crate) fn mark_fired(&mut self) {
        self.fired = true;
        self.armed = false;
    }

    pub(crate) fn last_query(&self) -> Option<&str> {
        self.last_empty_query.as_deref()
    }
}

/// Whether a `search_nodes` result counts as zero matches. Error
/// payloads are failures, not empty result sets.
fn is_zero_result(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => {
            if map.contains_key("error") {
                return false;
            }
            for key in ["nodes", "results", "answers"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.is_empty();
                }
            }
            if let Some(count) = map.get("count").and_then(Value::as_u64) {
                return count == 0;
            }
            false
        }
        _ => false,
    }
}

/// Free-form retrieval: the model requests tool invocations until it
/// stops or the iteration cap cuts it off. Hitting the cap is a
/// graceful degradation path, never an error.
pub struct AdaptiveToolLoop {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
    progress: ProgressSender,
}

impl AdaptiveToolLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        max_iterations: usize,
        progress: ProgressSender,
    ) -> Self {
        Self {
            model,
            registry,
            max_iterations,
            progress,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for AdaptiveToolLoop {
    async fn run(&self, ctx: &mut TurnContext) -> Result<Findings> {
        let tools = self.registry.definitions();
        let mut state = LoopState::AwaitingModel;
        let mut escalation = EscalationState::default();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, max = self.max_iterations, "tool loop iteration");

            let completion = self
                .model
                .complete(ctx.transcript.messages(), Some(&tools), ModelTier::Tool)
                .await?;

            if completion.finish_reason == FinishReason::Stop || completion.tool_calls.is_empty() {
                if let Some(content) = completion.content {
                    if !content.is_empty() {
                        ctx.transcript.push(ChatMessage::assistant(content));
                    }
                }
                state = LoopState::Stop;
                break;
            }

            let mut requested = completion.tool_calls;

            if escalation.should_force() {
                let query = escalation
                    .last_query()
                    .unwrap_or(ctx.user_message.as_str())
                    .to_string();
                info!(%query, "🔀 forcing SearchKnowledge after unproductive graph searches");
                self.progress.emit(ProgressEvent::Escalated);
                requested = vec![ToolCall {
                    id: format!("escalation-{iteration}"),
                    name: ToolName::SearchKnowledge.to_string(),
                    arguments: json!({ "query": query }),
                }];
                escalation.mark_fired();
            }

            ctx.transcript.push(ChatMessage::assistant_with_calls(
                completion.content.unwrap_or_default(),
                requested.clone(),
            ));

            for call in &requested {
                self.progress.emit(ProgressEvent::ToolCall {
                    name: call.name.clone(),
                });
            }

            // Calls within one model turn are independent; dispatch them
            // concurrently and join before the next model call.
            let results = join_all(requested.iter().map(|call| async {
                let started = Instant::now();
                let result = self.registry.dispatch(call).await;
                (result, started.elapsed().as_millis() as u64)
            }))
            .await;

            for (call, (result, duration_ms)) in requested.iter().zip(results) {
                debug!(tool = %call.name, duration_ms, "tool call completed");
                if ToolName::from(call.name.as_str()) == ToolName::SearchNodes {
                    let query = call
                        .arguments
                        .get("query")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    escalation.observe_search_nodes(query, is_zero_result(&result));
                }
                ctx.transcript
                    .push(ChatMessage::tool_result(call.id.clone(), result.to_string()));
                ctx.transcript.record_invocation(ToolInvocation {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result,
                    duration_ms,
                });
            }
        }

        if state != LoopState::Stop {
            state = LoopState::MaxIterationsExceeded;
            warn!(
                iterations = self.max_iterations,
                "⚠️ tool loop hit the iteration cap; continuing to final generation"
            );
        }

        debug!(
            ?state,
            tool_calls = ctx.transcript.ledger().len(),
            "tool loop finished"
        );
        Ok(Findings { synthesis: None })
    }
}
