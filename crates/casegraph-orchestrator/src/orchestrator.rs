// ABOUTME: Chat turn orchestrator wiring optimizer, bootstrap, retrieval strategy, and final generation
// ABOUTME: One handle_chat_turn call per request; the transcript never outlives it

use crate::bootstrap::{build_bootstrap_context, turn_implies_graph_analysis};
use crate::optimizer::TurnOptimizer;
use crate::planner::DeterministicPlanner;
use crate::progress::{ProgressEvent, ProgressSender};
use crate::registry::ToolRegistry;
use crate::strategy::{RetrievalStrategy, TurnContext};
use crate::tool_loop::AdaptiveToolLoop;
use casegraph_core::{
    CaseSnapshot, ChatMessage, ChatRole, ChatTurn, GraphQueryService, LanguageModel, ModelTier,
    OrchestrationMode, OrchestratorConfig, Result,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a legal case assistant for a self-represented litigant's workspace. \
Ground every statement in retrieved case data or knowledge results; when information is missing, say so plainly instead of guessing.";

const FINAL_GENERATION_INSTRUCTION: &str = "Write the final reply to the user from the context above. \
If retrieval came back empty or incomplete, acknowledge the limits of what you found rather than inventing details.";

const FALLBACK_REPLY: &str = "I could not assemble a complete answer from the available information. \
Please try rephrasing the question or narrowing it to a specific case.";

/// Drives one chat turn end to end. Instances are independent across
/// requests; the only shared resource is read access to the snapshot.
pub struct ChatOrchestrator {
    model: Arc<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    graph_query: Arc<dyn GraphQueryService>,
    snapshot: Arc<CaseSnapshot>,
    config: OrchestratorConfig,
    progress: ProgressSender,
}

impl ChatOrchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: Arc<ToolRegistry>,
        graph_query: Arc<dyn GraphQueryService>,
        snapshot: Arc<CaseSnapshot>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            registry,
            graph_query,
            snapshot,
            config,
            progress: ProgressSender::disabled(),
        }
    }

    /// Attach a progress channel for the front end.
    pub fn with_progress(mut self, sender: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = ProgressSender::new(sender);
        self
    }

    /// Handle one user turn and produce the reply text.
    pub async fn handle_chat_turn(
        &self,
        prior_turns: &[ChatTurn],
        new_message: &str,
    ) -> Result<String> {
        let mut ctx = TurnContext::new(new_message);
        info!(turn_id = %ctx.turn_id, mode = ?self.config.mode, "🤖 starting chat turn");

        ctx.transcript.push(ChatMessage::system(SYSTEM_PROMPT));
        for turn in prior_turns {
            ctx.transcript.push(ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        // Follow-up turns get one optimizer pass that merges the prior
        // assistant reply with the new message.
        if let Some(prior_assistant) = last_assistant(prior_turns) {
            self.progress.emit(ProgressEvent::OptimizingTurn);
            let optimizer = TurnOptimizer::new(self.model.clone());
            let merged = optimizer
                .optimize(
                    prior_assistant,
                    new_message,
                    &self.registry.semantics_summary(),
                )
                .await?;
            ctx.transcript.push(ChatMessage::system(format!(
                "Tool-calling optimized context: {merged}"
            )));
            ctx.optimized_query = Some(merged);
        }

        if turn_implies_graph_analysis(new_message) {
            self.progress.emit(ProgressEvent::AnalyzingGraph);
            let context = build_bootstrap_context(&self.snapshot, &self.config)?;
            ctx.transcript.push(ChatMessage::system(context));
        }

        ctx.transcript.push(ChatMessage::user(new_message));

        let strategy: Box<dyn RetrievalStrategy> = match self.config.mode {
            OrchestrationMode::Adaptive => Box::new(AdaptiveToolLoop::new(
                self.model.clone(),
                self.registry.clone(),
                self.config.max_tool_iterations,
                self.progress.clone(),
            )),
            OrchestrationMode::Deterministic => Box::new(DeterministicPlanner::new(
                self.model.clone(),
                self.graph_query.clone(),
                self.progress.clone(),
            )),
        };
        let findings = strategy.run(&mut ctx).await?;
        debug!(
            synthesized = findings.synthesis.is_some(),
            tool_calls = ctx.transcript.ledger().len(),
            "retrieval strategy finished"
        );

        self.progress.emit(ProgressEvent::Generating);
        let reply = self.final_generation(&ctx).await?;

        info!(turn_id = %ctx.turn_id, "🏁 chat turn finished");
        Ok(reply)
    }

    /// Final generation: the larger model tier, with no tool
    /// definitions attached.
    async fn final_generation(&self, ctx: &TurnContext) -> Result<String> {
        let mut messages = ctx.transcript.messages().to_vec();
        messages.push(ChatMessage::system(FINAL_GENERATION_INSTRUCTION));

        let completion = self
            .model
            .complete(&messages, None, ModelTier::Generation)
            .await?;

        Ok(completion
            .content
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string()))
    }
}

fn last_assistant(turns: &[ChatTurn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|turn| turn.role == ChatRole::Assistant)
        .map(|turn| turn.content.as_str())
}
