// ABOUTME: Conversation-turn optimizer for follow-up turns
// ABOUTME: Collapses the prior assistant reply and new message into one retrieval-oriented query

use casegraph_core::{ChatMessage, LanguageModel, ModelTier, Result};
use std::sync::Arc;
use tracing::debug;

const OPTIMIZER_SYSTEM_PROMPT: &str = "You rewrite conversation turns for a legal case assistant. \
Merge the previous assistant reply and the new user message into one self-contained retrieval query, \
phrased in terms the listed retrieval tools can act on. Respond with the merged query only, no commentary.";

/// Issues the single non-tool model call that produces the
/// "tool-calling optimized context" for follow-up turns.
pub struct TurnOptimizer {
    model: Arc<dyn LanguageModel>,
}

impl TurnOptimizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn optimize(
        &self,
        prior_assistant: &str,
        user_message: &str,
        tool_semantics: &str,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::system(format!(
                "{OPTIMIZER_SYSTEM_PROMPT}\n\nAvailable retrieval tools:\n{tool_semantics}"
            )),
            ChatMessage::user(format!(
                "Previous assistant reply:\n{prior_assistant}\n\nNew user message:\n{user_message}\n\nMerged retrieval query:"
            )),
        ];

        let completion = self.model.complete(&messages, None, ModelTier::Tool).await?;
        let merged = completion
            .content
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| user_message.to_string());
        debug!(merged = %merged, "turn optimizer finished");
        Ok(merged)
    }
}
