// ABOUTME: Strategy seam shared by the two orchestration modes
// ABOUTME: Both run between the optimizer and final generation and leave their context in the transcript

use crate::planner::SynthesizedFindings;
use async_trait::async_trait;
use casegraph_core::{Result, Transcript};
use uuid::Uuid;

/// Per-request orchestration state. Owned by exactly one in-flight
/// request and discarded with it.
#[derive(Debug)]
pub struct TurnContext {
    pub turn_id: Uuid,
    pub user_message: String,
    /// Merged retrieval query produced by the turn optimizer, when the
    /// turn followed a prior assistant reply.
    pub optimized_query: Option<String>,
    pub transcript: Transcript,
}

impl TurnContext {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            user_message: user_message.into(),
            optimized_query: None,
            transcript: Transcript::new(),
        }
    }
}

/// What a retrieval strategy hands to final generation beyond the
/// transcript itself.
#[derive(Debug, Default)]
pub struct Findings {
    pub synthesis: Option<SynthesizedFindings>,
}

/// A retrieval strategy gathers context for final generation. The
/// adaptive mode loops over model tool calls; the deterministic mode
/// plans and executes structured graph queries.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    async fn run(&self, ctx: &mut TurnContext) -> Result<Findings>;
}
