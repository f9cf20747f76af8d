// ABOUTME: Progress events surfaced to the chat front end while a turn is in flight
// ABOUTME: Lossy by design - a slow or closed consumer never stalls orchestration

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    OptimizingTurn,
    AnalyzingGraph,
    ToolCall { name: String },
    Escalated,
    Planning,
    ExecutingQuery { purpose: String },
    Synthesizing,
    Generating,
}

/// Optional progress channel handle. Cloned into each phase.
#[derive(Clone, Default)]
pub struct ProgressSender(Option<mpsc::Sender<ProgressEvent>>);

impl ProgressSender {
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self(Some(sender))
    }

    /// Lossy send; a full or closed channel drops the event.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.try_send(event);
        }
    }
}
