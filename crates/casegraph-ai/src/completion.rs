use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use casegraph_core::{
    CaseGraphError, ChatMessage, Completion, FinishReason, LanguageModel, ModelTier, ToolCall,
    ToolSchema,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TOOL_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GENERATION_MODEL: &str = "gpt-4o";

/// Configuration for the chat-completions client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionClientConfig {
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// API key; may be empty for local gateways.
    pub api_key: String,
    /// Model used for tool-calling decisions.
    pub tool_model: String,
    /// Larger model used to write the final reply.
    pub generation_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for failed requests
    pub max_retries: u32,
    pub temperature: f32,
}

impl Default for CompletionClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("CASEGRAPH_LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key: std::env::var("CASEGRAPH_LLM_API_KEY").unwrap_or_default(),
            tool_model: std::env::var("CASEGRAPH_TOOL_MODEL")
                .unwrap_or_else(|_| DEFAULT_TOOL_MODEL.to_string()),
            generation_model: std::env::var("CASEGRAPH_GENERATION_MODEL")
                .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string()),
            timeout_secs: 120,
            max_retries: 3,
            temperature: 0.1,
        }
    }
}

/// OpenAI-compatible chat-completions client serving both model tiers.
pub struct CompletionClient {
    config: CompletionClientConfig,
    client: Client,
}

impl CompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(CompletionClientConfig::default())
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Tool => &self.config.tool_model,
            ModelTier::Generation => &self.config.generation_model,
        }
    }

    /// Send a request with retry logic. Timeout and retry live here, in
    /// the backend client; the orchestrator above never retries.
    async fn send_request(&self, request: &ChatCompletionsRequest) -> Result<ChatCompletionsResponse> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.try_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        tracing::warn!(
                            "chat-completions request failed (attempt {}/{}), retrying...",
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    async fn try_request(&self, request: &ChatCompletionsRequest) -> Result<ChatCompletionsResponse> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(request);

        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder
            .send()
            .await
            .context("Failed to send chat-completions request")?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(anyhow!("model endpoint error ({}): {}", status, error_text));
        }

        response
            .json::<ChatCompletionsResponse>()
            .await
            .context("Failed to parse chat-completions response")
    }
}

#[async_trait]
impl LanguageModel for CompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
        tier: ModelTier,
    ) -> casegraph_core::Result<Completion> {
        let request = ChatCompletionsRequest {
            model: self.model_for(tier).to_string(),
            messages: to_wire_messages(messages),
            temperature: self.config.temperature,
            tools: tools.map(to_wire_tools),
        };

        let response = self
            .send_request(&request)
            .await
            .map_err(|e| CaseGraphError::Model(format!("{e:#}")))?;

        Ok(completion_from_response(response))
    }
}

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: m.role.to_string(),
            content: if m.content.is_empty() && !m.tool_calls.is_empty() {
                None
            } else {
                Some(m.content.clone())
            },
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(m.tool_calls.iter().map(to_wire_tool_call).collect())
            },
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

fn to_wire_tool_call(call: &ToolCall) -> WireToolCall {
    WireToolCall {
        id: call.id.clone(),
        call_type: "function".to_string(),
        function: WireFunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

fn to_wire_tools(tools: &[ToolSchema]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function".to_string(),
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

fn completion_from_response(response: ChatCompletionsResponse) -> Completion {
    let Some(choice) = response.choices.into_iter().next() else {
        return Completion {
            finish_reason: FinishReason::Stop,
            content: None,
            tool_calls: Vec::new(),
        };
    };

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|wire| {
            let arguments = serde_json::from_str(&wire.function.arguments).unwrap_or_else(|e| {
                tracing::warn!(
                    tool = %wire.function.name,
                    error = %e,
                    "tool call arguments were not valid JSON"
                );
                Value::Object(Default::default())
            });
            ToolCall {
                id: wire.id,
                name: wire.function.name,
                arguments,
            }
        })
        .collect();

    let finish_reason = if !tool_calls.is_empty() {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    };

    Completion {
        finish_reason,
        content: choice.message.content,
        tool_calls,
    }
}

// Chat-completions wire types

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, per the wire format.
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}
