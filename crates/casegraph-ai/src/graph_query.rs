use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use casegraph_core::{CaseGraphError, GraphQueryService};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";

/// Compact introspection request; field-level detail is enough for the
/// planner to write parameterized queries.
const INTROSPECTION_QUERY: &str = "query IntrospectSchema { __schema { queryType { name } types { name kind fields { name args { name } } } } }";

/// Configuration for the graph query client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQueryClientConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GraphQueryClientConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("CASEGRAPH_GRAPH_QUERY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout_secs: 60,
        }
    }
}

/// GraphQL client for the graph query service. Schema introspection and
/// query execution go to the same endpoint; the introspected schema is
/// cached for the life of this client.
pub struct GraphQueryClient {
    config: GraphQueryClientConfig,
    client: Client,
    schema: RwLock<Option<String>>,
}

impl GraphQueryClient {
    pub fn new(config: GraphQueryClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            client,
            schema: RwLock::new(None),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GraphQueryClientConfig::default())
    }

    async fn post(&self, query: &str, variables: &Value) -> Result<Value> {
        let request = GraphQlRequest {
            query: query.to_string(),
            variables: variables.clone(),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .context("Failed to send graph query")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("graph endpoint error ({}): {}", status, error_text));
        }

        let parsed: GraphQlResponse = response
            .json()
            .await
            .context("Failed to parse graph query response")?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(anyhow!("graph query errors: {}", messages.join("; ")));
        }

        parsed
            .data
            .ok_or_else(|| anyhow!("graph query returned no data"))
    }
}

#[async_trait]
impl GraphQueryService for GraphQueryClient {
    async fn introspect_schema(&self) -> casegraph_core::Result<String> {
        if let Some(schema) = (*self.schema.read()).clone() {
            return Ok(schema);
        }

        let data = self
            .post(INTROSPECTION_QUERY, &Value::Null)
            .await
            .map_err(|e| CaseGraphError::GraphQuery(format!("{e:#}")))?;

        let rendered = serde_json::to_string(&data)?;
        debug!(bytes = rendered.len(), "cached introspected graph schema");
        *self.schema.write() = Some(rendered.clone());
        Ok(rendered)
    }

    async fn execute_query(&self, query: &str, variables: &Value) -> casegraph_core::Result<Value> {
        self.post(query, variables)
            .await
            .map_err(|e| CaseGraphError::GraphQuery(format!("{e:#}")))
    }
}

// GraphQL wire types

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}
