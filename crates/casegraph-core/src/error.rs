use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaseGraphError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Language model error: {0}")]
    Model(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Graph query error: {0}")]
    GraphQuery(String),

    #[error("Tool backend error: {0}")]
    ToolBackend(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CaseGraphError>;
