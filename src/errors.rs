//! Internal error taxonomy. Each component family gets its own typed
//! enum; conversions at the RPC boundary turn these into JSON-RPC error
//! envelopes.

use thiserror::Error;

/// Errors raised out of the log store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("invalid search query: {0}")]
    InvalidQuery(String),
}

/// Errors from the ingestion plane (datagram receiver, file tailer).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed datagram: {0}")]
    MalformedDatagram(#[from] crate::model::ParseError),
    #[error("source not found at start: {0}")]
    SourceNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// JSON-RPC dispatch errors; `code` follows the JSON-RPC reserved ranges.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const INVALID_PARAMS: i64 = -32602;

    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: Self::METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
        }
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_PARAMS,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        Self::internal(e.to_string())
    }
}
