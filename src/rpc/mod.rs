//! JSON-RPC 2.0 dispatcher: routes `tools/*` and `resources/*` calls
//! onto the store and source manager, and wraps every response in the
//! standard envelope.

mod resources;
mod tools;

use crate::errors::RpcError;
use crate::sources::SourceManager;
use crate::store::SharedStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub struct RpcDispatcher {
    store: SharedStore,
    sources: Arc<SourceManager>,
    server_name: String,
    server_version: String,
}

impl RpcDispatcher {
    #[must_use]
    pub fn new(store: SharedStore, sources: Arc<SourceManager>) -> Self {
        Self {
            store,
            sources,
            server_name: "logagg".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Dispatches one parsed request object. Returns `None` for
    /// notifications (no `id` field).
    pub async fn dispatch(&self, request: &Value) -> Option<Value> {
        let has_id = request.get("id").is_some();
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        if method.is_empty() {
            warn!("rpc request missing method field");
        }

        let outcome = self.handle_method(method, params).await;

        if !has_id {
            return None;
        }

        Some(match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(e) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": e.code, "message": e.message},
            }),
        })
    }

    async fn handle_method(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize()),
            "notifications/initialized" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools::catalog()),
            "tools/call" => tools::call(&self.store, &self.sources, &params).await,
            "resources/list" => Ok(resources::catalog()),
            "resources/read" => resources::read(&self.store, &params).await,
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {},
                "resources": {"subscribe": false},
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            },
        })
    }
}
