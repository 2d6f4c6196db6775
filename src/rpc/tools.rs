//! Tool catalog and dispatch for `tools/list` and `tools/call`.

use crate::errors::RpcError;
use crate::model::filter_from_value;
use crate::sources::SourceManager;
use crate::store::SharedStore;
use serde_json::{json, Value};
use std::sync::Arc;

/// `(name, description, input schema)` for every tool, in catalog order.
const TOOLS: &[(&str, &str, fn() -> Value)] = &[
    (
        "query_logs",
        "Query stored log records against an optional filter.",
        || filter_schema(&[]),
    ),
    (
        "search_logs",
        "Full-text search over log messages; requires a non-empty query.",
        || filter_schema(&[("query", "string", true)]),
    ),
    (
        "tail_logs",
        "Return the newest N matching records (default 50).",
        || filter_schema(&[("count", "integer", false)]),
    ),
    (
        "get_stats",
        "Aggregate statistics, optionally scoped by source and/or since time.",
        || {
            json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string"},
                    "since": {"type": "number"},
                },
            })
        },
    ),
    (
        "get_categories",
        "Sorted distinct category names, optionally scoped by source.",
        || json!({"type": "object", "properties": {"source": {"type": "string"}}}),
    ),
    (
        "get_sessions",
        "Session summaries, most recent first, optionally scoped and capped.",
        || {
            json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string"},
                    "limit": {"type": "integer"},
                },
            })
        },
    ),
    (
        "clear_logs",
        "Delete records, optionally scoped by source and/or an emit-time cutoff.",
        || {
            json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string"},
                    "before": {"type": "number"},
                },
            })
        },
    ),
    (
        "add_file_source",
        "Register a new file-tail worker.",
        || {
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "name": {"type": "string"},
                },
                "required": ["path"],
            })
        },
    ),
    (
        "remove_source",
        "Stop and deregister a file-tail worker by id.",
        || {
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
            })
        },
    ),
    (
        "list_sources",
        "List every registered file-tail worker and its running state.",
        || json!({"type": "object", "properties": {}}),
    ),
];

fn filter_schema(extra: &[(&str, &str, bool)]) -> Value {
    let mut properties = json!({
        "source": {"type": "string"},
        "min_severity": {"type": "string"},
        "category": {"type": "string"},
        "emit_time_from": {"type": "number"},
        "emit_time_to": {"type": "number"},
        "session_id": {"type": "string"},
        "instance_id": {"type": "string"},
        "all_sessions": {"type": "boolean"},
        "limit": {"type": "integer"},
        "offset": {"type": "integer"},
    });
    let mut required = Vec::new();
    for (name, ty, is_required) in extra {
        properties[name] = json!({"type": ty});
        if *is_required {
            required.push(*name);
        }
    }
    json!({"type": "object", "properties": properties, "required": required})
}

pub fn catalog() -> Value {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|(name, description, schema)| {
            json!({
                "name": name,
                "description": description,
                "inputSchema": schema(),
            })
        })
        .collect();
    json!({"tools": tools})
}

/// Dispatches `tools/call`. Unknown tools and tool-level failures are
/// reported as a successful envelope with `isError: true` — only
/// malformed top-level params produce a dispatcher-level error.
pub async fn call(
    store: &SharedStore,
    sources: &Arc<SourceManager>,
    params: &Value,
) -> Result<Value, RpcError> {
    let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let (text, is_error) = match run_tool(store, sources, name, &arguments).await {
        Ok(value) => (serde_json::to_string(&value).unwrap_or_default(), false),
        Err(message) => (message, true),
    };

    Ok(json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    }))
}

async fn run_tool(
    store: &SharedStore,
    sources: &Arc<SourceManager>,
    name: &str,
    arguments: &Value,
) -> Result<Value, String> {
    match name {
        "query_logs" => {
            let filter = filter_from_value(arguments);
            let records = store.query(&filter).await.map_err(|e| e.to_string())?;
            Ok(json!(records))
        }
        "search_logs" => {
            let query = arguments.get("query").and_then(Value::as_str).unwrap_or_default();
            if query.is_empty() {
                return Err("search_logs requires a non-empty 'query'".to_string());
            }
            let filter = filter_from_value(arguments);
            let records = store
                .search(query, &filter)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!(records))
        }
        "tail_logs" => {
            let mut filter = filter_from_value(arguments);
            let count = arguments.get("count").and_then(Value::as_i64).unwrap_or(50);
            filter.limit = Some(count);
            let records = store.query(&filter).await.map_err(|e| e.to_string())?;
            Ok(json!(records))
        }
        "get_stats" => {
            let source = arguments.get("source").and_then(Value::as_str);
            let since = arguments.get("since").and_then(Value::as_f64);
            let stats = store.stats(source, since).await.map_err(|e| e.to_string())?;
            Ok(json!(stats))
        }
        "get_categories" => {
            let source = arguments.get("source").and_then(Value::as_str);
            let categories = store.categories(source).await.map_err(|e| e.to_string())?;
            Ok(json!(categories))
        }
        "get_sessions" => {
            let source = arguments.get("source").and_then(Value::as_str);
            let limit = arguments
                .get("limit")
                .and_then(Value::as_i64)
                .unwrap_or(20)
                .max(0) as usize;
            let mut sessions = store.sessions(source).await.map_err(|e| e.to_string())?;
            sessions.truncate(limit);
            Ok(json!(sessions))
        }
        "clear_logs" => {
            let source = arguments.get("source").and_then(Value::as_str);
            let before = arguments.get("before").and_then(Value::as_f64);
            let deleted = store.clear(source, before).await.map_err(|e| e.to_string())?;
            Ok(json!({"deleted": deleted, "message": format!("deleted {deleted} record(s)")}))
        }
        "add_file_source" => {
            let path = arguments
                .get("path")
                .and_then(Value::as_str)
                .ok_or("add_file_source requires 'path'")?;
            let name = arguments
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            let id = sources
                .add_file(path.to_string(), name)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"id": id}))
        }
        "remove_source" => {
            let id = arguments
                .get("id")
                .and_then(Value::as_str)
                .ok_or("remove_source requires 'id'")?;
            let removed = sources.remove(id).await;
            Ok(json!({"removed": removed}))
        }
        "list_sources" => Ok(json!(sources.list().await)),
        other => Err(format!("unknown tool: {other}")),
    }
}
