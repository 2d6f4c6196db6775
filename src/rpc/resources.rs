//! Read-only resource catalog and dispatch for `resources/list` and
//! `resources/read`.

use crate::errors::RpcError;
use crate::model::{Filter, Severity};
use crate::store::SharedStore;
use serde_json::{json, Value};

const RECENT_LIMIT: i64 = 100;

pub fn catalog() -> Value {
    json!({
        "resources": [
            {
                "uri": "logs://recent",
                "name": "Recent logs",
                "description": "Newest 100 records under the default (latest-session) filter.",
                "mimeType": "application/json",
            },
            {
                "uri": "logs://stats",
                "name": "Statistics",
                "description": "Current aggregate store statistics.",
                "mimeType": "application/json",
            },
            {
                "uri": "logs://errors",
                "name": "Recent errors",
                "description": "Newest 100 Error-or-worse records under the default filter.",
                "mimeType": "application/json",
            },
            {
                "uri": "logs://current-session",
                "name": "Current session",
                "description": "The latest session id, its record count, and its newest 100 records.",
                "mimeType": "application/json",
            },
        ]
    })
}

pub async fn read(store: &SharedStore, params: &Value) -> Result<Value, RpcError> {
    let uri = params
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("resources/read requires 'uri'"))?;

    let body = match uri {
        "logs://recent" => {
            let filter = Filter {
                limit: Some(RECENT_LIMIT),
                ..Default::default()
            };
            json!(store.query(&filter).await?)
        }
        "logs://stats" => json!(store.stats(None, None).await?),
        "logs://errors" => {
            let filter = Filter {
                min_severity: Some(Severity::Error),
                limit: Some(RECENT_LIMIT),
                ..Default::default()
            };
            json!(store.query(&filter).await?)
        }
        "logs://current-session" => {
            let session_id = store.latest_session(None).await?;
            let filter = Filter {
                session_id: Some(session_id.clone()),
                all_sessions: true,
                limit: Some(RECENT_LIMIT),
                ..Default::default()
            };
            let logs = store.query(&filter).await?;
            json!({"session_id": session_id, "count": logs.len(), "logs": logs})
        }
        other => {
            return Err(RpcError::invalid_params(format!(
                "unknown resource uri: {other}"
            )))
        }
    };

    Ok(json!({
        "contents": [{"uri": uri, "mimeType": "application/json", "text": body.to_string()}],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkHandle;
    use crate::store::Store;
    use std::sync::Arc;

    #[tokio::test]
    async fn unknown_uri_is_invalid_params() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let err = read(&store, &json!({"uri": "logs://bogus"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn current_session_on_empty_store_reports_empty_session() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let _ = SinkHandle::default();
        let resp = read(&store, &json!({"uri": "logs://current-session"}))
            .await
            .unwrap();
        let text = resp["contents"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["session_id"], "");
        assert_eq!(parsed["count"], 0);
    }
}
