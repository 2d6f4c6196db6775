//! Source manager: tracks every registered file-tail worker and
//! hands out monotone `file-<N>` ids.

use crate::ingest::FileTailWorker;
use crate::model::SourceDescriptor;
use crate::sink::SinkHandle;
use crate::store::SharedStore;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

struct RegisteredSource {
    display_name: String,
    path: String,
    worker: FileTailWorker,
}

/// Owns every file-tail worker started at runtime via `add_file_source`.
pub struct SourceManager {
    sources: RwLock<rustc_hash::FxHashMap<String, RegisteredSource>>,
    next_id: AtomicU64,
    store: SharedStore,
    sink: SinkHandle,
}

impl SourceManager {
    #[must_use]
    pub fn new(store: SharedStore, sink: SinkHandle) -> Self {
        Self {
            sources: RwLock::new(rustc_hash::FxHashMap::default()),
            next_id: AtomicU64::new(1),
            store,
            sink,
        }
    }

    /// Starts tailing `path` and registers it under a freshly minted
    /// `file-<N>` id. Fails (without registering anything) if the file
    /// does not exist at start.
    pub async fn add_file(
        &self,
        path: String,
        display_name: Option<String>,
    ) -> anyhow::Result<String> {
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let worker = FileTailWorker::start(
            path.clone(),
            display_name.clone(),
            self.store.clone(),
            self.sink.clone(),
        )
        .await?;

        let resolved_name = display_name.unwrap_or_else(|| path.clone());
        self.sources.write().await.insert(
            id.clone(),
            RegisteredSource {
                display_name: resolved_name,
                path,
                worker,
            },
        );
        info!(id, "file source registered");
        self.sink.log("sources", format!("registered {id}"));
        Ok(id)
    }

    /// Stops and deregisters a source. Returns `false` if `id` was unknown.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sources.write().await.remove(id);
        match removed {
            Some(mut source) => {
                source.worker.stop().await;
                info!(id, "file source removed");
                self.sink.log("sources", format!("removed {id}"));
                true
            }
            None => false,
        }
    }

    pub async fn list(&self) -> Vec<SourceDescriptor> {
        let sources = self.sources.read().await;
        let mut descriptors: Vec<SourceDescriptor> = sources
            .iter()
            .map(|(id, s)| SourceDescriptor {
                id: id.clone(),
                kind: "file-tailer",
                display_name: s.display_name.clone(),
                path: s.path.clone(),
                running: s.worker.is_running(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    /// Stops every registered worker, e.g. during shutdown.
    pub async fn stop_all(&self) {
        let mut sources = self.sources.write().await;
        for (id, source) in sources.iter_mut() {
            source.worker.stop().await;
            info!(id, "file source stopped at shutdown");
            self.sink.log("sources", format!("stopped {id} at shutdown"));
        }
        sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn add_remove_and_list_round_trip() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let manager = SourceManager::new(store, SinkHandle::default());
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();

        let id = manager
            .add_file(path.clone(), Some("mylog".into()))
            .await
            .unwrap();
        assert_eq!(id, "file-1");

        let listed = manager.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].display_name, "mylog");

        assert!(manager.remove(&id).await);
        assert!(manager.list().await.is_empty());
        assert!(!manager.remove(&id).await);
    }

    #[tokio::test]
    async fn add_file_fails_for_missing_path() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let manager = SourceManager::new(store, SinkHandle::default());
        let result = manager.add_file("/nonexistent/path".into(), None).await;
        assert!(result.is_err());
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn ids_are_monotone_across_add_calls() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let manager = SourceManager::new(store, SinkHandle::default());
        let mut files = Vec::new();
        for _ in 0..3 {
            let f = NamedTempFile::new().unwrap();
            writeln!(&f, "x").unwrap();
            files.push(f);
        }
        let mut ids = Vec::new();
        for f in &files {
            ids.push(
                manager
                    .add_file(f.path().to_string_lossy().to_string(), None)
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(ids, vec!["file-1", "file-2", "file-3"]);
    }
}
