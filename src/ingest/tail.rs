//! File-tail worker: follows one file path, emitting one record per
//! newline-terminated line observed after start.

use crate::model::{LogRecord, Severity};
use crate::sink::SinkHandle;
use crate::store::SharedStore;
use std::io::SeekFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::{sleep, Duration};
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const MISSING_FILE_BACKOFF: Duration = Duration::from_secs(1);
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Safety cap on a single line's length (unspecified
/// behavior for lines exceeding available memory).
const MAX_LINE_BYTES: usize = 1_000_000;

pub struct FileTailWorker {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl FileTailWorker {
    /// Starts tailing `path`. Returns an error if the file does not exist
    /// at start — the caller (source manager) treats that as a failed add.
    pub async fn start(
        path: String,
        display_name: Option<String>,
        store: SharedStore,
        sink: SinkHandle,
    ) -> anyhow::Result<Self> {
        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            sink.error("ingest.tail", format!("file not found: {path}: {e}"));
            e
        })?;

        let category = display_name.unwrap_or_else(|| {
            std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone())
        });

        let running = Arc::new(AtomicBool::new(true));
        let running_task = Arc::clone(&running);
        let mut offset = metadata.len();

        let handle = tokio::spawn(async move {
            loop {
                if !running_task.load(Ordering::Acquire) {
                    break;
                }

                match tokio::fs::metadata(&path).await {
                    Err(_) => {
                        sleep(MISSING_FILE_BACKOFF).await;
                        continue;
                    }
                    Ok(meta) => {
                        let current_size = meta.len();
                        if current_size < offset {
                            // Rotated or truncated.
                            offset = 0;
                        }
                        if current_size > offset {
                            match read_new_lines(&path, offset, &category, &store, &sink).await {
                                Ok(new_offset) => offset = new_offset,
                                Err(e) => {
                                    sink.error("ingest.tail", format!("read error on {path}: {e}"));
                                    sleep(READ_ERROR_BACKOFF).await;
                                    continue;
                                }
                            }
                        }
                    }
                }

                sleep(POLL_INTERVAL).await;
            }
            info!(path, "file tail worker terminated");
        });

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

async fn read_new_lines(
    path: &str,
    offset: u64,
    category: &str,
    store: &SharedStore,
    sink: &SinkHandle,
) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut reader = BufReader::new(file);

    let mut consumed = offset;
    loop {
        let mut line = Vec::new();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            break;
        }
        consumed += bytes_read as u64;

        if line.len() > MAX_LINE_BYTES {
            sink.error(
                "ingest.tail",
                format!("line exceeds {MAX_LINE_BYTES} bytes, dropped"),
            );
            continue;
        }

        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }

        let now = now_seconds();
        let record = LogRecord {
            id: 0,
            source: "file-tailer".to_string(),
            category: category.to_string(),
            severity: Severity::Log,
            message: trimmed.to_string(),
            emit_time: now,
            receive_time: now,
            frame: None,
            file: None,
            line: None,
            session_id: String::new(),
            instance_id: String::new(),
        };

        if let Err(e) = store.insert(record).await {
            sink.error("ingest.tail", format!("storage failure: {e}"));
        }
    }
    Ok(consumed)
}

fn now_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
