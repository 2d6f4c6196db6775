//! Internal diagnostic sink: a process-wide, pluggable channel for
//! component-tagged log/error lines that is *not* a store subscriber.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};

/// A diagnostic sink. The default forwards to `tracing`; an alternative
/// implementation can forward to an external terminal UI instead.
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, component: &str, msg: &str);
    fn error(&self, component: &str, msg: &str);
}

/// Forwards to `tracing`, tagging each line with its component.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, component: &str, msg: &str) {
        info!(component, "{msg}");
    }

    fn error(&self, component: &str, msg: &str) {
        error!(component, "{msg}");
    }
}

/// Holds the currently-installed sink behind a guard, so swapping sinks
/// (e.g. the CLI's `--legacy-console` flag) blocks concurrent log calls
/// until installation completes.
#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<RwLock<Arc<dyn DiagnosticSink>>>,
}

impl SinkHandle {
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(sink)),
        }
    }

    pub fn install(&self, sink: Arc<dyn DiagnosticSink>) {
        *self.inner.write() = sink;
    }

    pub fn log(&self, component: &str, msg: impl AsRef<str>) {
        self.inner.read().log(component, msg.as_ref());
    }

    pub fn error(&self, component: &str, msg: impl AsRef<str>) {
        self.inner.read().error(component, msg.as_ref());
    }
}

impl Default for SinkHandle {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn log(&self, component: &str, msg: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("log:{component}:{msg}"));
        }
        fn error(&self, component: &str, msg: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("error:{component}:{msg}"));
        }
    }

    #[test]
    fn install_swaps_the_active_sink() {
        let handle = SinkHandle::default();
        let recording = Arc::new(RecordingSink::default());
        handle.install(recording.clone());
        handle.log("store", "hello");
        handle.error("store", "bye");
        let lines = recording.lines.lock().unwrap();
        assert_eq!(lines[0], "log:store:hello");
        assert_eq!(lines[1], "error:store:bye");
    }
}
