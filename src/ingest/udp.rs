//! Datagram receiver: a background worker bound to a UDP socket,
//! each datagram treated as one UTF-8 JSON object.

use crate::model::IngestPayload;
use crate::sink::SinkHandle;
use crate::store::SharedStore;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{error, info};

const MAX_DATAGRAM_SIZE: usize = 65_536;

pub struct DatagramReceiver {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl DatagramReceiver {
    /// Binds the socket and starts the receive loop immediately.
    pub async fn start(port: u16, store: SharedStore, sink: SinkHandle) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        info!(port, "datagram receiver bound");

        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut buf = vec![0_u8; MAX_DATAGRAM_SIZE];
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    recv = socket.recv_from(&mut buf) => match recv {
                        Ok((len, _addr)) => {
                            if let Err(e) = handle_datagram(&buf[..len], &store, &sink).await {
                                sink.error("ingest.udp", format!("dropped datagram: {e}"));
                            }
                        }
                        Err(e) => {
                            error!("datagram receive error: {e}");
                            sink.error("ingest.udp", format!("receive error: {e}"));
                        }
                    },
                }
            }
            info!("datagram receiver stopped");
        });

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signals the receive loop to stop at its next receive and waits for
    /// it to drain any in-flight callback before returning.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn handle_datagram(
    bytes: &[u8],
    store: &SharedStore,
    sink: &SinkHandle,
) -> Result<(), crate::errors::IngestError> {
    let payload = IngestPayload::parse(bytes)?;
    let receive_time = now_seconds();
    let record = payload.into_record(receive_time);
    store.insert(record).await.map_err(|e| {
        sink.error("ingest.udp", format!("storage failure: {e}"));
        crate::errors::IngestError::Io(std::io::Error::other(e.to_string()))
    })?;
    Ok(())
}

fn now_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Filter;
    use crate::store::Store;
    use std::sync::Arc;

    #[tokio::test]
    async fn malformed_datagram_is_dropped_without_blocking_next() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let sink = SinkHandle::default();

        let err = handle_datagram(b"not json", &store, &sink).await;
        assert!(err.is_err());

        let good = br#"{"source":"client","category":"c","verbosity":"Log","message":"ok"}"#;
        handle_datagram(good, &store, &sink).await.unwrap();

        let filter = Filter {
            all_sessions: true,
            ..Default::default()
        };
        let rows = store.query(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "ok");
    }

    #[tokio::test]
    async fn empty_datagram_is_rejected() {
        let store: SharedStore = Arc::new(Store::open_in_memory().await.unwrap());
        let sink = SinkHandle::default();
        assert!(handle_datagram(b"", &store, &sink).await.is_err());
    }
}
