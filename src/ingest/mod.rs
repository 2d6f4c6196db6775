//! The ingestion plane: a UDP datagram receiver started once at
//! startup, plus zero or more file-tail workers managed by the source
//! manager.

pub mod tail;
pub mod udp;

pub use tail::FileTailWorker;
pub use udp::DatagramReceiver;
