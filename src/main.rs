//! `logaggd` — multi-source log aggregation service entry point.

use clap::Parser;
use logagg::config::TlsConfig;
use logagg::Config;
use tracing::error;

/// Multi-source log aggregation service with an agent-facing RPC interface.
#[derive(Parser, Debug)]
#[command(name = "logaggd", version, about)]
struct Cli {
    /// Configuration file path, layered under `LOGAGG_*` environment overrides.
    #[arg(short, long)]
    config: Option<String>,

    /// Ingest datagram port.
    #[arg(long)]
    udp_port: Option<u16>,

    /// Transport (HTTP) port.
    #[arg(long)]
    http_port: Option<u16>,

    /// Store path.
    #[arg(long)]
    db: Option<String>,

    /// Register a file tailer at start.
    #[arg(long)]
    tail: Option<String>,

    /// Display name for the `--tail` target.
    #[arg(long)]
    tail_name: Option<String>,

    /// TLS certificate path (requires `--key`).
    #[arg(long)]
    cert: Option<String>,

    /// TLS private key path (requires `--cert`).
    #[arg(long)]
    key: Option<String>,

    /// Replace the terminal UI sink with the default stdout/stderr sink.
    #[arg(long)]
    legacy_console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logagg::logging::init("logagg");

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(udp_port) = cli.udp_port {
        config.ingest.udp_port = udp_port;
    }
    if let Some(http_port) = cli.http_port {
        config.transport.http_port = http_port;
    }
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    if let Some(tail) = cli.tail {
        config.ingest.tail_files.push((tail, cli.tail_name));
    }
    if let (Some(cert_path), Some(key_path)) = (cli.cert, cli.key) {
        config.transport.tls = Some(TlsConfig { cert_path, key_path });
    }
    if cli.legacy_console {
        config.legacy_console = true;
    }

    if let Err(e) = logagg::run(config).await {
        error!("fatal error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
