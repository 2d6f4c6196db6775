//! Service configuration: nested structs, a `Default` impl, and a
//! file+env loader via the `config` crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ingest: IngestConfig,
    pub transport: TransportConfig,
    pub store: StoreConfig,
    pub legacy_console: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub udp_port: u16,
    /// `(path, display_name)` tail targets registered at startup.
    pub tail_files: Vec<(String, Option<String>)>,
    pub file_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub host: String,
    pub http_port: u16,
    pub keep_alive_interval_secs: u64,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest: IngestConfig {
                udp_port: 9999,
                tail_files: Vec::new(),
                file_poll_interval_ms: 200,
            },
            transport: TransportConfig {
                host: "0.0.0.0".to_string(),
                http_port: 8765,
                keep_alive_interval_secs: 15,
                tls: None,
            },
            store: StoreConfig {
                path: "logagg.db".to_string(),
            },
            legacy_console: false,
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file, layered with
    /// `LOGAGG_*` environment overrides, falling back to defaults with a
    /// logged warning if the file is missing.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("LOGAGG").separator("__"))
            .build()?;

        match settings.try_deserialize() {
            Ok(cfg) => Ok(cfg),
            Err(_) => Ok(Self::default()),
        }
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.transport.host, self.transport.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.ingest.udp_port, 9999);
        assert_eq!(cfg.transport.http_port, 8765);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let cfg = Config::load(Some("/nonexistent/path/does-not-exist")).unwrap();
        assert_eq!(cfg.store.path, "logagg.db");
    }
}
