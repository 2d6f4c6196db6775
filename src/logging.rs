//! Process-wide `tracing` bootstrap: JSON output under
//! `LOGAGG_ENV=production`, pretty console output otherwise.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init(service_name: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let is_production = std::env::var("LOGAGG_ENV")
        .map(|e| e == "production")
        .unwrap_or(false);

    if is_production {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true);
        tracing_subscriber::registry().with(filter).with(json_layer).init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer().pretty().with_target(true);
        tracing_subscriber::registry().with(filter).with(console_layer).init();
    }

    tracing::info!(
        service = service_name,
        version = env!("CARGO_PKG_VERSION"),
        "service initialized"
    );
}
