//! Logging infrastructure
//!
//! Tracing subscriber setup and the pipeline audit trail.

pub mod audit;

pub use audit::{AuditEvent, AuditEventType, AuditLogger};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("template_pipeline={},info", log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
