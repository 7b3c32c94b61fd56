//! Logging setup for applications built on `nova-rag`.
//!
//! The library crates only emit `tracing` events; a host decides where they
//! go. This crate installs a `tracing-subscriber` stack with an
//! [`EnvFilter`] read from `RUST_LOG` (default `info`) and either
//! human-readable or JSON output.
//!
//! ```rust,ignore
//! nova_telemetry::init_telemetry("rag-demo")?;
//! tracing::info!("ready");
//! ```
//!
//! Initialisation is idempotent: the first successful call wins and later
//! calls return `Ok(())` without touching the installed subscriber.

mod memory;

pub use memory::{CapturedEvent, EventStorage, InMemoryEventLayer};

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Filter directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

static INIT: OnceLock<()> = OnceLock::new();

/// Error returned when a global subscriber could not be installed.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialise telemetry: {0}")]
pub struct TelemetryError(String);

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn install(
    service_name: &str,
    json: bool,
    storage: Option<EventStorage>,
) -> Result<(), TelemetryError> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let capture = storage.map(InMemoryEventLayer::new);
    let result = if json {
        Registry::default()
            .with(env_filter())
            .with(fmt::layer().json().with_target(true))
            .with(capture)
            .try_init()
    } else {
        Registry::default()
            .with(env_filter())
            .with(fmt::layer().with_target(true))
            .with(capture)
            .try_init()
    };

    result.map_err(|e| TelemetryError(e.to_string()))?;
    let _ = INIT.set(());
    tracing::debug!(service.name = service_name, json, "telemetry initialised");
    Ok(())
}

/// Install a human-readable fmt subscriber.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    install(service_name, false, None)
}

/// Install a JSON fmt subscriber, one object per line.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    install(service_name, true, None)
}

/// Install a fmt subscriber that also records every event into `storage`.
pub fn init_with_storage(service_name: &str, storage: EventStorage) -> Result<(), TelemetryError> {
    install(service_name, false, Some(storage))
}

/// A subscriber that only records into `storage`, for scoped use with
/// [`tracing::subscriber::with_default`] or `set_default`.
pub fn capture_subscriber(storage: EventStorage) -> impl tracing::Subscriber + Send + Sync {
    Registry::default().with(InMemoryEventLayer::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn capture_records_message_and_fields() {
        let storage = EventStorage::new();
        tracing::subscriber::with_default(capture_subscriber(storage.clone()), || {
            tracing::warn!(document.id = "doc-1", chunk_count = 3u64, "embedding failed");
            tracing::info!(ratio = 0.5, "done");
        });

        let warnings = storage.at_level(Level::WARN);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "embedding failed");
        assert_eq!(warnings[0].field_str("document.id"), Some("doc-1"));
        assert_eq!(warnings[0].fields["chunk_count"], serde_json::json!(3));
        assert!(storage.contains_message("done"));

        storage.clear();
        assert!(storage.events().is_empty());
    }

    #[test]
    fn events_outside_scope_are_not_captured() {
        let storage = EventStorage::new();
        tracing::subscriber::with_default(capture_subscriber(storage.clone()), || {});
        tracing::error!("elsewhere");
        assert!(!storage.contains_message("elsewhere"));
    }

    #[test]
    fn repeated_init_is_ok() {
        assert!(init_telemetry("test").is_ok());
        assert!(init_json_telemetry("test").is_ok());
    }
}
