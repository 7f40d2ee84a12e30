//! Tracing subscriber setup.

use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppError;

/// Set to `json` for Bunyan-formatted output.
pub const LOG_FORMAT_ENV: &str = "LEADFLOW_LOG_FORMAT";

/// Install the global subscriber. Filtering follows `RUST_LOG` (default `info`).
///
/// Logs go to stderr; stdout is left to the caller's output.
pub fn init_subscriber(name: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.trim().eq_ignore_ascii_case("json"));

    let human = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let storage = json.then_some(JsonStorageLayer);
    let bunyan = json.then(|| BunyanFormattingLayer::new(name.to_string(), std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(storage)
        .with(bunyan)
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
