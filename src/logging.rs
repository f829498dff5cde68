//! Logging setup
//!
//! `RUST_LOG` selects levels (default `info`). `LOG_FORMAT=json` switches to
//! one JSON object per line for log collectors.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info,sqlx=warn,tower_governor=warn";

/// Initialize the global subscriber once; later calls are no-ops
pub fn init() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

        let registry = tracing_subscriber::registry().with(filter);
        let result = if json {
            registry.with(fmt::layer().json().with_target(true)).try_init()
        } else {
            registry.with(fmt::layer().with_target(true)).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized: {e}");
        }
    });
}
