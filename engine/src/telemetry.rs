//! Logging setup for the bridge
//!
//! Tool dispatch, listener discovery and provider round trips all log through
//! `tracing`. The subscriber installed here decides what reaches the console:
//! readable multi-line output for local debug builds, one JSON object per
//! event in release builds so a Revit workstation's logs can be shipped as-is.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for a configured level.
///
/// The bridge and its HTTP layer follow the configured level. Connection pool
/// chatter from the HTTP client stays at `warn` unless `RUST_LOG` asks for it,
/// since listener probing opens several short-lived connections per sweep.
pub fn default_filter(log_level: &str) -> String {
    format!(
        "{level},revit_mcp_engine={level},tower_http={level},hyper=warn,reqwest=warn",
        level = log_level
    )
}

/// Install the global subscriber.
///
/// Priority: `RUST_LOG` > `log_level` (from config or `--log`). Calling this
/// twice is harmless; the second install is ignored.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
            .ok();
    }
}
