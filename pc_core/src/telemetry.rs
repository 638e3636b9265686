use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Only the first call has any effect.
///
/// `production` selects JSON lines; anything else gets the pretty formatter.
/// The filter comes from `RUST_LOG` and falls back to `info`.
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let result = if env == "production" {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .with(env_filter)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .with(env_filter)
                .try_init()
        };

        match result {
            Ok(()) => tracing::info!(service = %service, env = %env, "Tracing initialized"),
            // Another subscriber (e.g. a test harness) got there first
            Err(e) => tracing::debug!(error = %e, "Tracing subscriber already installed"),
        }
    });
}
