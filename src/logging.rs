//! Optional `tracing-subscriber` bootstrap for binaries embedding this
//! crate. SPEC_FULL §10.2 — the teacher's own telemetry setup without an
//! OpenTelemetry exporter, since this library has no server process to
//! export spans from.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a formatting subscriber driven by `RUST_LOG` (defaulting to
/// `info`). Safe to call once at process start; a second call is a no-op
/// logged at debug level rather than a panic, since library initialization
/// order is the embedder's responsibility, not this crate's.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already initialized, skipping");
    }
}
