//! Optional logging installer. A library must not install global logging
//! on its caller's behalf, so this is exposed rather than run automatically.

use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;

/// Installs a `fmt` layer filtered by `RUST_LOG` (default `info`) plus a
/// `tracing-error` layer so [`color_eyre`] can render span traces. Safe to
/// call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}
