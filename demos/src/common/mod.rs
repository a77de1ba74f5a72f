//! Utilities shared by the demo binaries.

pub mod backend;
pub mod stats;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use stats::{RunningStats, TensorStats};

/// Install a `tracing` subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
