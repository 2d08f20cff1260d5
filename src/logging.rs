use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "azure_blob_upload=info,warn";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`
///
/// Does nothing if a global subscriber is already set, so it can be called
/// by every consumer of the library.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
