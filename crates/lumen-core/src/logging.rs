use tracing_subscriber::EnvFilter;

/// Default filter directive used by [`init`].
pub const DEFAULT_FILTER: &str = "info,lumen_render=debug,lumen_text=debug";

/// Installs a `fmt` subscriber. `RUST_LOG` overrides [`DEFAULT_FILTER`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Installs a `fmt` subscriber with an explicit filter directive.
///
/// Calling this after a subscriber is already installed does nothing.
pub fn init_with_filter(directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .try_init();
}
