//! Tracing subscriber setup for binaries and tests embedding the store.

use tracing_subscriber::EnvFilter;

/// Default filter directives when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "puzzlegallery=trace,puzzlegallery_db=debug,puzzlegallery_common=debug"
    } else {
        "puzzlegallery=info,puzzlegallery_db=info"
    }
}

/// Install a fmt subscriber. `RUST_LOG` wins over the defaults.
///
/// Returns `false` if a global subscriber was already installed, which is
/// harmless when several tests call this.
pub fn init_tracing(verbose: bool) -> bool {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| default_directives(verbose).to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .try_init()
        .is_ok()
}
