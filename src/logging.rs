//! Tracing subscriber setup.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static TEST_LOGGING: Once = Once::new();

/// Maps a `-v` count to the default log level.
#[must_use]
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Subscriber for the operator binary. `RUST_LOG` overrides the default level.
pub fn subscriber(verbose: u8) -> impl tracing::Subscriber + Send + Sync + 'static {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbose).into())
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish()
}

/// Installs a subscriber that writes through the test harness's capture.
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_logging() {
    TEST_LOGGING.call_once(|| {
        let env_filter = EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}
