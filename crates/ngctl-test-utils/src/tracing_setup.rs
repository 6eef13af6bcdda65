//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of a test to see control-channel
//! exchanges in the captured test output. The subscriber is installed at most
//! once per process, so every test may call it.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: exchange-level detail from the
/// ngctl crates, warnings from everything else.
pub const DEFAULT_TEST_FILTER: &str = "warn,ngctl_core=debug,ngctl_test_utils=debug";

/// Install a test-writer subscriber honouring `RUST_LOG`.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn pings_mock_daemon() {
///     ngctl_test_utils::tracing_setup::init_test_tracing();
///     let daemon = MockDaemon::builder().reply("PING", "OK Pong").spawn();
///     // ...
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER)),
        )
        .with_test_writer()
        .try_init();
}
