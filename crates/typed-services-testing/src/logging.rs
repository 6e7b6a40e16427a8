use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_TEST_FILTER: &str = "typed_services_core=debug,typed_services_testing=debug";

/// Install a test-friendly subscriber once per process. Output goes through
/// the test harness's capture; `RUST_LOG` overrides the default filter.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        // Another subscriber may already be installed by the host test suite.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
