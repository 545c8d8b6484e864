//! Test logging initialization.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Default filter when neither `TEST_LOG` nor `RUST_LOG` is set. Room and
/// connection warnings are common in negative-path tests, so stay quiet.
const DEFAULT_TEST_FILTER: &str = "error";

/// Install a test-writer subscriber once per test binary.
///
/// Level precedence: `TEST_LOG`, then `RUST_LOG`, then [`DEFAULT_TEST_FILTER`].
/// Output goes through `with_test_writer()` so libtest captures it per test.
///
/// ```bash
/// TEST_LOG=sketch_backend=debug cargo test -p sketch-backend --test room_tests
/// ```
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        // try_init: another harness may have installed a subscriber already
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .with_target(true)
            .try_init()
            .ok();
    });
}
