#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Test helpers for the hyperweave workspace.
//!
//! Call [`setup`] at the top of a test to get `tracing` output from the
//! engine (build it with `--features tracing` to see compile and render
//! events). The filter is read from `HYPERWEAVE_LOG` using the
//! [`Targets`] syntax, e.g. `HYPERWEAVE_LOG=hyperweave=trace`.

use std::sync::LazyLock;
use std::time::Instant;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

struct Uptime;

impl FormatTime for Uptime {
    fn format_time(&self, w: &mut Writer<'_>) -> core::fmt::Result {
        let elapsed = START_TIME.elapsed();
        write!(w, "{:4}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
    }
}

/// Installs the global subscriber exactly once per test process.
static SUBSCRIBER_INIT: LazyLock<()> = LazyLock::new(|| {
    let _ = *START_TIME;

    let filter = std::env::var("HYPERWEAVE_LOG")
        .ok()
        .and_then(|s| s.parse::<Targets>().ok())
        .unwrap_or_else(|| Targets::new().with_default(tracing::Level::DEBUG));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_timer(Uptime)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .try_init()
        .ok();
});

/// Set up a tracing subscriber for tests.
///
/// Safe to call from every test: the subscriber is initialized once through
/// [`LazyLock`], and a subscriber installed by someone else is left alone.
pub fn setup() {
    #[allow(clippy::let_unit_value)]
    let _ = *SUBSCRIBER_INIT;
}

/// Records the order in which things happen across tasks.
///
/// Streaming tests use this to show that values completed in one order while
/// fragments were emitted in another.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.into());
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
