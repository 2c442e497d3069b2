//! tests/common/harness.rs
#![allow(dead_code)]

use alarm_engine::{AlarmManager, Config};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Once,
};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

/// Poll granularity used by the integration tests.
pub const GRANULARITY: Duration = Duration::from_millis(25);

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "alarm_engine=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .init();
    });
}

/// Creates a manager with a short poll granularity so cancellation is quick.
pub fn manager() -> AlarmManager {
    init_tracing();
    AlarmManager::with_config(Config {
        poll_granularity: GRANULARITY,
        ..Config::default()
    })
    .unwrap()
}

/// Shared counter of callback invocations.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn callback(&self) -> impl FnOnce(()) + Send + 'static {
        let inner = self.0.clone();
        move |()| {
            inner.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
