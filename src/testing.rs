//! 测试辅助工具模块
//! Test utilities module

#![cfg(test)]

use crate::config::Config;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Poll granularity used by unit tests so cancellation is observed quickly.
pub const TEST_GRANULARITY: Duration = Duration::from_millis(20);

pub fn test_config() -> Config {
    Config {
        poll_granularity: TEST_GRANULARITY,
        ..Config::default()
    }
}

/// Counts callback invocations across worker threads.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback suitable for `AlarmManager::register` that bumps this counter.
    pub fn callback(&self) -> impl FnOnce(()) + Send + 'static {
        let counter = self.0.clone();
        move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
