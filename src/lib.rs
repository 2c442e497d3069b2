#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the thread-backed alarm scheduling library.
//! 线程驱动闹钟调度库的根。

pub mod alarm;
pub mod config;
pub mod error;
pub mod queue;

#[cfg(test)]
mod testing;

pub use alarm::{AlarmHandle, AlarmManager, AlarmStats, ManagerState, WorkerId};
pub use config::Config;
pub use error::{Error, Result};
