//! 线程驱动的闹钟调度模块
//! Thread-backed alarm scheduling module
//!
//! 调用者注册一个 "超时 + 回调" 对，引擎在独立的工作线程中等待指定时长，
//! 然后恰好调用一次回调，除非闹钟先被取消。一个管理器下的所有闹钟可以被
//! 一起取消，或者阻塞等待它们全部自然到期。
//!
//! Callers register a timeout-and-callback pair; the engine waits on a
//! dedicated worker thread and then invokes the callback exactly once, unless
//! the alarm is cancelled first. All alarms under one manager can be torn
//! down together, by cancellation or by blocking until they all expire.

pub mod handle;
pub mod message;
pub mod registry;
pub mod stats;
pub mod worker;

mod manager;

#[cfg(test)]
mod tests;

pub use handle::{AlarmHandle, AlarmManager};
pub use message::ControlMessage;
pub use registry::ManagerState;
pub use stats::AlarmStats;
pub use worker::{WorkerExit, WorkerId};
