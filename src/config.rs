//! 定义了闹钟管理器的可配置参数。
//! Defines configurable parameters for the alarm manager.

use crate::error::{Error, Result};
use std::time::Duration;

/// The default poll granularity: the longest a worker sleeps before it
/// looks at its control queue again.
///
/// 默认轮询粒度：工作线程在再次检查控制队列之前的最长睡眠时间。
pub const DEFAULT_POLL_GRANULARITY: Duration = Duration::from_secs(5);

/// A structure containing all configurable parameters for an alarm manager.
///
/// 包含闹钟管理器所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct Config {
    /// Upper bound of a single sleep slice. This also bounds how long a
    /// cancelled worker can keep running before it notices.
    ///
    /// 单个睡眠片的上限。同时也限定了被取消的工作线程在察觉之前可以继续运行的时长。
    pub poll_granularity: Duration,

    /// Prefix for worker thread names. Workers are named `{prefix}-{id}`.
    /// 工作线程名称前缀。工作线程命名为 `{prefix}-{id}`。
    pub worker_thread_name: String,

    /// Name of the dispatch thread.
    /// 分发线程的名称。
    pub manager_thread_name: String,
}

impl Config {
    /// Checks that the configuration can drive a manager.
    /// 检查配置是否可以驱动管理器。
    pub fn validate(&self) -> Result<()> {
        if self.poll_granularity.is_zero() {
            return Err(Error::InvalidConfig("poll_granularity must be non-zero"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_granularity: DEFAULT_POLL_GRANULARITY,
            worker_thread_name: "alarm-worker".to_string(),
            manager_thread_name: "alarm-manager".to_string(),
        }
    }
}
