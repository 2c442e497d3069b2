//! 闹钟工作线程
//! Alarm worker
//!
//! 每个已注册的闹钟对应一个工作线程。工作线程以有界的时间片睡眠，在时间片之间
//! 检查自己的控制队列是否收到取消消息；超时自然到期后恰好调用一次回调，
//! 然后向管理器报告自身已完成。
//!
//! One worker thread runs per registered alarm. It sleeps in bounded slices,
//! checking its private control queue for a cancellation between slices. On
//! natural expiry it invokes the callback exactly once and then reports its
//! own completion to the manager.

use crate::queue::{QueueConsumer, QueueProducer};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use super::message::ControlMessage;
use super::stats::StatsCounters;

/// Stable identity of a registered alarm.
/// 已注册闹钟的稳定标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    /// Key of the registry that owns the worker running on this thread, zero
    /// on every other thread.
    static OWNING_REGISTRY: Cell<u64> = const { Cell::new(0) };
}

/// Marks the current thread as a worker of the registry with `key`.
/// 将当前线程标记为 `key` 对应注册表的工作线程。
pub(crate) fn enter_worker_thread(key: u64) {
    OWNING_REGISTRY.with(|owner| owner.set(key));
}

/// Whether the current thread is a worker of the registry with `key`.
/// 当前线程是否为 `key` 对应注册表的工作线程。
pub(crate) fn is_worker_thread_of(key: u64) -> bool {
    OWNING_REGISTRY.with(|owner| owner.get() == key)
}

/// Posts `Destroy` when dropped, including while a panicking callback unwinds.
/// 在被丢弃时发送 `Destroy`，包括回调发生 panic 展开的时候。
struct CompletionReport {
    id: WorkerId,
    manager_tx: QueueProducer,
}

impl Drop for CompletionReport {
    fn drop(&mut self) {
        if let Err(err) = self
            .manager_tx
            .push_item(ControlMessage::Destroy(self.id).into_item())
        {
            warn!(worker_id = %self.id, error = %err, "Manager gone, completion not reported");
        }
    }
}

/// The user callback with its data already bound.
/// 已绑定用户数据的回调。
pub(crate) type AlarmCallback = Box<dyn FnOnce() + Send + 'static>;

/// How a worker thread left its run loop.
/// 工作线程退出运行循环的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// 超时到期并调用了回调
    /// The timeout elapsed and the callback ran
    Fired,
    /// 在到期之前被取消
    /// Cancelled before expiry
    Cancelled,
}

pub(crate) struct AlarmWorker {
    id: WorkerId,
    timeout: Duration,
    poll_granularity: Duration,
    callback: AlarmCallback,
    control_rx: QueueConsumer,
    manager_tx: QueueProducer,
    stats: Arc<StatsCounters>,
}

impl AlarmWorker {
    pub(crate) fn new(
        id: WorkerId,
        timeout: Duration,
        poll_granularity: Duration,
        callback: AlarmCallback,
        control_rx: QueueConsumer,
        manager_tx: QueueProducer,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            id,
            timeout,
            poll_granularity,
            callback,
            control_rx,
            manager_tx,
            stats,
        }
    }

    /// 运行工作线程主循环
    /// Run worker main loop
    ///
    /// A zero timeout fires without sleeping. Cancellation is only observed
    /// while time remains, so a `Terminate` that lands during the final slice
    /// does not stop the callback.
    pub(crate) fn run(mut self) -> WorkerExit {
        let started = Instant::now();

        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }

            if self.cancel_requested() {
                debug!(worker_id = %self.id, "Alarm cancelled before expiry");
                self.stats.record_cancelled();
                return WorkerExit::Cancelled;
            }

            let slice = remaining.min(self.poll_granularity);
            trace!(worker_id = %self.id, ?slice, ?remaining, "Alarm sleeping");
            thread::sleep(slice);
        }

        let Self {
            id,
            callback,
            manager_tx,
            stats,
            ..
        } = self;

        // 回调先于完成报告发生
        // The callback happens-before the completion report
        let report = CompletionReport { id, manager_tx };
        callback();
        stats.record_fired();
        debug!(worker_id = %id, "Alarm fired");
        drop(report);

        WorkerExit::Fired
    }

    /// Drains the control queue without blocking, looking for `Terminate`.
    /// 非阻塞地排空控制队列，查找 `Terminate`。
    fn cancel_requested(&mut self) -> bool {
        while let Some(item) = self.control_rx.try_pop() {
            match ControlMessage::from_item(&item) {
                Ok(ControlMessage::Terminate) => return true,
                Ok(other) => {
                    warn!(worker_id = %self.id, action = other.action(), "Worker ignoring control message");
                }
                Err(err) => {
                    self.stats.record_dropped_message();
                    error!(worker_id = %self.id, error = %err, "Dropping control message");
                }
            }
        }
        false
    }
}
