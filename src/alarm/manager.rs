//! 闹钟管理器分发循环
//! Alarm manager dispatch loop
//!
//! 分发循环在单一线程中串行化所有会移除注册表记录的逻辑：工作线程的完成报告、
//! 单个闹钟的取消、以及 `Wait`/`Terminate` 触发的整体排空。
//!
//! The dispatch loop serializes every registry removal on a single thread:
//! worker completion reports, single-alarm cancellation, and the bulk drain
//! triggered by `Wait` or `Terminate`.

use crate::queue::QueueConsumer;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use super::message::ControlMessage;
use super::registry::Registry;
use super::stats::StatsCounters;
use super::worker::{WorkerExit, WorkerId};

/// How the manager leaves `Running`.
/// 管理器离开 `Running` 状态的方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// Join workers as they expire naturally.
    AwaitExpiry,
    /// Signal `Terminate` to every worker first.
    Cancel,
}

pub(crate) struct AlarmManagerTask {
    registry: Arc<Registry>,
    control_rx: QueueConsumer,
    stats: Arc<StatsCounters>,
}

impl AlarmManagerTask {
    pub(crate) fn new(
        registry: Arc<Registry>,
        control_rx: QueueConsumer,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            registry,
            control_rx,
            stats,
        }
    }

    /// 运行分发主循环
    /// Run dispatch main loop
    pub(crate) fn run(mut self) {
        info!("Alarm manager dispatch loop started");

        let drain = loop {
            let Some(item) = self.control_rx.pop() else {
                // Every producer is gone; nobody can ask for a drain any more.
                warn!("Control queue closed, cancelling remaining alarms");
                break Drain::Cancel;
            };

            match ControlMessage::from_item(&item) {
                Ok(message) => {
                    if let Some(drain) = self.handle_message(message) {
                        break drain;
                    }
                }
                Err(err) => {
                    self.stats.record_dropped_message();
                    error!(action = %item.action, size = item.size(), error = %err, "Dropping control message");
                }
            }
        };

        match drain {
            Drain::AwaitExpiry => self.await_expiry(),
            Drain::Cancel => self.cancel_all(),
        }
        self.registry.finish();
        info!("Alarm manager shutdown completed");
    }

    /// 处理控制消息
    /// Handle control message
    ///
    /// # Returns
    /// 返回 `Some` 表示应该排空并退出
    /// Returns `Some` if the loop should drain and exit
    fn handle_message(&mut self, message: ControlMessage) -> Option<Drain> {
        match message {
            ControlMessage::Destroy(id) => {
                if !self.reap(id) {
                    warn!(worker_id = %id, "Completion reported for unknown alarm");
                }
                None
            }
            ControlMessage::Cancel(id) => {
                if self.registry.signal(id, ControlMessage::Terminate) {
                    self.reap(id);
                } else {
                    warn!(worker_id = %id, "Cancel requested for unknown alarm");
                }
                None
            }
            ControlMessage::Wait => {
                info!("Received wait command");
                Some(Drain::AwaitExpiry)
            }
            ControlMessage::Terminate => {
                info!("Received terminate command");
                Some(Drain::Cancel)
            }
        }
    }

    /// Joins one worker, then unlinks its record.
    /// 汇合一个工作线程，然后解除其记录的链接。
    fn reap(&self, id: WorkerId) -> bool {
        let Some(thread) = self.registry.take_thread(id) else {
            return false;
        };
        join_worker(id, thread);
        if self.registry.unlink(id) {
            self.stats.record_reaped();
        }
        debug!(worker_id = %id, "Alarm reaped");
        true
    }

    /// Keeps serving `Destroy` and `Cancel` until every alarm registered
    /// before the drain has been reaped. A `Terminate` escalates to
    /// [`Self::cancel_all`].
    ///
    /// 持续处理 `Destroy` 和 `Cancel`，直到排空前注册的所有闹钟都被回收。
    /// 收到 `Terminate` 时升级为 [`Self::cancel_all`]。
    fn await_expiry(&mut self) {
        self.registry.close();
        let mut pending: HashSet<WorkerId> = self.registry.snapshot().into_iter().collect();
        info!(alarms = pending.len(), "Waiting for alarms to expire");

        while !pending.is_empty() {
            let Some(item) = self.control_rx.pop() else {
                warn!("Control queue closed while waiting, cancelling remaining alarms");
                break;
            };

            match ControlMessage::from_item(&item) {
                Ok(message @ (ControlMessage::Destroy(id) | ControlMessage::Cancel(id))) => {
                    self.handle_message(message);
                    pending.remove(&id);
                }
                Ok(ControlMessage::Terminate) => {
                    info!("Received terminate command while waiting");
                    break;
                }
                Ok(ControlMessage::Wait) => {
                    debug!("Already waiting for alarms, ignoring wait command");
                }
                Err(err) => {
                    self.stats.record_dropped_message();
                    error!(action = %item.action, size = item.size(), error = %err, "Dropping control message");
                }
            }
        }

        self.cancel_all();
    }

    /// Signals `Terminate` to every worker, joins them all, then unlinks them.
    /// 向所有工作线程发送 `Terminate`，全部汇合后再解除链接。
    fn cancel_all(&self) {
        self.registry.close();
        let ids = self.registry.snapshot();
        if ids.is_empty() {
            return;
        }
        info!(alarms = ids.len(), "Cancelling alarms");

        for &id in &ids {
            self.registry.signal(id, ControlMessage::Terminate);
        }

        // Joins happen with no registry lock held.
        let threads: Vec<_> = ids
            .iter()
            .filter_map(|&id| self.registry.take_thread(id).map(|thread| (id, thread)))
            .collect();
        for (id, thread) in threads {
            join_worker(id, thread);
        }

        for id in ids {
            if self.registry.unlink(id) {
                self.stats.record_reaped();
            }
        }
    }
}

fn join_worker(id: WorkerId, thread: JoinHandle<WorkerExit>) {
    match thread.join() {
        Ok(exit) => debug!(worker_id = %id, ?exit, "Alarm worker joined"),
        Err(_) => error!(worker_id = %id, "Alarm callback panicked"),
    }
}
