//! 工作线程注册表
//! Worker registry
//!
//! 注册表按稳定的工作线程标识保存所有活跃闹钟的记录。插入可以在任意调用者线程中
//! 并发发生，移除只由管理器的分发线程执行。注册表同时持有管理器的生命周期状态：
//! 注册在状态读锁下进行，排空开始时获取写锁，因此排空快照之后不会再有新的记录出现。
//!
//! The registry holds one record per live alarm, keyed by a stable worker
//! identity. Insertion may happen concurrently from any caller thread; removal
//! is done only by the manager's dispatch thread. The registry also owns the
//! manager lifecycle state: registration runs under the state read lock and
//! draining takes the write lock, so no record can appear after the drain
//! snapshot is taken.

use crate::error::{Error, Result};
use crate::queue::QueueProducer;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::trace;

use super::message::ControlMessage;
use super::worker::{WorkerExit, WorkerId};

/// 管理器生命周期状态
/// Manager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// 正在消费控制队列，接受注册
    /// Consuming the control queue and accepting registrations
    Running,
    /// 收到 `Wait` 或 `Terminate`，正在汇合工作线程
    /// Received `Wait` or `Terminate`, joining workers
    Draining,
    /// 分发循环已返回
    /// The dispatch loop has returned
    Terminated,
}

/// One live alarm.
/// 一个活跃的闹钟。
#[derive(Debug)]
pub(crate) struct WorkerRecord {
    control_tx: QueueProducer,
    thread: Option<JoinHandle<WorkerExit>>,
}

impl WorkerRecord {
    pub(crate) fn new(control_tx: QueueProducer, thread: JoinHandle<WorkerExit>) -> Self {
        Self {
            control_tx,
            thread: Some(thread),
        }
    }
}

static NEXT_REGISTRY_KEY: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct Registry {
    key: u64,
    state: RwLock<ManagerState>,
    workers: DashMap<WorkerId, WorkerRecord>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            key: NEXT_REGISTRY_KEY.fetch_add(1, Ordering::Relaxed),
            state: RwLock::new(ManagerState::Running),
            workers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Process-unique key, never zero.
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn state(&self) -> ManagerState {
        *self.state.read()
    }

    /// Allocates an identity and links the record built by `start`.
    ///
    /// `start` runs while the slot for the new identity is locked, so the
    /// worker it spawns cannot be reaped before its record is visible. If
    /// `start` fails nothing is linked.
    ///
    /// 分配标识并链接由 `start` 构建的记录。
    ///
    /// `start` 在新标识的槽位被锁定期间运行，因此它启动的工作线程在其记录可见之前
    /// 不会被回收。如果 `start` 失败，则不会链接任何内容。
    pub(crate) fn register<F>(&self, start: F) -> Result<WorkerId>
    where
        F: FnOnce(WorkerId) -> Result<WorkerRecord>,
    {
        let state = self.state.read();
        if *state != ManagerState::Running {
            return Err(Error::ManagerClosed);
        }

        let id = WorkerId::from_u64(self.next_id.fetch_add(1, Ordering::Relaxed));
        // The shard lock is held across the thread spawn inside `start`: a
        // zero-timeout worker's `Destroy` must find its record linked. Lookups
        // on the same shard wait for the spawn.
        self.workers.entry(id).or_try_insert_with(|| start(id))?;
        Ok(id)
    }

    /// Stops accepting registrations. Waits for in-flight registrations.
    /// 停止接受注册。会等待正在进行的注册完成。
    pub(crate) fn close(&self) {
        let mut state = self.state.write();
        if *state == ManagerState::Running {
            *state = ManagerState::Draining;
        }
    }

    pub(crate) fn finish(&self) {
        *self.state.write() = ManagerState::Terminated;
    }

    pub(crate) fn contains(&self, id: WorkerId) -> bool {
        self.workers.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    /// Live identities in registration order.
    /// 按注册顺序排列的活跃标识。
    pub(crate) fn snapshot(&self) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self.workers.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Pushes a message onto a worker's private queue. Returns false if the
    /// worker is not registered.
    ///
    /// 向工作线程的私有队列推送消息。如果工作线程未注册则返回 false。
    pub(crate) fn signal(&self, id: WorkerId, message: ControlMessage) -> bool {
        let Some(record) = self.workers.get(&id) else {
            return false;
        };
        // A worker that already left its loop has dropped its queue.
        if let Err(err) = record.control_tx.push_item(message.into_item()) {
            trace!(worker_id = %id, error = %err, "Worker already exited, signal not delivered");
        }
        true
    }

    /// Takes the join handle out of a record, leaving the record linked.
    /// 从记录中取出汇合句柄，记录本身保持链接。
    pub(crate) fn take_thread(&self, id: WorkerId) -> Option<JoinHandle<WorkerExit>> {
        self.workers.get_mut(&id)?.thread.take()
    }

    pub(crate) fn unlink(&self, id: WorkerId) -> bool {
        self.workers.remove(&id).is_some()
    }
}
