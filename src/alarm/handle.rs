//! 闹钟管理器句柄
//! Alarm manager handle
//!
//! 本模块包含闹钟调度器的公共接口：构造管理器、注册闹钟、取消单个闹钟，
//! 以及等待或取消全部闹钟。
//!
//! This module contains the public surface of the scheduler: constructing a
//! manager, registering alarms, cancelling one alarm, and waiting for or
//! cancelling all of them.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{self, QueueProducer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::manager::AlarmManagerTask;
use super::message::ControlMessage;
use super::registry::{ManagerState, Registry, WorkerRecord};
use super::stats::{AlarmStats, StatsCounters};
use super::worker::{self, AlarmCallback, AlarmWorker, WorkerId};

/// Handle to one registered alarm.
/// 单个已注册闹钟的句柄。
#[derive(Debug, Clone)]
pub struct AlarmHandle {
    id: WorkerId,
    manager_tx: QueueProducer,
}

impl AlarmHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Asks the manager to cancel this alarm. Returns once the request is
    /// queued; the manager signals, joins and reaps the worker in order with
    /// its other control messages.
    ///
    /// 请求管理器取消此闹钟。请求入队后立即返回；管理器会按控制消息的顺序
    /// 通知、汇合并回收该工作线程。
    pub fn cancel(&self) -> Result<()> {
        self.manager_tx
            .push_item(ControlMessage::Cancel(self.id).into_item())
            .map_err(|_| Error::ManagerClosed)
    }
}

/// 闹钟管理器
/// Alarm manager
///
/// Owns the registry of live alarms and the dispatch thread that reaps them.
/// Dropping a manager that is still running cancels every alarm and waits
/// for the workers to exit, unless the drop happens inside one of its own
/// callbacks; then the dispatch thread finishes the teardown detached.
pub struct AlarmManager {
    config: Config,
    registry: Arc<Registry>,
    stats: Arc<StatsCounters>,
    control_tx: QueueProducer,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmManager {
    /// 使用默认配置创建管理器
    /// Create a manager with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let (control_tx, control_rx) = queue::channel();
        let registry = Arc::new(Registry::new());
        let stats = Arc::new(StatsCounters::default());
        let task = AlarmManagerTask::new(registry.clone(), control_rx, stats.clone());

        let dispatch = thread::Builder::new()
            .name(config.manager_thread_name.clone())
            .spawn(move || task.run())
            .map_err(Error::AllocationFailure)?;

        info!(poll_granularity = ?config.poll_granularity, "Alarm manager started");
        Ok(Self {
            config,
            registry,
            stats,
            control_tx,
            dispatch: Mutex::new(Some(dispatch)),
        })
    }

    /// 注册闹钟
    /// Register an alarm
    ///
    /// After `timeout` the worker calls `callback(data)` on its own thread,
    /// exactly once, unless the alarm is cancelled first. `data` is moved,
    /// never copied.
    ///
    /// # Errors
    /// [`Error::AllocationFailure`] if the worker thread cannot be spawned,
    /// [`Error::ManagerClosed`] once the manager has begun draining. Either
    /// way the registry is left unchanged.
    pub fn register<T, F>(&self, timeout: Duration, callback: F, data: T) -> Result<AlarmHandle>
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let callback: AlarmCallback = Box::new(move || callback(data));
        let owner = self.registry.key();

        let id = self.registry.register(|id| {
            let (worker_tx, worker_rx) = queue::channel();
            let worker = AlarmWorker::new(
                id,
                timeout,
                self.config.poll_granularity,
                callback,
                worker_rx,
                self.control_tx.clone(),
                self.stats.clone(),
            );

            let thread = thread::Builder::new()
                .name(format!("{}-{}", self.config.worker_thread_name, id))
                .spawn(move || {
                    worker::enter_worker_thread(owner);
                    worker.run()
                })
                .map_err(Error::AllocationFailure)?;

            self.stats.record_registered();
            Ok(WorkerRecord::new(worker_tx, thread))
        })?;

        debug!(worker_id = %id, ?timeout, "Alarm registered");
        Ok(AlarmHandle {
            id,
            manager_tx: self.control_tx.clone(),
        })
    }

    /// 取消单个闹钟
    /// Cancel a single alarm
    ///
    /// Routed through the dispatch thread so that only it ever unlinks
    /// records. Cancelling an alarm that already fired is a no-op. Still
    /// honoured while [`Self::await_all`] is waiting.
    pub fn cancel(&self, handle: &AlarmHandle) -> Result<()> {
        if self.registry.state() == ManagerState::Terminated {
            return Err(Error::ManagerClosed);
        }
        handle.cancel()
    }

    /// Blocks until every registered alarm has fired or been cancelled, and
    /// the dispatch thread has exited.
    ///
    /// 阻塞直到所有已注册闹钟都已触发或被取消，并且分发线程已退出。
    ///
    /// Called from one of this manager's alarm callbacks it only requests the
    /// drain and returns, since the dispatch thread has to join the caller.
    pub fn await_all(&self) {
        self.shutdown(ControlMessage::Wait);
    }

    /// Cancels every alarm, then blocks until all workers are joined and
    /// reaped and the dispatch thread has exited. Like [`Self::await_all`],
    /// it does not block when called from one of this manager's callbacks.
    ///
    /// 取消所有闹钟，然后阻塞直到所有工作线程被汇合回收且分发线程已退出。
    pub fn terminate_all(&self) {
        self.shutdown(ControlMessage::Terminate);
    }

    /// Terminates every alarm and releases the manager.
    /// 终止所有闹钟并释放管理器。
    pub fn destroy(self) {
        self.terminate_all();
    }

    fn shutdown(&self, message: ControlMessage) {
        if worker::is_worker_thread_of(self.registry.key()) {
            // The dispatch thread joins this worker, so joining the dispatch
            // thread from here would never return. A later call from another
            // thread still finds the join handle and waits.
            warn!(action = message.action(), "Shutdown requested from an alarm callback, not waiting");
            if self.registry.state() != ManagerState::Terminated {
                self.request(message);
            }
            return;
        }

        let mut dispatch = self.dispatch.lock();
        let Some(thread) = dispatch.take() else {
            return;
        };

        self.request(message);
        if thread.join().is_err() {
            error!("Alarm manager dispatch thread panicked");
        }
    }

    fn request(&self, message: ControlMessage) {
        if let Err(err) = self.control_tx.push_item(message.into_item()) {
            error!(error = %err, "Dispatch loop gone before {}", message.action());
        }
    }

    pub fn contains(&self, handle: &AlarmHandle) -> bool {
        self.registry.contains(handle.id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Identities of live alarms, in registration order.
    /// 活跃闹钟的标识，按注册顺序排列。
    pub fn active_alarms(&self) -> Vec<WorkerId> {
        self.registry.snapshot()
    }

    pub fn state(&self) -> ManagerState {
        self.registry.state()
    }

    pub fn stats(&self) -> AlarmStats {
        self.stats.snapshot(self.registry.len())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn control_tx(&self) -> &QueueProducer {
        &self.control_tx
    }
}

impl Drop for AlarmManager {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

impl std::fmt::Debug for AlarmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmManager")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
