//! 闹钟管理器统计信息
//! Alarm manager statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters updated by the manager and its workers.
/// 由管理器及其工作线程共同更新的计数器。
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    registered: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
    reaped: AtomicU64,
    dropped_messages: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fired(&self) {
        self.fired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reaped(&self) {
        self.reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_message(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active: usize) -> AlarmStats {
        AlarmStats {
            active,
            registered: self.registered.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            reaped: self.reaped.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
        }
    }
}

/// 闹钟管理器统计信息
/// Alarm manager statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmStats {
    /// 注册表中的闹钟数
    /// Alarms currently in the registry
    pub active: usize,
    /// 成功注册的闹钟总数
    /// Total alarms successfully registered
    pub registered: u64,
    /// 已调用回调的闹钟数
    /// Alarms whose callback ran
    pub fired: u64,
    /// 在到期前被取消的闹钟数
    /// Alarms cancelled before expiry
    pub cancelled: u64,
    /// 已被汇合并从注册表移除的工作线程数
    /// Worker threads joined and removed from the registry
    pub reaped: u64,
    /// 因无法识别或载荷错误而丢弃的控制消息数
    /// Control messages dropped as unknown or malformed
    pub dropped_messages: u64,
}

impl fmt::Display for AlarmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlarmStats {{ active: {}, registered: {}, fired: {}, cancelled: {}, reaped: {}, dropped: {} }}",
            self.active,
            self.registered,
            self.fired,
            self.cancelled,
            self.reaped,
            self.dropped_messages
        )
    }
}
