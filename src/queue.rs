//! 阻塞式FIFO控制队列
//! Blocking FIFO control queue
//!
//! 该模块提供了管理器与工作线程之间通信使用的控制队列原语。队列项由一个
//! 动作标签和一个可选的不透明载荷组成。生产端可以被克隆并在任意线程中推送，
//! 消费端在普通操作系统线程中阻塞地弹出队列项，也可以非阻塞地检查队列。
//!
//! This module provides the control-queue primitive used between the manager
//! and its workers. Items are an action tag plus an optional opaque payload.
//! The producer side can be cloned and pushed from any thread; the consumer
//! pops items with blocking semantics on a plain OS thread, or checks the
//! queue without blocking.

use crate::error::{Error, Result};
use bytes::Bytes;
use tokio::sync::mpsc;


/// A single tagged item carried by a control queue.
/// 控制队列中携带的单个带标签的队列项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// 动作名称
    /// Action name
    pub action: String,
    /// 可选载荷
    /// Optional payload
    pub payload: Option<Bytes>,
}

impl QueueItem {
    pub fn new(action: impl Into<String>, payload: Option<Bytes>) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }

    /// Size of the payload in bytes, zero when there is none.
    /// 载荷的字节大小，没有载荷时为零。
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }
}

/// Creates a new control queue, returning its producer and consumer ends.
/// 创建新的控制队列，返回其生产端和消费端。
pub fn channel() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueProducer { tx }, QueueConsumer { rx })
}

/// The pushing end of a control queue.
/// 控制队列的推送端。
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::UnboundedSender<QueueItem>,
}

impl QueueProducer {
    /// Pushes a tagged item. Never blocks.
    /// 推送一个带标签的队列项。从不阻塞。
    pub fn push(&self, action: impl Into<String>, payload: Option<Bytes>) -> Result<()> {
        self.push_item(QueueItem::new(action, payload))
    }

    pub fn push_item(&self, item: QueueItem) -> Result<()> {
        self.tx.send(item).map_err(|_| Error::QueueClosed)
    }

    /// Whether the consumer has been dropped.
    /// 消费端是否已被丢弃。
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The popping end of a control queue.
///
/// `pop` must not be called from inside an async runtime; the engine only
/// calls it from its own OS threads.
///
/// 控制队列的弹出端。
///
/// `pop` 不能在异步运行时内部调用；引擎只在自己的操作系统线程中调用它。
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::UnboundedReceiver<QueueItem>,
}

impl QueueConsumer {
    /// Blocks until an item is available. Returns `None` once every producer
    /// has been dropped and the queue is drained.
    ///
    /// 阻塞直到有队列项可用。当所有生产端都被丢弃且队列已排空时返回 `None`。
    pub fn pop(&mut self) -> Option<QueueItem> {
        self.rx.blocking_recv()
    }

    /// Pops an item if one is ready, without blocking.
    /// 如果有队列项就绪则弹出，不阻塞。
    pub fn try_pop(&mut self) -> Option<QueueItem> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
