//! 控制消息定义
//! Control message definitions
//!
//! 本模块定义了管理器与工作线程之间的通信协议。消息在控制队列上以
//! "动作标签 + 可选载荷" 的形式传输，这里负责双向转换。
//!
//! This module defines the protocol between the manager and its workers.
//! Messages travel over control queues as an action tag plus optional
//! payload; this module converts in both directions.

use crate::error::{Error, Result};
use crate::queue::QueueItem;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::worker::WorkerId;

/// Size of an encoded worker identity payload.
/// 编码后的工作线程标识载荷大小。
pub const WORKER_ID_PAYLOAD_LEN: usize = std::mem::size_of::<u64>();

/// 控制消息
/// Control messages
///
/// `Terminate` is the only message a worker understands. The manager
/// understands all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// 取消全部（发往管理器）或取消自身（发往工作线程）
    /// Cancel everything (to the manager) or cancel self (to a worker)
    Terminate,
    /// 等待所有闹钟自然到期
    /// Wait for every alarm to expire naturally
    Wait,
    /// 工作线程报告自身已完成
    /// A worker reporting its own completion
    Destroy(WorkerId),
    /// 取消单个闹钟
    /// Cancel a single alarm
    Cancel(WorkerId),
}

impl ControlMessage {
    pub const TERMINATE: &'static str = "Terminate";
    pub const WAIT: &'static str = "Wait";
    pub const DESTROY: &'static str = "Destroy";
    pub const CANCEL: &'static str = "Cancel";

    /// The action tag used on the wire.
    /// 传输时使用的动作标签。
    pub fn action(&self) -> &'static str {
        match self {
            ControlMessage::Terminate => Self::TERMINATE,
            ControlMessage::Wait => Self::WAIT,
            ControlMessage::Destroy(_) => Self::DESTROY,
            ControlMessage::Cancel(_) => Self::CANCEL,
        }
    }

    pub fn into_item(self) -> QueueItem {
        let payload = match self {
            ControlMessage::Terminate | ControlMessage::Wait => None,
            ControlMessage::Destroy(id) | ControlMessage::Cancel(id) => {
                let mut buf = BytesMut::with_capacity(WORKER_ID_PAYLOAD_LEN);
                buf.put_u64(id.as_u64());
                Some(buf.freeze())
            }
        };
        QueueItem::new(self.action(), payload)
    }

    /// Decodes a queue item, rejecting unknown tags and wrongly sized payloads.
    /// 解码队列项，拒绝未知标签以及大小错误的载荷。
    pub fn from_item(item: &QueueItem) -> Result<Self> {
        match item.action.as_str() {
            Self::TERMINATE => expect_empty(item).map(|()| ControlMessage::Terminate),
            Self::WAIT => expect_empty(item).map(|()| ControlMessage::Wait),
            Self::DESTROY => decode_worker_id(item).map(ControlMessage::Destroy),
            Self::CANCEL => decode_worker_id(item).map(ControlMessage::Cancel),
            other => Err(Error::UnknownControlMessage(other.to_string())),
        }
    }
}

fn expect_empty(item: &QueueItem) -> Result<()> {
    match item.size() {
        0 => Ok(()),
        actual => Err(Error::MalformedPayload {
            action: item.action.clone(),
            expected: 0,
            actual,
        }),
    }
}

fn decode_worker_id(item: &QueueItem) -> Result<WorkerId> {
    let malformed = |actual| Error::MalformedPayload {
        action: item.action.clone(),
        expected: WORKER_ID_PAYLOAD_LEN,
        actual,
    };

    let mut payload: Bytes = item.payload.clone().ok_or_else(|| malformed(0))?;
    if payload.len() != WORKER_ID_PAYLOAD_LEN {
        return Err(malformed(payload.len()));
    }
    Ok(WorkerId::from_u64(payload.get_u64()))
}
