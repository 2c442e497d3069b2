//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the alarm engine.
/// 闹钟引擎的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// A worker or manager thread could not be created. Registration is
    /// aborted and nothing is left behind in the registry.
    ///
    /// 无法创建工作线程或管理线程。注册被中止，注册表中不会留下任何记录。
    #[error("failed to allocate alarm resources: {0}")]
    AllocationFailure(#[source] std::io::Error),

    /// The manager is draining or has terminated and no longer accepts work.
    /// 管理器正在排空或已终止，不再接受新的工作。
    #[error("alarm manager is no longer running")]
    ManagerClosed,

    /// A control message carried an action tag nobody understands.
    /// 控制消息携带了无法识别的动作标签。
    #[error("unknown control message: {0}")]
    UnknownControlMessage(String),

    /// A control message carried a payload of the wrong size.
    /// 控制消息携带了大小错误的载荷。
    #[error("malformed payload for {action}: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        action: String,
        expected: usize,
        actual: usize,
    },

    /// The supplied configuration cannot be used.
    /// 提供的配置不可用。
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The consuming side of a control queue is gone.
    /// 控制队列的消费端已经关闭。
    #[error("control queue is closed")]
    QueueClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::AllocationFailure(e) => e,
            Error::ManagerClosed => ErrorKind::NotConnected.into(),
            Error::QueueClosed => ErrorKind::BrokenPipe.into(),
            Error::InvalidConfig(msg) => std::io::Error::new(ErrorKind::InvalidInput, msg),
            err @ (Error::UnknownControlMessage(_) | Error::MalformedPayload { .. }) => {
                std::io::Error::new(ErrorKind::InvalidData, err.to_string())
            }
        }
    }
}
