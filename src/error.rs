//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the ARQ client and the impairment relay.
/// ARQ 客户端与损伤中继的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying socket or stdio error occurred.
    /// 发生了底层的套接字或标准输入输出错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during address parsing.
    /// 地址解析期间发生错误。
    #[error("Address parsing error: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    /// A received line could not be parsed as a `seq,ack,flag:` frame.
    /// 接收到的行无法解析为 `seq,ack,flag:` 帧。
    #[error("Malformed frame header")]
    MalformedHeader,

    /// The peer closed its end of the byte stream (zero-length read).
    /// 对端关闭了字节流（读取长度为零）。
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// A frame stayed unacknowledged after the maximum number of retransmissions.
    /// 帧在达到最大重传次数后仍未被确认。
    #[error("Connection timed out: seq {seq} was never acknowledged")]
    ConnectionTimedOut { seq: u64 },

    /// No newline arrived within the maximum frame size.
    /// 在最大帧长度内没有收到换行符。
    #[error("Frame exceeds the maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// The encoded frame for an outbound message would exceed `max_frame_size`.
    /// 出站消息编码后的帧将超过 `max_frame_size`。
    #[error("the message is too large to be sent")]
    MessageTooLarge,

    /// The outbound payload contains a newline, which would split the frame.
    /// 出站载荷包含换行符，会把帧拆分开。
    #[error("the message contains a line terminator")]
    InvalidPayload,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::AddressParse(e) => std::io::Error::new(ErrorKind::InvalidInput, e),
            Error::MalformedHeader => ErrorKind::InvalidData.into(),
            Error::ConnectionClosed => ErrorKind::ConnectionReset.into(),
            Error::ConnectionTimedOut { .. } => ErrorKind::TimedOut.into(),
            Error::FrameTooLarge { .. } => ErrorKind::InvalidData.into(),
            Error::MessageTooLarge => ErrorKind::InvalidInput.into(),
            Error::InvalidPayload => ErrorKind::InvalidInput.into(),
        }
    }
}
