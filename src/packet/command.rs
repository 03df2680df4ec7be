//! 定义帧的类型标志。
//! Defines the frame type flag.

use std::fmt;

/// The type of a frame: the third header field on the wire.
/// 帧类型，线路上的第三个头部字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Data frame carrying one line of application payload.
    /// 携带一行应用载荷的数据帧。
    Data = b'0',
    /// Pure acknowledgment. Carries no payload.
    /// 纯确认帧，不携带载荷。
    Ack = b'1',
}

impl Command {
    /// 从标志字段尝试转换成 `Command`。
    /// Tries to convert a flag field into a `Command`.
    pub fn from_flag(field: &[u8]) -> Option<Self> {
        match field {
            b"0" => Some(Command::Data),
            b"1" => Some(Command::Ack),
            _ => None,
        }
    }

    /// The flag byte written on the wire.
    /// 写到线路上的标志字节。
    pub fn flag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Data => "DATA",
            Command::Ack => "ACK",
        };
        write!(f, "{}", s)
    }
}
