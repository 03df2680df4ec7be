//! 定义文本帧头 `seq,ack,flag:`。
//! Defines the textual frame header `seq,ack,flag:`.

use super::command::Command;
use bytes::BufMut;

/// Separator between the header fields.
pub const FIELD_SEPARATOR: u8 = b',';
/// Terminates the header; everything after it is payload.
pub const HEADER_TERMINATOR: u8 = b':';

/// The header carried by every frame.
/// 每个帧都携带的头部。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// The sequence number of this frame.
    /// 帧序号。
    pub sequence_number: u64,
    /// The next sequence number the sender of this frame expects to receive.
    /// 此帧发送方期望接收的下一个序号。
    pub ack_number: u64,
    /// Data or pure acknowledgment.
    /// 数据帧或纯确认帧。
    pub command: Command,
}

impl Header {
    /// 将头部编码到缓冲区。
    /// Encodes the header into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.sequence_number.to_string().as_bytes());
        buf.put_u8(FIELD_SEPARATOR);
        buf.put_slice(self.ack_number.to_string().as_bytes());
        buf.put_u8(FIELD_SEPARATOR);
        buf.put_u8(self.command.flag());
        buf.put_u8(HEADER_TERMINATOR);
    }

    /// 从头部文本（不含 `:`）解码头部。
    /// Decodes a header from its text, without the trailing `:`.
    ///
    /// Exactly three comma-separated fields are required, the first two plain
    /// decimal numbers and the last a valid flag.
    pub fn decode(text: &[u8]) -> Option<Self> {
        let mut fields = text.split(|&b| b == FIELD_SEPARATOR);
        let sequence_number = parse_decimal(fields.next()?)?;
        let ack_number = parse_decimal(fields.next()?)?;
        let command = Command::from_flag(fields.next()?)?;
        if fields.next().is_some() {
            return None;
        }
        Some(Header {
            sequence_number,
            ack_number,
            command,
        })
    }

    /// Number of bytes `encode` writes.
    /// `encode` 写入的字节数。
    pub fn encoded_size(&self) -> usize {
        decimal_len(self.sequence_number) + decimal_len(self.ack_number) + 4
    }
}

fn parse_decimal(field: &[u8]) -> Option<u64> {
    if field.is_empty() {
        return None;
    }
    field.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}

fn decimal_len(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}
