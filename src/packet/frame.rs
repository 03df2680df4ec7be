//! 定义了协议中可以在线路上传输的完整数据帧。
//! Defines the complete frames that can be transmitted over the line-oriented wire.

use super::command::Command;
use super::header::{HEADER_TERMINATOR, Header};
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Terminates every frame on the wire.
/// 线路上每个帧的结束符。
pub const LINE_TERMINATOR: u8 = b'\n';

/// A complete protocol frame that can be sent or received.
/// 一个可以被发送或接收的完整协议帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A data frame carrying one line of application payload.
    /// 携带一行应用载荷的数据帧。
    Data { header: Header, payload: Bytes },
    /// A pure acknowledgment. Its sequence number is the sender's current
    /// `next_seq_num` and is not consumed.
    /// 纯确认帧。其序号为发送方当前的 `next_seq_num`，且不会被消耗。
    Ack { header: Header },
}

impl Frame {
    // --- Smart Constructors ---
    // These constructors keep `header.command` in step with the variant.
    // 这些构造函数保证 `header.command` 与帧变体一致。

    /// Creates a new data frame.
    /// 创建一个新的数据帧。
    pub fn new_data(sequence_number: u64, ack_number: u64, payload: Bytes) -> Self {
        let header = Header {
            sequence_number,
            ack_number,
            command: Command::Data,
        };
        Frame::Data { header, payload }
    }

    /// Creates a new pure acknowledgment.
    /// 创建一个新的纯确认帧。
    pub fn new_ack(sequence_number: u64, ack_number: u64) -> Self {
        let header = Header {
            sequence_number,
            ack_number,
            command: Command::Ack,
        };
        Frame::Ack { header }
    }

    // --- End of Smart Constructors ---

    /// Decodes one line, with or without its trailing newline.
    ///
    /// Fails with [`Error::MalformedHeader`] when the `seq,ack,flag:` header is
    /// missing a field, has a non-decimal number or an unknown flag. The payload
    /// of a pure ack is ignored.
    ///
    /// 解码一行（可带或不带结尾换行符）。头部缺失字段、数字非法或标志未知时返回
    /// [`Error::MalformedHeader`]。纯确认帧的载荷会被忽略。
    pub fn decode(line: &[u8]) -> Result<Self> {
        let line = line.strip_suffix(&[LINE_TERMINATOR]).unwrap_or(line);
        let split = line
            .iter()
            .position(|&b| b == HEADER_TERMINATOR)
            .ok_or(Error::MalformedHeader)?;
        let header = Header::decode(&line[..split]).ok_or(Error::MalformedHeader)?;

        match header.command {
            Command::Data => {
                let payload = Bytes::copy_from_slice(&line[split + 1..]);
                Ok(Frame::Data { header, payload })
            }
            Command::Ack => Ok(Frame::Ack { header }),
        }
    }

    /// 将帧（包括结尾换行符）编码到缓冲区。
    /// Encodes the frame, trailing newline included, into a buffer.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Frame::Data { header, payload } => {
                debug_assert!(!payload.contains(&LINE_TERMINATOR));
                header.encode(buf);
                buf.put_slice(payload);
            }
            Frame::Ack { header } => {
                header.encode(buf);
            }
        }
        buf.put_u8(LINE_TERMINATOR);
    }

    /// Encodes the frame into a freshly allocated buffer.
    /// 将帧编码到新分配的缓冲区中。
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Calculates the encoded size of the frame, newline included.
    ///
    /// 计算帧编码后的大小（包括换行符）。
    pub fn encoded_size(&self) -> usize {
        let payload_size = match self {
            Frame::Data { payload, .. } => payload.len(),
            Frame::Ack { .. } => 0,
        };
        self.header().encoded_size() + payload_size + 1
    }

    pub fn header(&self) -> &Header {
        match self {
            Frame::Data { header, .. } | Frame::Ack { header } => header,
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.header().sequence_number
    }

    pub fn ack_number(&self) -> u64 {
        self.header().ack_number
    }
}
