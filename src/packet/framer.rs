//! Reassembles newline-terminated frames from a byte stream.
//!
//! Byte streams do not preserve message boundaries: one read may return
//! several frames, a fraction of one, or the tail of one followed by the head
//! of the next. [`LineFramer`] keeps the unterminated remainder between reads.
//!
//! 从字节流中重组以换行结尾的帧。字节流不保留消息边界，[`LineFramer`] 会在多次读取之间
//! 保留尚未结束的剩余部分。

use super::frame::LINE_TERMINATOR;
use crate::error::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};

/// A growable line buffer bounded by a maximum frame size.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    max_frame_size: usize,
    /// Set by [`resync`](Self::resync): bytes up to the next newline belong to
    /// a discarded line.
    skipping: bool,
}

impl LineFramer {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_frame_size),
            max_frame_size,
            skipping: false,
        }
    }

    /// Appends freshly read bytes.
    /// 追加新读取的字节。
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Peels the next complete line off the front of the buffer, newline included.
    ///
    /// Returns `Ok(None)` when only a partial line is buffered. A line longer
    /// than `max_frame_size`, or a partial line that already fills it, is
    /// [`Error::FrameTooLarge`].
    ///
    /// 从缓冲区前端取出下一个完整行（包括换行符）。仅有部分行时返回 `Ok(None)`；
    /// 行长度超过 `max_frame_size` 时返回 [`Error::FrameTooLarge`]。
    pub fn next_line(&mut self) -> Result<Option<Bytes>> {
        if self.skipping {
            match self.newline_position() {
                Some(end) => {
                    self.buffer.advance(end + 1);
                    self.skipping = false;
                }
                None => {
                    self.buffer.clear();
                    return Ok(None);
                }
            }
        }

        match self.newline_position() {
            Some(end) if end < self.max_frame_size => {
                Ok(Some(self.buffer.split_to(end + 1).freeze()))
            }
            Some(_) => Err(self.too_large()),
            None if self.buffer.len() >= self.max_frame_size => Err(self.too_large()),
            None => Ok(None),
        }
    }

    /// Throws away the line that made [`next_line`](Self::next_line) fail,
    /// including any of its bytes that have not arrived yet. Lines after it are
    /// framed normally.
    ///
    /// 丢弃导致 [`next_line`](Self::next_line) 失败的行（包括尚未到达的部分），
    /// 之后的行照常分帧。
    pub fn resync(&mut self) {
        match self.newline_position() {
            Some(end) => {
                self.buffer.advance(end + 1);
            }
            None => {
                self.buffer.clear();
                self.skipping = true;
            }
        }
    }

    /// Number of bytes of the pending partial line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn newline_position(&self) -> Option<usize> {
        self.buffer.iter().position(|&b| b == LINE_TERMINATOR)
    }

    fn too_large(&self) -> Error {
        Error::FrameTooLarge {
            limit: self.max_frame_size,
        }
    }
}
