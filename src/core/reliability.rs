//! Client-side reliability structures: the queue of unacknowledged outbound
//! frames and the buffer of out-of-order inbound payloads.
//!
//! 客户端可靠性结构：未确认出站帧队列与乱序入站载荷缓冲区。

pub mod recv_buffer;
pub mod send_queue;

pub use recv_buffer::ReceiveBuffer;
pub use send_queue::{InFlightFrame, SendQueue};
