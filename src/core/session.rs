//! The client-side ARQ state machine.
//!
//! [`ArqSession`] performs no I/O. The caller hands it user payloads, received
//! lines and clock ticks; it answers with the bytes to put on the wire and the
//! payloads to hand to the application, strictly in sequence order.
//!
//! 客户端 ARQ 状态机。[`ArqSession`] 不执行任何 I/O：调用方提供用户载荷、接收到的行和
//! 时钟节拍，它返回需要写到线路上的字节以及按序交付给应用的载荷。

use super::reliability::{ReceiveBuffer, SendQueue};
use crate::config::ArqConfig;
use crate::error::{Error, Result};
use crate::packet::frame::{Frame, LINE_TERMINATOR};
use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// The two sequence counters of a connection.
///
/// 连接的两个序号计数器。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Sequence number of the next outbound data frame.
    /// 下一个出站数据帧的序号。
    pub next_seq_num: u64,
    /// Sequence number of the next inbound data frame accepted in order.
    /// 下一个按序接受的入站数据帧的序号。
    pub expected_seq_num: u64,
}

/// What processing one inbound line produced.
///
/// 处理一行入站数据的结果。
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Incoming {
    /// Payloads for the application, in sequence order.
    /// 按序交付给应用的载荷。
    pub delivered: Vec<Bytes>,
    /// Encoded pure acks to write back to the peer.
    /// 需要回写给对端的已编码纯确认帧。
    pub replies: Vec<Bytes>,
}

/// Client protocol state: framing, sequencing, acking, retransmission and
/// in-order delivery for one connection.
#[derive(Debug)]
pub struct ArqSession {
    config: ArqConfig,
    state: ConnectionState,
    send_queue: SendQueue,
    recv_buffer: ReceiveBuffer,
    /// Earliest instant the next retransmission may go out.
    next_retransmit_at: Option<Instant>,
}

impl ArqSession {
    pub fn new(config: ArqConfig) -> Self {
        let recv_buffer = ReceiveBuffer::new(config.recv_buffer_capacity);
        Self {
            config,
            state: ConnectionState::default(),
            send_queue: SendQueue::new(),
            recv_buffer,
            next_retransmit_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn send_queue(&self) -> &SendQueue {
        &self.send_queue
    }

    pub fn recv_buffer(&self) -> &ReceiveBuffer {
        &self.recv_buffer
    }

    /// Frames `payload` as the next data frame, records it as in flight and
    /// returns the bytes to transmit.
    ///
    /// The payload must not contain a newline and its frame must fit in
    /// `max_frame_size`; otherwise no sequence number is consumed.
    ///
    /// 将 `payload` 封装为下一个数据帧，记录为在途并返回待发送的字节。
    pub fn send(&mut self, payload: Bytes, now: Instant) -> Result<Bytes> {
        if payload.contains(&LINE_TERMINATOR) {
            return Err(Error::InvalidPayload);
        }
        let seq = self.state.next_seq_num;
        let frame = Frame::new_data(seq, self.state.expected_seq_num, payload);
        if frame.encoded_size() > self.config.max_frame_size {
            return Err(Error::MessageTooLarge);
        }

        let raw = frame.to_bytes();
        self.send_queue.add_in_flight(seq, raw.clone(), now);
        self.state.next_seq_num += 1;
        debug!(seq, ack = frame.ack_number(), "→ DATA");
        Ok(raw)
    }

    /// Processes one line received from the peer.
    ///
    /// Lines whose header does not parse are dropped without surfacing an error.
    ///
    /// 处理从对端收到的一行。头部无法解析的行会被静默丢弃。
    pub fn on_frame_received(&mut self, line: &[u8]) -> Incoming {
        let mut incoming = Incoming::default();
        let frame = match Frame::decode(line) {
            Ok(frame) => frame,
            Err(e) => {
                trace!(line = %String::from_utf8_lossy(line).trim_end(), "Dropping frame: {}", e);
                return incoming;
            }
        };
        trace!(
            command = %frame.header().command,
            seq = frame.sequence_number(),
            ack = frame.ack_number(),
            "Frame received"
        );

        match frame {
            Frame::Ack { header } => self.handle_ack(header.ack_number),
            Frame::Data { header, payload } => {
                self.handle_data(header.sequence_number, payload, &mut incoming)
            }
        }
        incoming
    }

    fn handle_ack(&mut self, ack: u64) {
        let removed = self.send_queue.acknowledge_up_to(ack);
        debug!(
            ack,
            removed,
            in_flight = self.send_queue.in_flight_count(),
            "← ACK"
        );
    }

    fn handle_data(&mut self, seq: u64, payload: Bytes, incoming: &mut Incoming) {
        let expected = self.state.expected_seq_num;

        if seq > expected {
            let buffered = self.recv_buffer.insert(seq, payload);
            debug!(seq, expected, buffered, "← DATA out of order");
            return;
        }

        if seq < expected {
            // Already delivered: our earlier ack was lost or overtaken. Re-ack
            // so the sender can stop retransmitting it.
            debug!(seq, expected, "← DATA stale duplicate, re-acking");
            incoming.replies.push(self.pure_ack(expected));
            return;
        }

        debug!(seq, "← DATA in order");
        self.deliver(payload, incoming);

        while let Some(payload) = self.recv_buffer.pop_next(self.state.expected_seq_num) {
            trace!(seq = self.state.expected_seq_num, "Draining buffered frame");
            self.deliver(payload, incoming);
        }
    }

    /// Delivers the payload carrying `expected_seq_num` and acknowledges it.
    fn deliver(&mut self, payload: Bytes, incoming: &mut Incoming) {
        self.state.expected_seq_num += 1;
        incoming.delivered.push(payload);
        incoming
            .replies
            .push(self.pure_ack(self.state.expected_seq_num));
    }

    /// A pure ack reuses `next_seq_num` without consuming it.
    fn pure_ack(&self, ack: u64) -> Bytes {
        trace!(seq = self.state.next_seq_num, ack, "→ ACK");
        Frame::new_ack(self.state.next_seq_num, ack).to_bytes()
    }

    /// Retransmits at most one expired frame, honouring the pacing interval.
    ///
    /// Returns [`Error::ConnectionTimedOut`] when an expired frame has already
    /// been retransmitted `max_retransmissions` times.
    ///
    /// 在遵守节奏间隔的前提下至多重传一个已过期的帧。若过期帧的重传次数已达到
    /// `max_retransmissions`，返回 [`Error::ConnectionTimedOut`]。
    pub fn on_tick(&mut self, now: Instant) -> Result<Option<Bytes>> {
        if self.next_retransmit_at.is_some_and(|slot| now < slot) {
            return Ok(None);
        }
        let Some(frame) = self
            .send_queue
            .next_expired(self.config.retransmit_timeout, now)
        else {
            return Ok(None);
        };

        if frame.retransmit_count >= self.config.max_retransmissions {
            warn!(
                seq = frame.sequence_number,
                retransmissions = frame.retransmit_count,
                "Closing connection due to too many timeouts"
            );
            return Err(Error::ConnectionTimedOut {
                seq: frame.sequence_number,
            });
        }

        frame.retransmit_count += 1;
        frame.last_sent_at = now;
        warn!(
            seq = frame.sequence_number,
            attempt = frame.retransmit_count,
            "Retransmitting"
        );
        self.next_retransmit_at = Some(now + self.config.retransmit_pacing);
        Ok(Some(frame.raw.clone()))
    }

    /// The instant at which [`on_tick`](Self::on_tick) next has work, or `None`
    /// when nothing is in flight.
    ///
    /// [`on_tick`](Self::on_tick) 下一次有工作的时刻；没有在途帧时为 `None`。
    pub fn next_deadline(&self) -> Option<Instant> {
        let expiry = self
            .send_queue
            .next_expiry(self.config.retransmit_timeout)?;
        Some(match self.next_retransmit_at {
            Some(slot) => expiry.max(slot),
            None => expiry,
        })
    }
}
