//! Tracks data frames that have been sent but not yet acknowledged, and picks
//! the ones whose retransmission timeout has expired.
//!
//! 跟踪已发送但尚未确认的数据帧，并挑选出重传超时已到期的帧。

use bytes::Bytes;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// A data frame that has been sent but not yet acknowledged (in-flight).
#[derive(Debug, Clone)]
pub struct InFlightFrame {
    pub sequence_number: u64,
    /// The exact bytes that went on the wire; retransmissions resend them verbatim.
    pub raw: Bytes,
    pub last_sent_at: Instant,
    pub retransmit_count: u32,
}

/// Unacknowledged outbound frames in insertion (== sequence) order.
#[derive(Debug, Default)]
pub struct SendQueue {
    in_flight: VecDeque<InFlightFrame>,
}

impl SendQueue {
    /// Creates a new, empty `SendQueue`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly sent frame to the in-flight queue.
    pub fn add_in_flight(&mut self, sequence_number: u64, raw: Bytes, now: Instant) {
        debug_assert!(
            self.in_flight
                .back()
                .is_none_or(|last| last.sequence_number < sequence_number)
        );
        self.in_flight.push_back(InFlightFrame {
            sequence_number,
            raw,
            last_sent_at: now,
            retransmit_count: 0,
        });
    }

    /// Applies a cumulative acknowledgment: every frame with a sequence number
    /// below `ack_number` is removed, the rest stay pending. Returns how many
    /// frames were removed.
    ///
    /// The whole queue is scanned rather than only its prefix, so the result
    /// does not depend on the queue being contiguous.
    ///
    /// 应用累积确认：移除所有序号小于 `ack_number` 的帧，其余保持待确认。返回移除的帧数。
    pub fn acknowledge_up_to(&mut self, ack_number: u64) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|p| p.sequence_number >= ack_number);
        before - self.in_flight.len()
    }

    /// Returns the first frame (in sequence order) that has gone `rto` or longer
    /// without being sent.
    pub fn next_expired(&mut self, rto: Duration, now: Instant) -> Option<&mut InFlightFrame> {
        self.in_flight
            .iter_mut()
            .find(|p| now.saturating_duration_since(p.last_sent_at) >= rto)
    }

    /// Returns the instant at which the next frame expires.
    pub fn next_expiry(&self, rto: Duration) -> Option<Instant> {
        self.in_flight.iter().map(|p| p.last_sent_at + rto).min()
    }

    /// Returns the number of frames currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Checks if the in-flight queue is empty.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InFlightFrame> {
        self.in_flight.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(seq: u64) -> Bytes {
        Bytes::from(format!("{},0,0:packet-{}\n", seq, seq))
    }

    fn queue_with(seqs: std::ops::Range<u64>, now: Instant) -> SendQueue {
        let mut queue = SendQueue::new();
        for seq in seqs {
            queue.add_in_flight(seq, raw(seq), now);
        }
        queue
    }

    fn remaining(queue: &SendQueue) -> Vec<u64> {
        queue.iter().map(|p| p.sequence_number).collect()
    }

    #[test]
    fn test_cumulative_ack_removes_only_lower_sequences() {
        let now = Instant::now();
        let mut queue = queue_with(0..6, now);

        assert_eq!(queue.acknowledge_up_to(3), 3);
        assert_eq!(remaining(&queue), vec![3, 4, 5]);

        // An older ack is a no-op.
        assert_eq!(queue.acknowledge_up_to(1), 0);
        assert_eq!(queue.in_flight_count(), 3);

        assert_eq!(queue.acknowledge_up_to(100), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ack_zero_keeps_everything() {
        let now = Instant::now();
        let mut queue = queue_with(0..3, now);
        assert_eq!(queue.acknowledge_up_to(0), 0);
        assert_eq!(remaining(&queue), vec![0, 1, 2]);
    }

    #[test]
    fn test_expiry_tracks_oldest_send_time() {
        let start = Instant::now();
        let rto = Duration::from_secs(5);
        let mut queue = SendQueue::new();
        queue.add_in_flight(0, raw(0), start);
        queue.add_in_flight(1, raw(1), start + Duration::from_secs(1));

        assert_eq!(queue.next_expiry(rto), Some(start + rto));
        assert!(queue.next_expired(rto, start + Duration::from_secs(4)).is_none());

        let later = start + rto;
        let frame = queue.next_expired(rto, later).unwrap();
        assert_eq!(frame.sequence_number, 0);
        frame.last_sent_at = later;

        // Frame 0 was just resent, so frame 1 is now the next to expire.
        assert_eq!(
            queue.next_expiry(rto),
            Some(start + Duration::from_secs(1) + rto)
        );
    }

    #[test]
    fn test_empty_queue_has_no_expiry() {
        let mut queue = SendQueue::new();
        assert!(queue.next_expiry(Duration::from_secs(5)).is_none());
        assert!(
            queue
                .next_expired(Duration::ZERO, Instant::now())
                .is_none()
        );
    }
}
