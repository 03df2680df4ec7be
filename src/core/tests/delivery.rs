//! Tests for in-order delivery, duplicate suppression and acknowledgment.

use crate::{
    config::ArqConfig,
    core::{
        session::ArqSession,
        test_utils::{ack_line, ack_numbers, data_line, init_tracing},
    },
    error::Error,
};
use bytes::Bytes;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::time::Instant;

fn new_session() -> ArqSession {
    init_tracing();
    ArqSession::new(ArqConfig::default())
}

#[test]
fn test_out_of_order_frames_are_held_until_the_gap_fills() {
    let mut session = new_session();

    let incoming = session.on_frame_received(&data_line(1, 0, "B"));
    assert!(incoming.delivered.is_empty());
    assert!(incoming.replies.is_empty());

    let incoming = session.on_frame_received(&data_line(2, 0, "C"));
    assert!(incoming.delivered.is_empty());
    assert!(incoming.replies.is_empty());
    assert_eq!(session.recv_buffer().len(), 2);

    let incoming = session.on_frame_received(&data_line(0, 0, "A"));
    assert_eq!(incoming.delivered, vec!["A", "B", "C"]);
    assert_eq!(ack_numbers(&incoming.replies), vec![1, 2, 3]);
    assert_eq!(session.state().expected_seq_num, 3);
    assert!(session.recv_buffer().is_empty());
}

#[test]
fn test_any_arrival_order_delivers_in_sequence() {
    let mut session = new_session();
    let count = 40u64;

    // Every frame arrives at least once, a third of them twice.
    let mut arrivals: Vec<u64> = (0..count).chain((0..count).step_by(3)).collect();
    arrivals.shuffle(&mut StdRng::seed_from_u64(7));

    let mut delivered = Vec::new();
    for seq in arrivals {
        let incoming = session.on_frame_received(&data_line(seq, 0, &format!("line {}", seq)));
        assert!(incoming.replies.len() >= incoming.delivered.len());
        delivered.extend(incoming.delivered);
    }

    let expected: Vec<Bytes> = (0..count)
        .map(|seq| Bytes::from(format!("line {}", seq)))
        .collect();
    assert_eq!(delivered, expected);
    assert_eq!(session.state().expected_seq_num, count);
}

#[test]
fn test_stale_duplicate_is_reacked_not_redelivered() {
    let mut session = new_session();

    let first = session.on_frame_received(&data_line(0, 0, "hello"));
    assert_eq!(first.delivered, vec!["hello"]);
    assert_eq!(ack_numbers(&first.replies), vec![1]);

    let second = session.on_frame_received(&data_line(0, 0, "hello"));
    assert!(second.delivered.is_empty());
    assert_eq!(ack_numbers(&second.replies), vec![1]);
    assert_eq!(session.state().expected_seq_num, 1);
}

#[test]
fn test_duplicate_out_of_order_frame_is_buffered_once() {
    let mut session = new_session();
    session.on_frame_received(&data_line(3, 0, "x"));
    session.on_frame_received(&data_line(3, 0, "x"));
    assert_eq!(session.recv_buffer().len(), 1);
}

#[test]
fn test_malformed_lines_change_nothing() {
    let mut session = new_session();
    let lines: [&[u8]; 4] = [b"garbage\n", b"1,2\n", b"0,0,5:x\n", b"\n"];
    for line in lines {
        let incoming = session.on_frame_received(line);
        assert!(incoming.delivered.is_empty());
        assert!(incoming.replies.is_empty());
    }
    assert_eq!(session.state().expected_seq_num, 0);
    assert!(session.recv_buffer().is_empty());
}

#[test]
fn test_pure_ack_does_not_touch_receive_side() {
    let mut session = new_session();
    // A pure ack's sequence number is the peer's next_seq_num, which may be far
    // ahead of what we expect. It must not be mistaken for data.
    let incoming = session.on_frame_received(&ack_line(17, 0));
    assert!(incoming.delivered.is_empty());
    assert!(incoming.replies.is_empty());
    assert!(session.recv_buffer().is_empty());
    assert_eq!(session.state().expected_seq_num, 0);
}

#[test]
fn test_cumulative_ack_prunes_send_queue() {
    let mut session = new_session();
    let now = Instant::now();
    for i in 0..3 {
        session.send(Bytes::from(format!("m{}", i)), now).unwrap();
    }
    assert_eq!(session.send_queue().in_flight_count(), 3);

    session.on_frame_received(&ack_line(0, 2));
    let remaining: Vec<u64> = session
        .send_queue()
        .iter()
        .map(|f| f.sequence_number)
        .collect();
    assert_eq!(remaining, vec![2]);

    session.on_frame_received(&ack_line(0, 3));
    assert!(session.send_queue().is_empty());
}

#[test]
fn test_data_frame_ack_field_does_not_prune() {
    let mut session = new_session();
    session.send(Bytes::from("m0"), Instant::now()).unwrap();
    session.on_frame_received(&data_line(0, 1, "peer data"));
    assert_eq!(session.send_queue().in_flight_count(), 1);
}

#[test]
fn test_outgoing_frames_carry_both_counters() {
    let mut session = new_session();
    let now = Instant::now();

    assert_eq!(session.send(Bytes::from("first"), now).unwrap(), "0,0,0:first\n");
    assert_eq!(session.send(Bytes::from("second"), now).unwrap(), "1,0,0:second\n");

    // Pure acks reuse next_seq_num without consuming it.
    let incoming = session.on_frame_received(&data_line(0, 0, "peer"));
    assert_eq!(incoming.replies, vec!["2,1,1:\n"]);
    assert_eq!(session.state().next_seq_num, 2);

    assert_eq!(session.send(Bytes::from("third"), now).unwrap(), "2,1,0:third\n");
}

#[test]
fn test_send_rejects_unframeable_payloads() {
    let mut session = ArqSession::new(ArqConfig {
        max_frame_size: 16,
        ..ArqConfig::default()
    });
    let now = Instant::now();

    assert!(matches!(
        session.send(Bytes::from("two\nlines"), now),
        Err(Error::InvalidPayload)
    ));
    assert!(matches!(
        session.send(Bytes::from("far too long for sixteen"), now),
        Err(Error::MessageTooLarge)
    ));
    assert_eq!(session.state().next_seq_num, 0);
    assert!(session.send_queue().is_empty());

    // "0,0,0:" + 9 bytes + "\n" is exactly 16.
    assert!(session.send(Bytes::from("123456789"), now).is_ok());
}
