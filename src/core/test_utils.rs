//! Common helpers for the session tests.

use crate::packet::frame::Frame;
use bytes::Bytes;
use std::sync::Once;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "arq_relay=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Encodes a data frame the way a peer would put it on the wire.
pub fn data_line(seq: u64, ack: u64, payload: &str) -> Bytes {
    Frame::new_data(seq, ack, Bytes::copy_from_slice(payload.as_bytes())).to_bytes()
}

/// Encodes a pure ack.
pub fn ack_line(seq: u64, ack: u64) -> Bytes {
    Frame::new_ack(seq, ack).to_bytes()
}

/// Decodes a batch of replies, which must all be pure acks, into their ack numbers.
pub fn ack_numbers(replies: &[Bytes]) -> Vec<u64> {
    replies
        .iter()
        .map(|raw| match Frame::decode(raw) {
            Ok(Frame::Ack { header }) => header.ack_number,
            other => panic!("expected a pure ack, got {:?}", other),
        })
        .collect()
}
