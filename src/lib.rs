#![deny(clippy::expect_used, clippy::unwrap_used)]

//! A reliable line-delivery client over TCP and an unreliable relay that
//! drops, corrupts, delays, reorders and duplicates the lines it forwards.
//! 基于 TCP 的可靠行传输客户端，以及一个会丢弃、损坏、延迟、乱序和重复转发行的不可靠中继。

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod packet;
pub mod relay;
