//! The sans-I/O protocol core of the reliable-delivery client.
//! 可靠传输客户端的无 I/O 协议核心。

pub mod reliability;
pub mod session;

pub use session::{ArqSession, ConnectionState, Incoming};

#[cfg(test)]
pub mod test_utils;
