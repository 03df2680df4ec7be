//! The packet module: the line-oriented wire format and the stream framer.
//! packet 模块：面向行的线路格式与字节流分帧器。

pub mod command;
pub mod frame;
pub mod framer;
pub mod header;
