//! Flow metadata wire format
//!
//! Every request a client sends is a fixed-width metadata header telling
//! the server how many bytes to stream back, at what rate, and with what
//! DSCP marking. The server echoes the same header ahead of the payload.
//!
//! The layout is part of the client/server contract:
//!
//! * 13 bytes, network byte order, no padding
//! * `id: u32 | size: u32 | tos: u8 | rate_mbps: u32`
//! * `id == 0` is reserved for the connection-termination sentinel

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::{decode_header, drain_payload, read_header};
pub use encode::encode_header;
pub use message::FlowHeader;
