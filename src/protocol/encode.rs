//! Header encoding

use super::constants::HEADER_LEN;
use super::message::FlowHeader;
use bytes::{BufMut, Bytes, BytesMut};

/// Encode a flow header into its 13-byte wire form
pub fn encode_header(header: &FlowHeader) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.put_u32(header.id);
    buf.put_u32(header.size);
    buf.put_u8(header.tos);
    buf.put_u32(header.rate_mbps);
    buf.freeze()
}
