//! Header decoding and blocking read helpers

use super::constants::{HEADER_LEN, MAX_READ};
use super::message::FlowHeader;
use bytes::Buf;
use std::io::{self, Read};

/// Decode a flow header from its 13-byte wire form
pub fn decode_header(mut data: &[u8]) -> io::Result<FlowHeader> {
    if data.len() < HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete flow header",
        ));
    }

    let id = data.get_u32();
    let size = data.get_u32();
    let tos = data.get_u8();
    let rate_mbps = data.get_u32();

    Ok(FlowHeader {
        id,
        size,
        tos,
        rate_mbps,
    })
}

/// Read one flow header from a blocking stream.
///
/// Blocks until all 13 bytes have arrived; EOF before a full header is an
/// `UnexpectedEof` error.
pub fn read_header<R: Read>(stream: &mut R) -> io::Result<FlowHeader> {
    let mut buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut buf)?;
    decode_header(&buf)
}

/// Drain exactly `size` payload bytes from a blocking stream.
///
/// Reads in chunks of at most [`MAX_READ`] bytes into a scratch buffer;
/// the payload itself is opaque and discarded. EOF before `size` bytes
/// have arrived is an `UnexpectedEof` error.
pub fn drain_payload<R: Read>(stream: &mut R, size: u32) -> io::Result<()> {
    let mut scratch = [0u8; MAX_READ];
    let mut remaining = size as usize;

    while remaining > 0 {
        let chunk = remaining.min(MAX_READ);
        let n = stream.read(&mut scratch[..chunk])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-payload",
            ));
        }
        remaining -= n;
    }

    Ok(())
}
