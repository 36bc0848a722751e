//! Flow metadata header

use super::constants::{SENTINEL_ID, SENTINEL_SIZE};

/// Metadata header exchanged ahead of every request and response.
///
/// The client writes one per request; the server echoes the same header
/// followed by exactly `size` bytes of payload. The `tos` field carries
/// the DSCP class shifted into the IP TOS byte (`dscp << 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowHeader {
    /// Flow identifier; 0 is reserved for the sentinel
    pub id: u32,
    /// Response payload size in bytes
    pub size: u32,
    /// IP TOS byte (`dscp << 2`)
    pub tos: u8,
    /// Server-side sending rate in Mbps; 0 means unshaped
    pub rate_mbps: u32,
}

impl FlowHeader {
    /// Build a live request header for the given DSCP class
    pub fn request(id: u32, size: u32, dscp: u8, rate_mbps: u32) -> Self {
        Self {
            id,
            size,
            tos: dscp << 2,
            rate_mbps,
        }
    }

    /// Build the connection-termination sentinel header
    pub fn sentinel() -> Self {
        Self {
            id: SENTINEL_ID,
            size: SENTINEL_SIZE,
            tos: 0,
            rate_mbps: 0,
        }
    }

    /// Check whether this header is the termination sentinel
    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_ID
    }

    /// Recover the DSCP class from the TOS byte
    pub fn dscp(&self) -> u8 {
        self.tos >> 2
    }
}
