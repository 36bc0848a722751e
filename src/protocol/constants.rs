//! Wire protocol constants

/// Encoded length of a flow metadata header in bytes
pub const HEADER_LEN: usize = 13;

/// Flow ID reserved for the connection-termination sentinel
pub const SENTINEL_ID: u32 = 0;

/// Payload size requested by a sentinel header
pub const SENTINEL_SIZE: u32 = 100;

/// Upper bound on a single payload read
pub const MAX_READ: usize = 4096;
