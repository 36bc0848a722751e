//! Persistent connections to target servers
//!
//! Each configured server gets one [`Pool`] of persistent TCP sessions.
//! The dispatcher borrows a free session to write a request header; a
//! dedicated receiver thread per session blocks on the response and
//! returns the session to the free pool.

pub mod pool;
pub mod receiver;
pub mod transport;

pub use pool::{Node, Pool, PoolSnapshot, INIT_CONNS};
