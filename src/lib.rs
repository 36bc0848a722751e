//! flowgen: a request/response traffic generator client
//!
//! This crate emulates a client driving realistic request/response flows
//! against one or more servers to measure per-flow completion times (FCT)
//! and throughput under a configured offered load. Each request is one
//! logical flow: the client writes a small metadata header telling the
//! server how many bytes to stream back, at what rate, and with what
//! DSCP marking, then waits for the response and records its completion
//! time.
//!
//! # Pipeline
//!
//! 1. Sample a workload plan: flow sizes from an empirical CDF, DSCP and
//!    rate classes by weight, Poisson inter-arrival gaps ([`plan`]).
//! 2. Open a pool of persistent TCP sessions per server, each with a
//!    blocking receiver thread ([`connection`]).
//! 3. Pace the plan at microsecond precision, compensating for sleep
//!    syscall overhead ([`pacing`], [`run`]).
//! 4. Drain outstanding responses via an in-band sentinel and write the
//!    FCT log ([`run`]).

#![warn(missing_docs, rust_2018_idioms)]

pub mod cdf;
pub mod config;
pub mod connection;
pub mod error;
pub mod pacing;
pub mod plan;
pub mod protocol;
pub mod run;
pub mod sampling;

// Re-export commonly used types
pub use cdf::CdfTable;
pub use config::Config;
pub use error::{Error, Result};
pub use plan::{Plan, PlanParams};
pub use run::Run;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
