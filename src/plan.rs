//! Workload plan
//!
//! The plan is the immutable, pre-materialized sequence of per-request
//! parameters: flow size, target server, DSCP class, sending rate, and
//! the inter-arrival gap before the request. It is built once at startup
//! from a seeded RNG, before any socket work begins, so a fixed seed
//! reproduces the workload exactly.

use crate::cdf::CdfTable;
use crate::config::Config;
use crate::sampling::{poisson_interval, WeightedSampler};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Discount factor translating payload bytes into wire bytes
pub const GOODPUT_RATIO: f64 = 0.97;

/// Inputs to the plan builder beyond the configuration file
#[derive(Debug, Clone)]
pub struct PlanParams {
    /// Target average RX bandwidth in Mbps
    pub load_mbps: f64,
    /// Total number of requests; mutually exclusive with `duration_secs`
    pub count: Option<u64>,
    /// Run duration in seconds, converted to a count via `period_us`
    pub duration_secs: Option<u64>,
    /// RNG seed
    pub seed: u64,
}

/// One pre-materialized request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSpec {
    /// Response size in bytes
    pub size: u32,
    /// Index of the target server in the configured server list
    pub server: usize,
    /// DSCP class
    pub dscp: u8,
    /// Server-side sending rate in Mbps; 0 means unshaped
    pub rate_mbps: u32,
    /// Inter-arrival delay before this request, in microseconds
    pub gap_us: u64,
}

/// The complete pre-materialized workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Average request arrival interval in microseconds
    pub period_us: u64,
    /// Per-request parameters, in dispatch order
    pub flows: Vec<FlowSpec>,
    /// Requests assigned to each server (diagnostic only)
    pub per_server: Vec<u64>,
}

impl Plan {
    /// Build a plan from configuration, size distribution, and parameters
    pub fn build(config: &Config, cdf: &CdfTable, params: &PlanParams) -> Result<Self> {
        if params.load_mbps <= 0.0 {
            return Err(Error::Config(format!(
                "offered load must be positive, got {}",
                params.load_mbps
            )));
        }

        let period = cdf.avg() * 8.0 / params.load_mbps / GOODPUT_RATIO;
        if !period.is_finite() || period < 0.0 {
            return Err(Error::Pacing(format!("computed arrival interval {period} us")));
        }
        let period_us = period as u64;
        if period_us == 0 {
            return Err(Error::Config(
                "computed arrival interval is not positive; lower the load or use larger flows"
                    .into(),
            ));
        }

        let count = match (params.count, params.duration_secs) {
            (Some(0), _) => {
                return Err(Error::Config("request count must be positive".into()));
            }
            (Some(n), None) => n,
            (None, Some(secs)) => (secs * 1_000_000 / period_us).max(1),
            _ => {
                return Err(Error::Config(
                    "specify either a request count or a duration, not both".into(),
                ));
            }
        };

        let dscp = WeightedSampler::new(&config.dscp)?;
        let rate = WeightedSampler::new(&config.rate)?;
        let lambda = 1.0 / period_us as f64;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut flows = Vec::with_capacity(count as usize);
        let mut per_server = vec![0u64; config.servers.len()];
        let mut size_total = 0u64;
        let mut gap_total = 0u64;
        let mut dscp_total = 0u64;
        let mut rate_total = 0u64;

        for _ in 0..count {
            let server = rng.gen_range(0..config.servers.len());
            let flow = FlowSpec {
                size: cdf.sample(&mut rng),
                server,
                dscp: dscp.sample(&mut rng) as u8,
                rate_mbps: rate.sample(&mut rng),
                gap_us: poisson_interval(&mut rng, lambda),
            };
            per_server[server] += 1;
            size_total += u64::from(flow.size);
            gap_total += flow.gap_us;
            dscp_total += u64::from(flow.dscp);
            rate_total += u64::from(flow.rate_mbps);
            flows.push(flow);
        }

        info!("generated {count} requests");
        for (i, server) in config.servers.iter().enumerate() {
            info!("{}    {} requests", server.addr(), per_server[i]);
        }
        info!("average request arrival interval: {} us", gap_total / count);
        info!("average request size: {} bytes", size_total / count);
        info!("average DSCP: {:.2}", dscp_total as f64 / count as f64);
        info!("average sending rate: {} Mbps", rate_total / count);
        info!("expected experiment duration: {} s", gap_total / 1_000_000);

        Ok(Self {
            period_us,
            flows,
            per_server,
        })
    }

    /// Number of planned requests
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Total planned response bytes
    pub fn total_bytes(&self) -> u64 {
        self.flows.iter().map(|f| u64::from(f.size)).sum()
    }
}

/// Per-flow start and stop timestamps, in microseconds since the run
/// epoch.
///
/// Slots are written concurrently: the dispatcher owns the start slot of
/// the flow it is sending, each receiver owns the stop slots of the flows
/// it completes. A zero stop slot at the end of a run marks a flow that
/// never finished.
#[derive(Debug)]
pub struct FlowTimes {
    start: Vec<AtomicU64>,
    stop: Vec<AtomicU64>,
}

impl FlowTimes {
    /// Allocate zeroed slots for `count` flows
    pub fn new(count: usize) -> Self {
        Self {
            start: (0..count).map(|_| AtomicU64::new(0)).collect(),
            stop: (0..count).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.start.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    /// Record the dispatch time of flow `index`
    pub fn record_start(&self, index: usize, us: u64) {
        self.start[index].store(us, Ordering::Release);
    }

    /// Record the completion time of flow `index`.
    ///
    /// Returns false when `index` is out of range (a server echoing an
    /// unknown flow ID), leaving all slots untouched.
    pub fn record_stop(&self, index: usize, us: u64) -> bool {
        match self.stop.get(index) {
            Some(slot) => {
                slot.store(us, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Dispatch time of flow `index`, 0 if never dispatched
    pub fn start_us(&self, index: usize) -> u64 {
        self.start[index].load(Ordering::Acquire)
    }

    /// Completion time of flow `index`, 0 if never completed
    pub fn stop_us(&self, index: usize) -> u64 {
        self.stop[index].load(Ordering::Acquire)
    }

    /// Whether flow `index` completed
    pub fn is_finished(&self, index: usize) -> bool {
        self.stop_us(index) != 0
    }
}
