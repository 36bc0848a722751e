//! Run orchestration
//!
//! A [`Run`] owns everything a single traffic-generation run needs: the
//! parsed configuration, the pre-materialized plan, one connection pool
//! per server, and the per-flow timing slots. `main` builds one and
//! drives it through `connect`, `dispatch`, and `shutdown`; tests can
//! instantiate several per process.

use crate::config::Config;
use crate::connection::{receiver, Pool, INIT_CONNS};
use crate::pacing::{Pacer, Sleeper};
use crate::plan::{FlowSpec, FlowTimes, Plan, GOODPUT_RATIO};
use crate::protocol::{encode_header, FlowHeader};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Aggregate counts from the FCT log writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FctSummary {
    /// Flows with a completion record
    pub completed: u64,
    /// Flows that never completed (noted on stdout, absent from the log)
    pub unfinished: u64,
    /// Realized RX throughput in Mbps, goodput-ratio adjusted
    pub rx_mbps: u64,
}

/// One traffic-generation run
#[derive(Debug)]
pub struct Run {
    config: Config,
    plan: Plan,
    pools: Vec<Arc<Pool>>,
    times: Arc<FlowTimes>,
    epoch: Instant,
    overhead_us: u64,
    new_conns: u64,
    show_progress: bool,
}

impl Run {
    /// Assemble a run from a parsed configuration and a built plan
    pub fn new(config: Config, plan: Plan) -> Self {
        let pools = config
            .servers
            .iter()
            .enumerate()
            .map(|(i, server)| Arc::new(Pool::new(i, server.ip.clone(), server.port)))
            .collect();
        let times = Arc::new(FlowTimes::new(plan.len()));

        Self {
            config,
            plan,
            pools,
            times,
            epoch: Instant::now(),
            overhead_us: 0,
            new_conns: 0,
            show_progress: false,
        }
    }

    /// Use a calibrated sleep overhead for pacing
    pub fn with_sleep_overhead(mut self, overhead_us: u64) -> Self {
        self.overhead_us = overhead_us;
        self
    }

    /// Print a percentage progress line to stdout while dispatching
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Open the initial sessions to every server and start their
    /// receivers.
    ///
    /// Fatal only when not a single session could be opened; a server
    /// that refuses all its initial sessions is logged and the run
    /// degrades to the remaining servers.
    pub fn connect(&self) -> Result<()> {
        let mut total = 0;

        for pool in &self.pools {
            let added = pool.grow(INIT_CONNS);
            if added.is_empty() {
                warn!("no initial sessions to {}", pool.addr());
            }
            total += added.len();
            for node in added {
                receiver::spawn(
                    Arc::clone(pool),
                    node,
                    Arc::clone(&self.times),
                    self.epoch,
                );
            }
        }

        if total == 0 {
            return Err(Error::Connect(
                "could not open a session to any server".into(),
            ));
        }
        Ok(())
    }

    /// Walk the plan, pacing arrivals and writing request headers
    pub fn dispatch<S: Sleeper>(&mut self, sleeper: S) {
        let mut pacer = Pacer::new(sleeper, self.overhead_us);
        let total = self.plan.len();
        let mut next_percent = 1u64;

        for index in 0..total {
            let flow = self.plan.flows[index];
            pacer.pace(flow.gap_us);
            self.send_request(index, flow);

            if index % 100 == 0 {
                debug!("concurrent active connections: {}", self.active_connections());
            }
            if self.show_progress {
                let percent = ((index + 1) * 100 / total) as u64;
                if percent >= next_percent {
                    print!("\r{percent}% ({}/{total})", index + 1);
                    let _ = std::io::stdout().flush();
                    next_percent = percent + 1;
                }
            }
        }

        if self.show_progress {
            println!();
        }
    }

    fn send_request(&mut self, index: usize, flow: FlowSpec) {
        let pool = Arc::clone(&self.pools[flow.server]);

        let node = match pool.acquire() {
            Some(node) => node,
            None => {
                // Free pool exhausted; open one more session on demand
                let Some(node) = pool.grow(1).pop() else {
                    let err = Error::Grow(format!("no new session to {}", pool.addr()));
                    warn!("dropping request {}: {err}", index + 1);
                    return;
                };
                self.new_conns += 1;
                let snap = pool.snapshot();
                debug!(
                    "[{}] established a new connection to {} (available/total = {}/{})",
                    self.new_conns,
                    pool.addr(),
                    snap.available_len,
                    snap.len
                );
                receiver::spawn(
                    Arc::clone(&pool),
                    Arc::clone(&node),
                    Arc::clone(&self.times),
                    self.epoch,
                );
                node
            }
        };

        let header = FlowHeader::request((index + 1) as u32, flow.size, flow.dscp, flow.rate_mbps);
        let times = Arc::clone(&self.times);
        let epoch = self.epoch;
        pool.begin_flow(&node, || {
            times.record_start(index, epoch.elapsed().as_micros() as u64);
        });

        let mut stream = node.stream();
        if let Err(e) = stream.write_all(&encode_header(&header)) {
            // The node's receiver will observe the broken connection
            warn!("request {}: write to {} failed: {e}", index + 1, pool.addr());
        }
    }

    /// Send a sentinel on every still-connected session and join all
    /// receiver threads.
    pub fn shutdown(&self) {
        let sentinel = encode_header(&FlowHeader::sentinel());

        for pool in &self.pools {
            let mut sent = 0;
            for node in pool.connected_nodes() {
                pool.sentinel_sent();
                let mut stream = node.stream();
                if let Err(e) = stream.write_all(&sentinel) {
                    warn!("sentinel write to {} failed: {e}", pool.addr());
                }
                sent += 1;
            }
            pool.join_all();

            let snap = pool.snapshot();
            debug!(
                "closed {sent}/{} connections to {} ({} flows finished)",
                snap.len,
                pool.addr(),
                snap.flow_finished
            );
        }
    }

    /// Convenience driver: connect, dispatch, shut down.
    ///
    /// Returns the wall-clock duration from the first dispatch to the
    /// last receiver exit.
    pub fn execute<S: Sleeper>(&mut self, sleeper: S) -> Result<Duration> {
        self.connect()?;
        let begin = Instant::now();
        self.dispatch(sleeper);
        self.shutdown();
        Ok(begin.elapsed())
    }

    /// Write the FCT log and print the run summary.
    ///
    /// One line per completed flow: `size_bytes fct_us dscp rate_mbps
    /// goodput_mbps`. Unfinished flows are noted on stdout and omitted
    /// from the file.
    pub fn write_fct_log(&self, path: &Path, wall: Duration) -> Result<FctSummary> {
        let mut file = BufWriter::new(File::create(path)?);
        let mut completed = 0u64;
        let mut unfinished = 0u64;

        for (index, flow) in self.plan.flows.iter().enumerate() {
            let stop_us = self.times.stop_us(index);
            if stop_us == 0 {
                println!("Unfinished flow request {index}");
                unfinished += 1;
                continue;
            }

            let fct_us = stop_us.saturating_sub(self.times.start_us(index));
            let goodput_mbps = if fct_us > 0 {
                u64::from(flow.size) * 8 / fct_us
            } else {
                0
            };
            writeln!(
                file,
                "{} {} {} {} {}",
                flow.size, fct_us, flow.dscp, flow.rate_mbps, goodput_mbps
            )?;
            completed += 1;
        }
        file.flush()?;

        let duration_us = (wall.as_micros() as u64).max(1);
        let rx_mbps = ((self.plan.total_bytes() * 8 / duration_us) as f64 / GOODPUT_RATIO) as u64;
        println!("The actual RX throughput is {rx_mbps} Mbps");
        println!("The actual duration is {} s", duration_us / 1_000_000);
        println!("Write FCT results to {}", path.display());

        Ok(FctSummary {
            completed,
            unfinished,
            rx_mbps,
        })
    }

    /// The connection pools, one per configured server
    pub fn pools(&self) -> &[Arc<Pool>] {
        &self.pools
    }

    /// The per-flow timing slots
    pub fn times(&self) -> &FlowTimes {
        &self.times
    }

    /// The pre-materialized plan
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The parsed configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connections established on demand after startup
    pub fn new_connections(&self) -> u64 {
        self.new_conns
    }

    fn active_connections(&self) -> usize {
        self.pools
            .iter()
            .map(|pool| {
                let snap = pool.snapshot();
                snap.len - snap.available_len.min(snap.len)
            })
            .sum()
    }
}
