//! Per-connection receiver thread
//!
//! One receiver per node blocks on the socket, reads the echoed metadata
//! header and the full payload for each response, stamps the flow's
//! completion time, and returns the node to the free pool. It exits on
//! the sentinel response or on any socket error, closing the socket and
//! marking the node CLOSED either way.

use super::pool::{Node, Pool};
use crate::plan::FlowTimes;
use crate::protocol::{drain_payload, read_header};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Start the receiver thread for a freshly connected node
pub fn spawn(pool: Arc<Pool>, node: Arc<Node>, times: Arc<FlowTimes>, epoch: Instant) {
    let thread_node = Arc::clone(&node);
    let result = thread::Builder::new()
        .name(format!("recv-{}", pool.addr()))
        .spawn(move || listen(&pool, &thread_node, &times, epoch));

    match result {
        Ok(handle) => node.attach_thread(handle),
        Err(e) => {
            // Without a receiver the session cannot complete flows
            warn!("cannot start receiver thread: {e}");
            node.close();
            node.mark_disconnected();
        }
    }
}

fn listen(pool: &Pool, node: &Node, times: &FlowTimes, epoch: Instant) {
    loop {
        let mut stream = node.stream();

        let header = match read_header(&mut stream) {
            Ok(header) => header,
            Err(e) => {
                debug!("{}: connection ended: {e}", pool.addr());
                break;
            }
        };

        if let Err(e) = drain_payload(&mut stream, header.size) {
            warn!("{}: flow {} torn mid-payload: {e}", pool.addr(), header.id);
            break;
        }

        if !header.is_sentinel() {
            let stop_us = epoch.elapsed().as_micros() as u64;
            if !times.record_stop((header.id - 1) as usize, stop_us) {
                warn!("{}: server echoed unknown flow id {}", pool.addr(), header.id);
            }
        }

        node.set_busy(false);
        if header.is_sentinel() {
            // The server closes after the sentinel response; the node
            // never returns to the free pool.
            break;
        }
        pool.finish_flow();
    }

    node.close();
    node.mark_disconnected();
}
