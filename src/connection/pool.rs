//! Per-server connection pool
//!
//! A pool owns an append-only sequence of connection nodes and the
//! bookkeeping that decides which of them are free. One mutex guards the
//! free-pool view (`available_len`, `flow_finished`, membership); it is
//! held only for constant-time updates, never across I/O.
//!
//! Node state machine:
//!
//! ```text
//! INIT -> CONNECTED/idle <-> CONNECTED/busy -> CLOSED
//! ```
//!
//! `INIT -> idle` on successful connect; `idle -> busy` only by the
//! dispatcher under the pool lock; `busy -> idle` only by the receiver
//! after a complete response; any state `-> CLOSED` on a socket error or
//! sentinel completion.

use super::transport;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::warn;

/// Sessions opened per server at startup
pub const INIT_CONNS: usize = 8;

/// One persistent session to a server
#[derive(Debug)]
pub struct Node {
    stream: TcpStream,
    connected: AtomicBool,
    busy: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            connected: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            thread: Mutex::new(None),
        }
    }

    /// The underlying socket; `&TcpStream` is both `Read` and `Write`,
    /// so the receiver reads and the dispatcher writes through the same
    /// shared node.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// True between a successful handshake and receiver exit
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// True between dispatching a header and finishing its response
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Mark the node CLOSED; called by the receiver on exit
    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Shut the socket down in both directions
    pub(crate) fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    pub(crate) fn attach_thread(&self, handle: JoinHandle<()>) {
        *self.thread.lock().expect("node thread lock poisoned") = Some(handle);
    }

    fn take_thread(&self) -> Option<JoinHandle<()>> {
        self.thread.lock().expect("node thread lock poisoned").take()
    }
}

/// Counters observed at one instant, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Total nodes ever created
    pub len: usize,
    /// Nodes currently connected and not busy
    pub available_len: usize,
    /// Completed non-sentinel flows
    pub flow_finished: u64,
}

#[derive(Debug, Default)]
struct PoolState {
    nodes: Vec<Arc<Node>>,
    available_len: usize,
    flow_finished: u64,
}

/// Growable pool of persistent sessions to one server
#[derive(Debug)]
pub struct Pool {
    index: usize,
    ip: String,
    port: u16,
    state: Mutex<PoolState>,
}

impl Pool {
    /// Create an empty pool for the given server endpoint
    pub fn new(index: usize, ip: impl Into<String>, port: u16) -> Self {
        Self {
            index,
            ip: ip.into(),
            port,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Position of this pool in the configured server list
    pub fn index(&self) -> usize {
        self.index
    }

    /// Server endpoint as `ip:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Open up to `k` additional sessions.
    ///
    /// Individual dial failures are logged and skipped. Returns the
    /// nodes actually added (possibly empty); the caller must start a
    /// receiver thread for each.
    pub fn grow(&self, k: usize) -> Vec<Arc<Node>> {
        let mut added = Vec::with_capacity(k);

        for _ in 0..k {
            match transport::dial(&self.ip, self.port) {
                Ok(stream) => {
                    let node = Arc::new(Node::new(stream));
                    let mut state = self.lock();
                    state.nodes.push(Arc::clone(&node));
                    state.available_len += 1;
                    drop(state);
                    added.push(node);
                }
                Err(e) => {
                    warn!("cannot connect to {}: {e}", self.addr());
                }
            }
        }

        added
    }

    /// Return the first connected, non-busy node, if any.
    ///
    /// Does not mark the node busy: the dispatcher records the flow's
    /// start time and flips `busy` in one critical section around the
    /// header write, so the receiver cannot race past the response
    /// before the start time exists. See [`Pool::begin_flow`].
    pub fn acquire(&self) -> Option<Arc<Node>> {
        let state = self.lock();
        state
            .nodes
            .iter()
            .find(|n| n.is_connected() && !n.is_busy())
            .cloned()
    }

    /// Claim `node` for one flow.
    ///
    /// Under the pool lock: records the flow start via `record_start`,
    /// marks the node busy, and removes it from the free count.
    pub fn begin_flow<F: FnOnce()>(&self, node: &Node, record_start: F) {
        let mut state = self.lock();
        record_start();
        node.set_busy(true);
        state.available_len = state.available_len.saturating_sub(1);
    }

    /// Return a node to the free pool after a completed response
    pub fn finish_flow(&self) {
        let mut state = self.lock();
        state.available_len += 1;
        state.flow_finished += 1;
    }

    /// Account for a sentinel written to a connected node.
    ///
    /// The node will close rather than return to the free pool, so this
    /// only removes it from the free count. Shutdown is terminal; a node
    /// whose last response is still in flight can transiently drive the
    /// count to zero, hence the saturating decrement.
    pub fn sentinel_sent(&self) {
        let mut state = self.lock();
        state.available_len = state.available_len.saturating_sub(1);
    }

    /// Snapshot of the nodes currently marked connected
    pub fn connected_nodes(&self) -> Vec<Arc<Node>> {
        self.lock()
            .nodes
            .iter()
            .filter(|n| n.is_connected())
            .cloned()
            .collect()
    }

    /// Block until every receiver thread has exited
    pub fn join_all(&self) {
        let nodes: Vec<Arc<Node>> = self.lock().nodes.iter().cloned().collect();
        for node in nodes {
            if let Some(handle) = node.take_thread() {
                let _ = handle.join();
            }
        }
    }

    /// Counters at one instant
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock();
        PoolSnapshot {
            len: state.nodes.len(),
            available_len: state.available_len,
            flow_finished: state.flow_finished,
        }
    }

    /// Total nodes ever created
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Whether the pool has no nodes
    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().expect("pool lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_grow_against_live_listener() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        let added = pool.grow(3);
        assert_eq!(added.len(), 3);
        assert_eq!(
            pool.snapshot(),
            PoolSnapshot {
                len: 3,
                available_len: 3,
                flow_finished: 0
            }
        );
    }

    #[test]
    fn test_grow_against_dead_endpoint() {
        let pool = Pool::new(0, "127.0.0.1", 1);
        assert!(pool.grow(2).is_empty());
        assert!(pool.is_empty());
        assert_eq!(pool.snapshot().available_len, 0);
    }

    #[test]
    fn test_acquire_skips_busy_nodes() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        pool.grow(2);

        let first = pool.acquire().unwrap();
        let mut started = false;
        pool.begin_flow(&first, || started = true);
        assert!(started);
        assert!(first.is_busy());
        assert_eq!(pool.snapshot().available_len, 1);

        // The second acquire must return the other node
        let second = pool.acquire().unwrap();
        assert!(!second.is_busy());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_acquire_none_when_all_busy() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        let added = pool.grow(1);
        pool.begin_flow(&added[0], || {});
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn test_finish_flow_returns_node_to_free_pool() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        let added = pool.grow(1);

        pool.begin_flow(&added[0], || {});
        added[0].set_busy(false);
        pool.finish_flow();

        let snap = pool.snapshot();
        assert_eq!(snap.available_len, 1);
        assert_eq!(snap.flow_finished, 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_sentinel_decrement_saturates() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        pool.grow(1);
        pool.sentinel_sent();
        pool.sentinel_sent(); // already zero; must clamp, not underflow
        assert_eq!(pool.snapshot().available_len, 0);
    }

    #[test]
    fn test_available_matches_free_predicate() {
        let (_listener, port) = listener();
        let pool = Pool::new(0, "127.0.0.1", port);
        let added = pool.grow(4);

        pool.begin_flow(&added[1], || {});
        pool.begin_flow(&added[3], || {});

        let free = pool
            .connected_nodes()
            .iter()
            .filter(|n| !n.is_busy())
            .count();
        assert_eq!(pool.snapshot().available_len, free);
    }
}
