//! Shared test infrastructure: loopback stub servers speaking the flow
//! metadata protocol, and on-disk fixtures for configuration and size
//! distribution files.

use flowgen::protocol::{encode_header, read_header};
use std::io::Write as _;
use std::net::{TcpListener, TcpStream};
use std::thread;
use tempfile::NamedTempFile;

/// Handle to a stub server listening on loopback
pub struct StubServer {
    /// Bound TCP port
    pub port: u16,
}

/// Spawn a server that, for every request header, echoes the header
/// followed by exactly `size` payload bytes. A sentinel gets its response
/// too, then the connection closes.
pub fn spawn_echo_server() -> StubServer {
    spawn_server(serve_echo)
}

/// Spawn a server that accepts each request header and then closes the
/// connection without responding.
pub fn spawn_drop_server() -> StubServer {
    spawn_server(serve_drop)
}

fn spawn_server(serve: fn(TcpStream)) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(conn) = conn else { break };
            thread::spawn(move || serve(conn));
        }
    });

    StubServer { port }
}

fn serve_echo(mut conn: TcpStream) {
    loop {
        let Ok(header) = read_header(&mut &conn) else {
            return;
        };
        if conn.write_all(&encode_header(&header)).is_err() {
            return;
        }

        let mut remaining = header.size as usize;
        let zeros = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(zeros.len());
            if conn.write_all(&zeros[..n]).is_err() {
                return;
            }
            remaining -= n;
        }

        if header.is_sentinel() {
            return;
        }
    }
}

fn serve_drop(conn: TcpStream) {
    let _ = read_header(&mut &conn);
    // Dropping the stream tears the connection before any response
}

/// Write a size distribution where every flow is exactly `size` bytes
pub fn constant_size_dist(size: u32) -> NamedTempFile {
    write_fixture(&format!("{size} 0\n{size} 1.0\n"))
}

/// Write a configuration file pointing one server at the stub
pub fn single_server_config(port: u16, dist_path: &str, extra: &str) -> NamedTempFile {
    write_fixture(&format!(
        "server 127.0.0.1 {port}\nreq_size_dist {dist_path}\n{extra}"
    ))
}

fn write_fixture(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp fixture");
    file.write_all(content.as_bytes()).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}
