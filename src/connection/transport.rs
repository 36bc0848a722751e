//! TCP dialing

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

/// Open a TCP stream to `ip:port` with Nagle's algorithm disabled.
///
/// Request headers are 13 bytes and latency-critical; `TCP_NODELAY` is
/// set on the socket before connecting.
pub fn dial(ip: &str, port: u16) -> io::Result<TcpStream> {
    let addr: SocketAddr = (ip, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {ip}")))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;
    socket.connect(&addr.into())?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_dial_sets_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = dial("127.0.0.1", port).unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[test]
    fn test_dial_refused() {
        // Port 1 is essentially never listening on loopback
        assert!(dial("127.0.0.1", 1).is_err());
    }
}
