//! Dual-stack TCP socket primitives.
//!
//! Every operation here is a thin, single-attempt wrapper around one or two
//! syscalls. No operation retries, loops, or keeps state between calls:
//! connection lifecycle, buffering, and readiness policy belong to the
//! caller.

mod addr;
mod connection;
mod listener;
mod poll;
mod socket;

pub use addr::{Address, Endpoint, Family};
pub use connection::Connection;
pub use listener::{LISTEN_BACKLOG, Listener, REUSE_ADDRESS};
pub use poll::{Interest, Poller};

use crate::Result;

/// Creates a listening socket bound to `addr:port`.
///
/// The socket's family follows `addr`, and the port is given in host byte
/// order. See [Listener::bind].
pub fn bind_and_listen(addr: Address, port: u16) -> Result<Listener> {
    Listener::bind(addr, port)
}

/// Accepts a pending connection on `listener`, returning the non-blocking
/// connection together with the peer's raw address and host-order port.
///
/// See [Listener::accept].
pub fn accept_connection(listener: &Listener) -> Result<(Connection, Address, u16)> {
    let (conn, peer) = listener.accept()?;
    Ok((conn, peer.addr, peer.port))
}

/// Makes one attempt to send `data` on `conn`, returning the number of bytes
/// written, which may be fewer than `data.len()`.
///
/// See [Connection::send].
pub fn send_bytes(conn: &Connection, data: &[u8]) -> Result<usize> {
    conn.send(data)
}

/// Makes one attempt to receive up to `capacity` bytes into `buf`, returning
/// the number of bytes read (`0` at end of stream).
///
/// `capacity` is clamped to `buf.len()`. See [Connection::recv].
pub fn recv_bytes(conn: &Connection, buf: &mut [u8], capacity: usize) -> Result<usize> {
    let len = capacity.min(buf.len());
    conn.recv(&mut buf[..len])
}
