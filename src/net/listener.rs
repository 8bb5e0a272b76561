//! Listening sockets.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use crate::{Error, Result};
use crate::net::socket::Socket;
use crate::net::{Address, Connection, Endpoint, Family};
use crate::{debug, info, warn};

/// Length of the pending-connection queue requested from `listen()`.
///
/// The kernel may still queue a small number of connections for a zero
/// backlog, but callers must not rely on more than minimal queuing.
pub const LISTEN_BACKLOG: libc::c_int = 0;

/// Whether `SO_REUSEADDR` is requested on new listening sockets.
pub const REUSE_ADDRESS: bool = true;

/// A TCP socket server, listening for connections.
///
/// The listener stays in blocking mode, so [Listener::accept] suspends the
/// calling thread until a connection arrives. The socket is closed when the
/// listener is dropped, or explicitly with [Listener::close].
#[derive(Debug)]
pub struct Listener {
    sock: Socket,
    local: Endpoint,
    reuse_address: bool,
}

impl Listener {
    /// Creates a stream socket for the family of `addr`, binds it to
    /// `addr:port`, and places it into the listening state.
    ///
    /// Setting `SO_REUSEADDR` is attempted first; failing to set it is
    /// logged and recorded (see [Listener::reuse_address]) but does not fail
    /// the bind. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [crate::Error::Create] if the socket could not be created,
    /// bound, or put into the listening state. The partially set up socket is
    /// closed before the error is returned.
    pub fn bind(addr: Address, port: u16) -> Result<Self> {
        let local = Endpoint::new(addr, port);
        let sock = Socket::new(addr.family())?;

        let reuse_address = REUSE_ADDRESS
            && match sock.set_reuse_address() {
                Ok(()) => {
                    debug!("SO_REUSEADDR set for {local}");
                    true
                }
                Err(err) => {
                    warn!("failed to set SO_REUSEADDR for {local}: {err}");
                    false
                }
            };

        sock.bind(&local)?;
        sock.listen(LISTEN_BACKLOG)?;

        info!("listening for connections on {local}");

        Ok(Self {
            sock,
            local,
            reuse_address,
        })
    }

    /// Accepts a pending connection, blocking until one is available.
    ///
    /// The returned [Connection] is always in non-blocking mode, and the
    /// returned [Endpoint] is the peer's address and port decoded in this
    /// listener's family.
    ///
    /// # Errors
    ///
    /// Returns [crate::Error::Accept] if `accept()` fails (for example when
    /// interrupted) or if the new socket could not be made non-blocking, in
    /// which case it is closed before the error is returned.
    pub fn accept(&self) -> Result<(Connection, Endpoint)> {
        let (sock, peer) = self.sock.accept(self.family())?;

        // `sock` is dropped, and so closed, on this early return.
        if let Err(err) = sock.set_nonblocking() {
            let err = io::Error::from(err);
            let msg = format!("failed to make connection from {peer} non-blocking: {err}");
            return Err(Error::Accept(io::Error::new(err.kind(), msg)));
        }

        debug!("accepted connection from {peer} on {}", self.local);

        Ok((Connection::new(sock, peer), peer))
    }

    /// Returns the address family the listener was created with.
    pub fn family(&self) -> Family {
        self.local.addr.family()
    }

    /// Returns the endpoint the listener was bound to.
    pub fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    /// Returns whether `SO_REUSEADDR` was successfully set during
    /// [Listener::bind].
    pub fn reuse_address(&self) -> bool {
        self.reuse_address
    }

    /// Closes the listening socket.
    ///
    /// Connections previously accepted from this listener are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [crate::Error::Close] if `close()` reports an error.
    pub fn close(self) -> Result<()> {
        self.sock.close()
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.sock.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{Ipv4Addr, Ipv6Addr, TcpListener, TcpStream};

    /// Whether the host has an IPv6 loopback to bind to.
    fn ipv6_loopback_available() -> bool {
        TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).is_ok()
    }

    /// Whether an IPv6 wildcard socket on this host also accepts IPv4 peers.
    fn dual_stack_available() -> bool {
        let Ok(listener) = TcpListener::bind((Ipv6Addr::UNSPECIFIED, 0)) else {
            return false;
        };
        let Ok(local) = listener.local_addr() else {
            return false;
        };

        TcpStream::connect((Ipv4Addr::LOCALHOST, local.port())).is_ok()
    }

    #[test]
    fn bind_records_reuse_address() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54330).unwrap();

        assert!(listener.reuse_address());
        assert_eq!(listener.family(), Family::V4);
        assert_eq!(
            listener.local_endpoint(),
            Endpoint::new(Address::LOCALHOST_V4, 54330)
        );

        listener.close().unwrap();
    }

    #[test]
    fn bind_to_port_in_use_fails() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54331).unwrap();

        let err = Listener::bind(Address::LOCALHOST_V4, 54331).unwrap_err();
        assert!(matches!(err, Error::Create(_)));

        drop(listener);
    }

    #[test]
    fn bind_to_foreign_address_fails() {
        // TEST-NET-1 is never assigned to a local interface.
        let err = Listener::bind(Address::V4([192, 0, 2, 1]), 54332).unwrap_err();
        assert!(matches!(err, Error::Create(_)));
    }

    #[test]
    fn accept_reports_peer_and_returns_nonblocking_connection() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54333).unwrap();
        let client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54333)).unwrap();

        let (conn, peer) = listener.accept().unwrap();

        assert_eq!(peer.addr, Address::LOCALHOST_V4);
        assert_eq!(peer.port, client.local_addr().unwrap().port());
        assert_eq!(conn.peer_endpoint(), peer);
        assert!(conn.is_nonblocking().unwrap());
    }

    #[test]
    fn closing_listener_leaves_connection_open() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54334).unwrap();
        let mut client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54334)).unwrap();

        let (conn, _) = listener.accept().unwrap();
        listener.close().unwrap();

        assert_eq!(conn.send(b"still here").unwrap(), 10);

        let mut buf = [0u8; 10];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"still here");
    }

    #[test]
    fn accept_on_nonblocking_listener_without_pending_would_block() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54336).unwrap();

        let fd = listener.as_raw_fd();
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            assert_ne!(flags, -1);
            assert_ne!(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK), -1);
        }

        let err = listener.accept().unwrap_err();
        assert!(matches!(err, Error::Accept(_)));
        assert!(err.would_block());
        assert!(err.to_string().starts_with("failed to accept connection: "));
    }

    #[test]
    fn ipv6_listener_accepts_ipv6_peer() {
        if !ipv6_loopback_available() {
            return;
        }

        let listener = Listener::bind(Address::LOCALHOST_V6, 54335).unwrap();
        let client = TcpStream::connect((Ipv6Addr::LOCALHOST, 54335)).unwrap();

        let (conn, peer) = listener.accept().unwrap();

        assert_eq!(listener.family(), Family::V6);
        assert_eq!(peer.addr, Address::LOCALHOST_V6);
        assert_eq!(peer.addr.octets().len(), 16);
        assert_eq!(peer.port, client.local_addr().unwrap().port());
        assert!(conn.is_nonblocking().unwrap());
    }

    #[test]
    fn ipv6_wildcard_listener_reports_ipv4_peer_as_mapped() {
        if !dual_stack_available() {
            return;
        }

        let listener = Listener::bind(Address::UNSPECIFIED_V6, 54338).unwrap();
        assert_eq!(listener.family(), Family::V6);

        let client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54338)).unwrap();
        let (conn, peer) = listener.accept().unwrap();

        assert_eq!(peer.addr, Address::from(Ipv4Addr::LOCALHOST.to_ipv6_mapped()));
        assert_eq!(peer.addr.family(), Family::V6);
        assert_eq!(peer.port, client.local_addr().unwrap().port());
        assert!(conn.is_nonblocking().unwrap());
    }

    #[test]
    fn ipv4_wildcard_listener_accepts_loopback_peer() {
        let listener = Listener::bind(Address::UNSPECIFIED_V4, 54339).unwrap();
        assert_eq!(listener.local_endpoint().to_string(), "0.0.0.0:54339");

        let _client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54339)).unwrap();
        let (_, peer) = listener.accept().unwrap();

        assert_eq!(peer.addr, Address::LOCALHOST_V4);
    }
}
