//! Accepted, non-blocking TCP connections.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use crate::net::Endpoint;
use crate::net::socket::Socket;
use crate::{Error, Result};

/// A connection accepted by a [crate::Listener].
///
/// The socket is non-blocking, so [Connection::send] and [Connection::recv]
/// return an error for which [Error::would_block] is `true` instead of
/// suspending the caller. Each call makes exactly one syscall attempt:
/// partial writes are returned as-is and nothing is retried, so looping and
/// readiness polling are up to the caller.
///
/// The connection owns its socket; it is closed on drop or by
/// [Connection::close]. Closing a connection while another thread is
/// operating on it is not synchronized here and must be ordered by the
/// caller.
#[derive(Debug)]
pub struct Connection {
    sock: Socket,
    peer: Endpoint,
}

impl Connection {
    pub(crate) fn new(sock: Socket, peer: Endpoint) -> Self {
        Self { sock, peer }
    }

    /// Returns the peer's address and port.
    pub fn peer_endpoint(&self) -> Endpoint {
        self.peer
    }

    /// Sends as much of `buf` as the socket accepts in one attempt,
    /// returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [Error::Transfer] if `send()` fails, including when the socket
    /// is not currently writable or the connection was reset.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        self.sock.send(buf)
    }

    /// Receives up to `buf.len()` bytes in one attempt, returning the number
    /// of bytes read.
    ///
    /// `Ok(0)` means the peer performed an orderly shutdown.
    ///
    /// # Errors
    ///
    /// Returns [Error::Transfer] if `recv()` fails, including when no data is
    /// currently available.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.sock.recv(buf)
    }

    /// Returns whether the socket is in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [Error::Mode] if the socket's flags could not be read.
    pub fn is_nonblocking(&self) -> Result<bool> {
        self.sock.is_nonblocking()
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [Error::Close] if `close()` reports an error.
    pub fn close(self) -> Result<()> {
        self.sock.close()
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }
}

impl AsFd for Connection {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.sock.as_fd()
    }
}

impl Read for &Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).map_err(io::Error::from)
    }
}

impl Write for &Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).map_err(io::Error::from)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
