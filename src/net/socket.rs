//! Owned stream socket and the raw syscalls performed on it.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::mem;

use crate::Result;
use crate::error::errno;
use crate::net::{Address, Endpoint, Family};

/// A stream socket file descriptor, closed when dropped.
///
/// Every syscall that yields a descriptor wraps it here immediately, so any
/// later failure releases it on the way out.
#[derive(Debug)]
pub(crate) struct Socket {
    fd: OwnedFd,
}

impl Socket {
    /// Creates a new blocking stream socket for `family`.
    pub(crate) fn new(family: Family) -> Result<Self> {
        let fd = unsafe { libc::socket(family.domain(), libc::SOCK_STREAM, 0) };
        if fd == -1 {
            return Err(errno!(Create, "failed to create {family:?} socket"));
        }

        // SAFETY: `fd` was just returned by `socket()` and is owned by nobody
        // else.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Sets `SO_REUSEADDR` on the socket.
    ///
    /// Returns the raw OS error so the caller can decide whether the failure
    /// matters.
    pub(crate) fn set_reuse_address(&self) -> io::Result<()> {
        let value: libc::c_int = 1;

        if unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &raw const value as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        } == -1
        {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Binds the socket to `endpoint`.
    pub(crate) fn bind(&self, endpoint: &Endpoint) -> Result<()> {
        let (storage, len) = to_sockaddr(endpoint);

        if unsafe {
            libc::bind(
                self.as_raw_fd(),
                &raw const storage as *const libc::sockaddr,
                len,
            )
        } == -1
        {
            return Err(errno!(Create, "failed to bind socket to {endpoint}"));
        }

        Ok(())
    }

    /// Places the socket into the listening state.
    pub(crate) fn listen(&self, backlog: libc::c_int) -> Result<()> {
        if unsafe { libc::listen(self.as_raw_fd(), backlog) } == -1 {
            return Err(errno!(Create, "failed to listen on socket"));
        }

        Ok(())
    }

    /// Accepts a pending connection, returning the new socket and the peer's
    /// endpoint decoded according to `family`.
    ///
    /// Blocks if the listening socket is in blocking mode.
    pub(crate) fn accept(&self, family: Family) -> Result<(Socket, Endpoint)> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = family.sockaddr_len();

        let fd = unsafe {
            libc::accept(
                self.as_raw_fd(),
                &raw mut storage as *mut libc::sockaddr,
                &raw mut len,
            )
        };
        if fd == -1 {
            return Err(errno!(Accept, "failed to accept connection"));
        }

        // SAFETY: `fd` was just returned by `accept()` and is owned by nobody
        // else.
        let sock = Socket {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        };

        Ok((sock, from_sockaddr(&storage, family)))
    }

    /// Adds `O_NONBLOCK` to the socket's file status flags.
    pub(crate) fn set_nonblocking(&self) -> Result<()> {
        let fd = self.as_raw_fd();

        // Get the current flags so they can be combined with `O_NONBLOCK`.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags == -1 {
            return Err(errno!(Mode, "failed to get flags for socket"));
        }

        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
            return Err(errno!(Mode, "failed to configure socket as non-blocking"));
        }

        Ok(())
    }

    /// Returns whether `O_NONBLOCK` is set on the socket.
    pub(crate) fn is_nonblocking(&self) -> Result<bool> {
        let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };
        if flags == -1 {
            return Err(errno!(Mode, "failed to get flags for socket"));
        }

        Ok(flags & libc::O_NONBLOCK != 0)
    }

    /// Makes exactly one `send()` attempt with no flags.
    pub(crate) fn send(&self, buf: &[u8]) -> Result<usize> {
        let n = unsafe {
            libc::send(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
            )
        };
        if n == -1 {
            return Err(errno!(Transfer, "failed to send {} bytes", buf.len()));
        }

        Ok(n as usize)
    }

    /// Makes exactly one `recv()` attempt with no flags.
    pub(crate) fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = unsafe {
            libc::recv(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n == -1 {
            return Err(errno!(Transfer, "failed to receive data"));
        }

        Ok(n as usize)
    }

    /// Closes the socket, reporting any error from `close()`.
    pub(crate) fn close(self) -> Result<()> {
        let fd = self.fd.into_raw_fd();

        if unsafe { libc::close(fd) } == -1 {
            return Err(errno!(Close, "failed to close socket"));
        }

        Ok(())
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for Socket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Builds a zero-initialized, family-specific socket address for `endpoint`,
/// with the port in network byte order.
fn to_sockaddr(endpoint: &Endpoint) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let family = endpoint.addr.family();

    match endpoint.addr {
        Address::V4(octets) => {
            let sin = unsafe { &mut *(&raw mut storage as *mut libc::sockaddr_in) };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = endpoint.port.to_be();
            sin.sin_addr.s_addr = u32::from_ne_bytes(octets);
        }
        Address::V6(octets) => {
            let sin6 = unsafe { &mut *(&raw mut storage as *mut libc::sockaddr_in6) };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = endpoint.port.to_be();
            sin6.sin6_addr.s6_addr = octets;
        }
    }

    (storage, family.sockaddr_len())
}

/// Extracts the raw address and host-order port from a socket address filled
/// in by the kernel.
fn from_sockaddr(storage: &libc::sockaddr_storage, family: Family) -> Endpoint {
    match family {
        Family::V4 => {
            let sin = unsafe { &*(storage as *const libc::sockaddr_storage as *const libc::sockaddr_in) };
            Endpoint::new(
                Address::V4(sin.sin_addr.s_addr.to_ne_bytes()),
                u16::from_be(sin.sin_port),
            )
        }
        Family::V6 => {
            let sin6 =
                unsafe { &*(storage as *const libc::sockaddr_storage as *const libc::sockaddr_in6) };
            Endpoint::new(
                Address::V6(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
            )
        }
    }
}
