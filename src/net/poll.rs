//! Readiness polling over `poll(2)`.

use std::os::fd::{AsRawFd, RawFd};

use crate::Result;
use crate::error::errno;

/// Events reported alongside the requested ones. A hang-up or error is
/// included so the caller's next `recv` or `send` observes the failure.
const ALWAYS_READY: libc::c_short = libc::POLLHUP | libc::POLLERR;

/// The kind of readiness a descriptor is polled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interest {
    /// Data or a pending connection can be read.
    #[default]
    Read,
    /// Buffer space is available to send into.
    Write,
}

impl Interest {
    fn events(self) -> libc::c_short {
        match self {
            Interest::Read => libc::POLLIN,
            Interest::Write => libc::POLLOUT,
        }
    }
}

/// A set of sockets polled for readiness.
///
/// The poller only stores descriptors. It does not own the sockets, so a
/// socket must be removed before it is closed.
#[derive(Debug, Default)]
pub struct Poller {
    fds: Vec<(RawFd, Interest)>,
}

impl Poller {
    /// Creates an empty [Poller].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a socket to be polled for read readiness. Adding a descriptor
    /// twice has no effect.
    pub fn add(&mut self, sock: &impl AsRawFd) {
        self.add_fd(sock.as_raw_fd());
    }

    /// Adds a raw descriptor to be polled for read readiness.
    pub fn add_fd(&mut self, fd: RawFd) {
        self.add_with(fd, Interest::Read);
    }

    /// Adds a raw descriptor to be polled for `interest`. A descriptor that
    /// is already present keeps its current interest.
    pub fn add_with(&mut self, fd: RawFd, interest: Interest) {
        if !self.contains(fd) {
            self.fds.push((fd, interest));
        }
    }

    /// Changes what `fd` is polled for, returning whether it was present.
    pub fn set_interest(&mut self, fd: RawFd, interest: Interest) -> bool {
        match self.fds.iter_mut().find(|(polled, _)| *polled == fd) {
            Some(entry) => {
                entry.1 = interest;
                true
            }
            None => false,
        }
    }

    /// Returns what `fd` is polled for, if it is present.
    pub fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.fds
            .iter()
            .find(|(polled, _)| *polled == fd)
            .map(|&(_, interest)| interest)
    }

    /// Stops polling `fd`, returning whether it was present.
    pub fn remove(&mut self, fd: RawFd) -> bool {
        let len = self.fds.len();
        self.fds.retain(|&(polled, _)| polled != fd);
        self.fds.len() != len
    }

    /// Returns whether `fd` is being polled.
    pub fn contains(&self, fd: RawFd) -> bool {
        self.fds.iter().any(|&(polled, _)| polled == fd)
    }

    /// Returns the number of descriptors being polled.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Returns `true` if no descriptors are being polled.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Waits up to `timeout_ms` milliseconds (`-1` waits indefinitely) and
    /// returns the descriptors that are ready for their [Interest], in the
    /// order they were added.
    ///
    /// An interrupted wait returns no descriptors rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [crate::Error::Poll] if `poll()` fails.
    pub fn wait(&self, timeout_ms: i32) -> Result<Vec<RawFd>> {
        let mut pollfds: Vec<libc::pollfd> = self
            .fds
            .iter()
            .map(|&(fd, interest)| libc::pollfd {
                fd,
                events: interest.events(),
                revents: 0,
            })
            .collect();

        let n = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if n == -1 {
            if std::io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
                return Ok(Vec::new());
            }

            return Err(errno!(Poll, "failed to poll {} sockets", pollfds.len()));
        }

        Ok(pollfds
            .iter()
            .filter(|pfd| pfd.revents & (pfd.events | ALWAYS_READY) != 0)
            .map(|pfd| pfd.fd)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Address, Listener};
    use std::io::Write;
    use std::net::{Ipv4Addr, TcpStream};

    #[test]
    fn add_and_remove() {
        let mut poller = Poller::new();
        assert!(poller.is_empty());

        poller.add_fd(7);
        poller.add_fd(7);
        poller.add_fd(9);
        assert_eq!(poller.len(), 2);
        assert!(poller.contains(7));

        assert!(poller.remove(7));
        assert!(!poller.remove(7));
        assert_eq!(poller.len(), 1);
    }

    #[test]
    fn interest_defaults_to_read_and_can_change() {
        let mut poller = Poller::new();
        poller.add_fd(7);
        assert_eq!(poller.interest(7), Some(Interest::Read));

        poller.add_with(7, Interest::Write);
        assert_eq!(poller.interest(7), Some(Interest::Read));

        assert!(poller.set_interest(7, Interest::Write));
        assert_eq!(poller.interest(7), Some(Interest::Write));

        assert!(!poller.set_interest(9, Interest::Write));
        assert_eq!(poller.interest(9), None);
    }

    #[test]
    fn wait_times_out_without_activity() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54340).unwrap();

        let mut poller = Poller::new();
        poller.add(&listener);

        assert!(poller.wait(10).unwrap().is_empty());
    }

    #[test]
    fn pending_connection_and_data_are_reported() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54341).unwrap();
        let mut client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54341)).unwrap();

        let mut poller = Poller::new();
        poller.add(&listener);
        assert_eq!(poller.wait(1000).unwrap(), vec![listener.as_raw_fd()]);

        let (conn, _) = listener.accept().unwrap();
        poller.add(&conn);
        assert!(poller.wait(10).unwrap().is_empty());

        client.write_all(b"x").unwrap();
        assert_eq!(poller.wait(1000).unwrap(), vec![conn.as_raw_fd()]);
    }

    #[test]
    fn connection_with_buffer_space_is_ready_for_write() {
        let listener = Listener::bind(Address::LOCALHOST_V4, 54342).unwrap();
        let _client = TcpStream::connect((Ipv4Addr::LOCALHOST, 54342)).unwrap();
        let (conn, _) = listener.accept().unwrap();

        let mut poller = Poller::new();
        poller.add(&conn);
        assert!(poller.wait(10).unwrap().is_empty());

        poller.set_interest(conn.as_raw_fd(), Interest::Write);
        assert_eq!(poller.wait(1000).unwrap(), vec![conn.as_raw_fd()]);
    }
}
