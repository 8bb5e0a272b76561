//! Error types for socket operations.

use std::{error, fmt, io, result};

/// Creates a [`crate::Error`] of the given variant with a message prefixed to
/// the current `errno` value.
macro_rules! errno {
    ($variant:ident, $($arg:tt)+) => {{
        let errno = ::std::io::Error::last_os_error();
        let prefix = format!($($arg)+);
        let msg = format!("{prefix}: {errno}");
        $crate::Error::$variant(::std::io::Error::new(errno.kind(), msg))
    }};
}
pub(crate) use errno;

/// A convenience wrapper around `Result` for [crate::Error].
pub type Result<T> = result::Result<T, Error>;

/// Represents errors that can occur while operating on sockets.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Creating, binding, or listening on a socket failed.
    Create(io::Error),
    /// Accepting a pending connection, or switching it to non-blocking mode,
    /// failed.
    Accept(io::Error),
    /// A single send or receive attempt failed.
    Transfer(io::Error),
    /// The system clock could not be read.
    Clock(io::Error),
    /// Releasing a socket failed.
    Close(io::Error),
    /// Waiting for socket readiness failed.
    Poll(io::Error),
    /// Reading or changing a socket's file status flags failed.
    Mode(io::Error),
    /// A raw address was malformed or a hostname could not be resolved.
    Address(AddressError),
}

impl Error {
    /// Returns `true` if the operation failed only because a non-blocking
    /// socket was not ready.
    pub fn would_block(&self) -> bool {
        self.io_error()
            .is_some_and(|err| err.kind() == io::ErrorKind::WouldBlock)
    }

    /// Returns the underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match *self {
            Error::Create(ref e)
            | Error::Accept(ref e)
            | Error::Transfer(ref e)
            | Error::Clock(ref e)
            | Error::Close(ref e)
            | Error::Poll(ref e)
            | Error::Mode(ref e) => Some(e),
            Error::Address(_) => None,
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Address(ref e) => Some(e),
            _ => self
                .io_error()
                .map(|e| e as &(dyn error::Error + 'static)),
        }
    }
}

impl From<AddressError> for Error {
    fn from(err: AddressError) -> Error {
        Error::Address(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Create(e)
            | Error::Accept(e)
            | Error::Transfer(e)
            | Error::Clock(e)
            | Error::Close(e)
            | Error::Poll(e)
            | Error::Mode(e) => e,
            Error::Address(e) => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Create(ref e) => fmt::Display::fmt(e, f),
            Error::Accept(ref e) => fmt::Display::fmt(e, f),
            Error::Transfer(ref e) => fmt::Display::fmt(e, f),
            Error::Clock(ref e) => fmt::Display::fmt(e, f),
            Error::Close(ref e) => fmt::Display::fmt(e, f),
            Error::Poll(ref e) => fmt::Display::fmt(e, f),
            Error::Mode(ref e) => fmt::Display::fmt(e, f),
            Error::Address(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

/// Represents errors that can occur when constructing or resolving an
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The raw address buffer is neither 4 (IPv4) nor 16 (IPv6) bytes long.
    InvalidLength {
        /// The length of the buffer provided.
        provided: usize,
    },
    /// The hostname could not be resolved to an IPv4 or IPv6 address.
    Unresolved(String),
}

impl error::Error for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AddressError::InvalidLength { provided } => {
                write!(
                    f,
                    "invalid address length: {provided} bytes (must be 4 for IPv4 or 16 for IPv6)"
                )
            }
            AddressError::Unresolved(ref host) => {
                write!(f, "failed to resolve hostname: {host}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_only_for_would_block_kind() {
        let err = Error::Transfer(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(err.would_block());

        let err = Error::Transfer(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(!err.would_block());

        let err = Error::Address(AddressError::InvalidLength { provided: 5 });
        assert!(!err.would_block());
    }

    #[test]
    fn errno_macro_prefixes_message() {
        // SAFETY: `close(-1)` has no effect other than setting `errno`.
        unsafe { libc::close(-1) };
        let err = errno!(Close, "failed to close socket");

        assert!(matches!(err, Error::Close(_)));
        assert!(err.to_string().starts_with("failed to close socket: "));
    }

    #[test]
    fn address_error_converts_to_invalid_input() {
        let err: io::Error = Error::from(AddressError::InvalidLength { provided: 3 }).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
