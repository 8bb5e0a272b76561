//! Dual-stack (IPv4/IPv6) TCP socket primitives built directly on Linux
//! syscalls.
//!
//! The crate exposes bind-and-listen, accept (returning non-blocking
//! connections), single-attempt send/receive, and a millisecond wall-clock
//! reader. Connection management, framing, and protocol handling belong to
//! the caller.

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

#[cfg(not(target_os = "linux"))]
compile_error!("This crate is only compatible with Linux systems.");

pub mod error;
pub mod log;
pub mod net;
pub mod time;

pub use error::{AddressError, Error, Result};
pub use net::{Address, Connection, Endpoint, Family, Interest, Listener, Poller};
pub use time::current_time_millis;
