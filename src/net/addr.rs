//! IPv4/IPv6 addresses in their raw, fixed-width form.

use std::ffi::{CStr, CString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::{fmt, mem, ptr};

use crate::AddressError;

/// Address family of a socket.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Family {
    /// IPv4 (`AF_INET`).
    V4,
    /// IPv6 (`AF_INET6`).
    V6,
}

impl Family {
    /// Returns the `AF_*` constant for this family.
    pub(crate) fn domain(self) -> libc::c_int {
        match self {
            Family::V4 => libc::AF_INET,
            Family::V6 => libc::AF_INET6,
        }
    }

    /// Returns the size of the family-specific `sockaddr` structure.
    pub(crate) fn sockaddr_len(self) -> libc::socklen_t {
        match self {
            Family::V4 => mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            Family::V6 => mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
        }
    }
}

/// A raw IPv4 (4 bytes) or IPv6 (16 bytes) address, in network byte order.
///
/// The variant fixes both the family and the buffer width, so an address can
/// never be paired with the wrong number of bytes.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Address {
    /// An IPv4 address.
    V4([u8; 4]),
    /// An IPv6 address.
    V6([u8; 16]),
}

impl Address {
    /// `127.0.0.1`
    pub const LOCALHOST_V4: Address = Address::V4([127, 0, 0, 1]);
    /// `::1`
    pub const LOCALHOST_V6: Address = Address::V6([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    /// `0.0.0.0`
    pub const UNSPECIFIED_V4: Address = Address::V4([0; 4]);
    /// `::`
    pub const UNSPECIFIED_V6: Address = Address::V6([0; 16]);

    /// Returns the family of this address.
    pub const fn family(&self) -> Family {
        match self {
            Address::V4(_) => Family::V4,
            Address::V6(_) => Family::V6,
        }
    }

    /// Returns the raw address bytes (4 or 16 of them).
    pub fn octets(&self) -> &[u8] {
        match self {
            Address::V4(octets) => octets,
            Address::V6(octets) => octets,
        }
    }

    /// Resolves `host` to its first address.
    ///
    /// IPv6 is tried first, falling back to IPv4 if the host has no IPv6
    /// address. Numeric addresses are accepted as-is.
    ///
    /// # Errors
    ///
    /// Returns [AddressError::Unresolved] if the host has no address in
    /// either family or the name contains a null (`\0`) byte.
    pub fn resolve(host: &str) -> Result<Address, AddressError> {
        let unresolved = || AddressError::Unresolved(host.to_string());

        let name = CString::new(host).map_err(|_| unresolved())?;

        lookup(&name, Family::V6)
            .or_else(|| lookup(&name, Family::V4))
            .ok_or_else(unresolved)
    }
}

/// Queries `getaddrinfo(3)` for the first stream address of `family`.
fn lookup(name: &CStr, family: Family) -> Option<Address> {
    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = family.domain();
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut res: *mut libc::addrinfo = ptr::null_mut();

    if unsafe { libc::getaddrinfo(name.as_ptr(), ptr::null(), &raw const hints, &raw mut res) }
        != 0
    {
        return None;
    }

    let mut addr = None;
    let mut cur = res;

    while !cur.is_null() && addr.is_none() {
        let info = unsafe { &*cur };

        if !info.ai_addr.is_null() {
            addr = match (info.ai_family, family) {
                (libc::AF_INET, Family::V4) => {
                    let sin = unsafe { &*(info.ai_addr as *const libc::sockaddr_in) };
                    // `s_addr` is already in network byte order.
                    Some(Address::V4(sin.sin_addr.s_addr.to_ne_bytes()))
                }
                (libc::AF_INET6, Family::V6) => {
                    let sin6 = unsafe { &*(info.ai_addr as *const libc::sockaddr_in6) };
                    Some(Address::V6(sin6.sin6_addr.s6_addr))
                }
                _ => None,
            };
        }

        cur = info.ai_next;
    }

    unsafe { libc::freeaddrinfo(res) };

    addr
}

impl TryFrom<&[u8]> for Address {
    type Error = AddressError;

    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        match buf.len() {
            4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(buf);
                Ok(Address::V4(octets))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(buf);
                Ok(Address::V6(octets))
            }
            provided => Err(AddressError::InvalidLength { provided }),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Address::V4(addr.octets())
    }
}

impl From<Ipv6Addr> for Address {
    fn from(addr: Ipv6Addr) -> Self {
        Address::V6(addr.octets())
    }
}

impl From<IpAddr> for Address {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(addr: Address) -> Self {
        match addr {
            Address::V4(octets) => IpAddr::V4(Ipv4Addr::from(octets)),
            Address::V6(octets) => IpAddr::V6(Ipv6Addr::from(octets)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&IpAddr::from(*self), f)
    }
}

/// An address and a port number (host byte order).
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct Endpoint {
    /// IPv4 or IPv6 address.
    pub addr: Address,
    /// Port number.
    pub port: u16,
}

impl Endpoint {
    /// Creates a new [Endpoint].
    pub const fn new(addr: Address, port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Address::V4(_) => write!(f, "{}:{}", self.addr, self.port),
            Address::V6(_) => write!(f, "[{}]:{}", self.addr, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn only_four_or_sixteen_bytes_convert(buf in prop::collection::vec(any::<u8>(), 0..32)) {
            match Address::try_from(&buf[..]) {
                Ok(addr) => {
                    prop_assert!(buf.len() == 4 || buf.len() == 16);
                    prop_assert_eq!(addr.octets(), &buf[..]);
                }
                Err(err) => {
                    prop_assert!(buf.len() != 4 && buf.len() != 16);
                    prop_assert_eq!(err, AddressError::InvalidLength { provided: buf.len() });
                }
            }
        }
    }

    #[test]
    fn family_follows_variant() {
        assert_eq!(Address::LOCALHOST_V4.family(), Family::V4);
        assert_eq!(Address::LOCALHOST_V6.family(), Family::V6);
        assert_eq!(Family::V4.domain(), libc::AF_INET);
        assert_eq!(Family::V6.domain(), libc::AF_INET6);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Address::LOCALHOST_V4.to_string(), "127.0.0.1");
        assert_eq!(Address::LOCALHOST_V6.to_string(), "::1");

        let mut octets = [0u8; 16];
        octets[0] = 0xfe;
        octets[1] = 0x80;
        octets[15] = 0x2a;
        assert_eq!(Address::V6(octets).to_string(), "fe80::2a");

        assert_eq!(
            Endpoint::new(Address::V4([10, 0, 0, 1]), 80).to_string(),
            "10.0.0.1:80"
        );
        assert_eq!(
            Endpoint::new(Address::LOCALHOST_V6, 8080).to_string(),
            "[::1]:8080"
        );
    }

    #[test]
    fn std_conversions() {
        let addr = Address::from(Ipv4Addr::new(192, 168, 0, 44));
        assert_eq!(addr, Address::V4([192, 168, 0, 44]));
        assert_eq!(IpAddr::from(addr), IpAddr::V4(Ipv4Addr::new(192, 168, 0, 44)));

        let addr = Address::from(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(addr, Address::LOCALHOST_V6);
    }

    #[test]
    fn resolve_numeric_addresses() {
        assert_eq!(Address::resolve("127.0.0.1"), Ok(Address::LOCALHOST_V4));
        assert_eq!(Address::resolve("::1"), Ok(Address::LOCALHOST_V6));
    }

    #[test]
    fn resolve_localhost_is_loopback() {
        let addr = Address::resolve("localhost").unwrap();
        assert!(IpAddr::from(addr).is_loopback());
    }

    #[test]
    fn resolve_rejects_interior_null() {
        assert_eq!(
            Address::resolve("local\0host"),
            Err(AddressError::Unresolved("local\0host".to_string()))
        );
    }
}
