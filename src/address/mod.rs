//! Turns a range notation into the addresses a scan should visit.

mod dispatch_order;

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use cidr_utils::cidr::Ipv4Inet;
use itertools::Either;

use crate::error::RangeParseError;
use crate::input::ScanOrder;
use dispatch_order::DispatchOrder;

/// Widest prefix for which network and broadcast addresses are dropped.
const MAX_PREFIX_WITH_BROADCAST: u8 = 30;

/// An inclusive, non-empty block of usable IPv4 host addresses.
///
/// The value is `Copy`, so iterating it never consumes the range and a scan
/// can be restarted from the same value.
///
/// ```rust
/// # use piscan::address::AddressRange;
/// let range = AddressRange::parse("192.168.1.0/30").unwrap();
/// let hosts: Vec<_> = range.iter().map(|ip| ip.to_string()).collect();
/// assert_eq!(hosts, ["192.168.1.1", "192.168.1.2"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    first: u32,
    last: u32,
}

impl AddressRange {
    /// Parses a CIDR-style IPv4 range. A bare address is read as a `/32`;
    /// host bits set below the prefix are masked off, so `192.168.1.5/24`
    /// covers `192.168.1.0/24`.
    pub fn parse(input: &str) -> Result<Self, RangeParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RangeParseError::new(input, "empty range"));
        }

        let cidr = if trimmed.contains('/') {
            Ipv4Inet::from_str(trimmed)
        } else {
            Ipv4Inet::from_str(&format!("{trimmed}/32"))
        }
        .map_err(|e| RangeParseError::new(input, e.to_string()))?
        .network();

        let mut first = u32::from(cidr.first_address());
        let mut last = u32::from(cidr.last_address());

        // Drop network and broadcast only where the block is wide enough for
        // them to be distinct from the hosts.
        if cidr.network_length() <= MAX_PREFIX_WITH_BROADCAST {
            first += 1;
            last -= 1;
        }

        Ok(Self { first, last })
    }

    /// Number of host addresses in the range.
    pub const fn len(&self) -> u64 {
        (self.last - self.first) as u64 + 1
    }

    /// A parsed range always holds at least one address.
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.first)
    }

    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (self.first..=self.last).contains(&u32::from(ip))
    }

    /// Ascending iteration over every host address.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (self.first..=self.last).map(Ipv4Addr::from)
    }

    /// The order in which workers pick addresses up. Each address is yielded
    /// exactly once whatever the order.
    pub fn dispatch(&self, order: ScanOrder) -> impl Iterator<Item = IpAddr> {
        match order {
            ScanOrder::Serial => Either::Left(self.iter().map(IpAddr::V4)),
            ScanOrder::Random => Either::Right(
                DispatchOrder::new_random(self.first, self.len()).map(IpAddr::V4),
            ),
        }
    }
}

impl FromStr for AddressRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl IntoIterator for AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = std::iter::Map<std::ops::RangeInclusive<u32>, fn(u32) -> Ipv4Addr>;

    fn into_iter(self) -> Self::IntoIter {
        (self.first..=self.last).map(Ipv4Addr::from as fn(u32) -> Ipv4Addr)
    }
}
