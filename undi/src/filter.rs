//! Receive filtering.
//!
//! Flag values are the UNDI packet filter bits; they travel unchanged
//! through UNDI_OPEN and UNDI_SET_PACKET_FILTER.

use bitflags::bitflags;
use heapless::Vec;

use crate::types::{FrameDestination, MacAddress};

/// Most multicast addresses an UNDI caller may register.
pub const MAX_MCAST_ADDRESSES: usize = 8;

/// Registered multicast addresses.
pub type MulticastList = Vec<MacAddress, MAX_MCAST_ADDRESSES>;

bitflags! {
    /// UNDI receive filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFilter: u8 {
        const DIRECTED = 0x01;
        const BROADCAST = 0x02;
        const PROMISCUOUS = 0x04;
        const SOURCE_ROUTING = 0x08;
    }
}

impl PacketFilter {
    /// Filter used before the caller ever opens the adapter.
    pub const fn boot_default() -> Self {
        Self::DIRECTED.union(Self::BROADCAST)
    }

    /// Software check for adapters that cannot filter in hardware.
    pub fn accepts(&self, destination: FrameDestination, dst: &MacAddress, mcast: &MulticastList) -> bool {
        if self.contains(Self::PROMISCUOUS) {
            return true;
        }
        match destination {
            FrameDestination::Directed => self.contains(Self::DIRECTED),
            FrameDestination::Broadcast => self.contains(Self::BROADCAST),
            FrameDestination::Multicast => mcast.iter().any(|m| m == dst),
            FrameDestination::Promiscuous => false,
        }
    }
}

/// Ethernet group address for an IPv4 multicast address (RFC 1112 §6.4).
pub fn multicast_mac_for(ip: [u8; 4]) -> MacAddress {
    [0x01, 0x00, 0x5e, ip[1] & 0x7f, ip[2], ip[3]]
}

/// Build a multicast list from caller input, truncating to capacity.
///
/// Returns the list and whether anything was dropped.
pub fn multicast_list_from(addrs: &[MacAddress]) -> (MulticastList, bool) {
    let mut list = MulticastList::new();
    let mut truncated = false;
    for mac in addrs {
        if list.push(*mac).is_err() {
            truncated = true;
            break;
        }
    }
    (list, truncated)
}
