//! Ethernet definitions shared by the UNDI calls.
//!
//! Only what the PXE transmit/ISR paths need: header layout, ethertypes
//! and frame classification. Full protocol parsing lives in smoltcp.

/// MAC address (6 bytes).
pub type MacAddress = [u8; 6];

/// MAC address length.
pub const ETH_ALEN: usize = 6;
/// Ethernet header length (dst + src + ethertype).
pub const ETH_HLEN: usize = 14;
/// Ethernet payload MTU.
pub const ETH_MTU: usize = 1500;
/// Largest frame we hand to a driver (no FCS).
pub const ETH_FRAME_MAX: usize = ETH_HLEN + ETH_MTU;

/// All-ones broadcast address.
pub const BROADCAST_MAC: MacAddress = [0xFF; 6];

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_RARP: u16 = 0x8035;

/// Network protocol carried by a frame, as far as UNDI callers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameProtocol {
    Ip,
    Arp,
    Rarp,
    Other,
}

impl FrameProtocol {
    /// Ethertype used when we build the media header ourselves.
    pub fn ethertype(self) -> Option<u16> {
        match self {
            FrameProtocol::Ip => Some(ETHERTYPE_IPV4),
            FrameProtocol::Arp => Some(ETHERTYPE_ARP),
            FrameProtocol::Rarp => Some(ETHERTYPE_RARP),
            FrameProtocol::Other => None,
        }
    }

    fn from_ethertype(ethertype: u16) -> Self {
        match ethertype {
            ETHERTYPE_IPV4 => FrameProtocol::Ip,
            ETHERTYPE_ARP => FrameProtocol::Arp,
            ETHERTYPE_RARP => FrameProtocol::Rarp,
            _ => FrameProtocol::Other,
        }
    }
}

/// How a received frame was addressed relative to our station address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDestination {
    Directed,
    Broadcast,
    Multicast,
    /// Neither ours nor group-addressed; only seen in promiscuous mode.
    Promiscuous,
}

/// Classification of a received Ethernet frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClass {
    pub protocol: FrameProtocol,
    pub destination: FrameDestination,
}

/// Classify a received frame. Returns `None` for runts shorter than a header.
pub fn classify(frame: &[u8], station: &MacAddress) -> Option<FrameClass> {
    if frame.len() < ETH_HLEN {
        return None;
    }
    let dst = &frame[0..ETH_ALEN];
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);

    let destination = if dst == BROADCAST_MAC {
        FrameDestination::Broadcast
    } else if dst[0] & 0x01 != 0 {
        FrameDestination::Multicast
    } else if dst == station {
        FrameDestination::Directed
    } else {
        FrameDestination::Promiscuous
    };

    Some(FrameClass {
        protocol: FrameProtocol::from_ethertype(ethertype),
        destination,
    })
}

/// Write an Ethernet header into the first `ETH_HLEN` bytes of `buf`.
///
/// Returns `false` if `buf` is too short.
pub fn write_header(buf: &mut [u8], dst: &MacAddress, src: &MacAddress, ethertype: u16) -> bool {
    if buf.len() < ETH_HLEN {
        return false;
    }
    buf[0..6].copy_from_slice(dst);
    buf[6..12].copy_from_slice(src);
    buf[12..14].copy_from_slice(&ethertype.to_be_bytes());
    true
}
