//! Call envelopes.
//!
//! An envelope is what the boot program hands us: a status slot plus the
//! parameter block of one call. Parameter blocks carry both the request and
//! the response fields; handlers read the former and fill in the latter.
//! Buffers are borrowed from the caller for the duration of the call only.
//!
//! Field names follow the PXE parameter structures where a reader would
//! look them up there.

use bitflags::bitflags;

use morpheus_undi::{MacAddress, PciIdentity};

use crate::status::Status;

/// One PXE call in flight.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub status: Status,
    pub call: Call<'a>,
}

impl<'a> Envelope<'a> {
    pub fn new(call: Call<'a>) -> Self {
        Self {
            status: Status::default(),
            call,
        }
    }
}

/// Parameter block, one variant per opcode.
#[derive(Debug)]
pub enum Call<'a> {
    StartUndi(StartUndi),
    UndiStartup,
    UndiCleanup,
    UndiInitialize(UndiInitialize),
    UndiResetAdapter(UndiResetAdapter<'a>),
    UndiShutdown,
    UndiOpen(UndiOpen<'a>),
    UndiClose,
    UndiTransmit(UndiTransmit<'a>),
    UndiSetMcastAddress(UndiSetMcastAddress<'a>),
    UndiSetStationAddress(UndiSetStationAddress),
    UndiSetPacketFilter(UndiSetPacketFilter),
    UndiGetInformation(UndiGetInformation),
    UndiGetStatistics(UndiGetStatistics),
    UndiClearStatistics,
    UndiInitiateDiags,
    UndiForceInterrupt,
    UndiGetMcastAddress(UndiGetMcastAddress),
    UndiGetNicType(UndiGetNicType),
    UndiGetIfaceInfo(UndiGetIfaceInfo),
    UndiIsr(UndiIsr<'a>),
    StopUndi,
    TftpOpen(TftpOpen<'a>),
    TftpClose,
    TftpRead(TftpRead<'a>),
    TftpReadFile(TftpReadFile<'a>),
    TftpGetFsize(TftpGetFsize<'a>),
    UdpOpen(UdpOpen),
    UdpClose,
    UdpRead(UdpRead<'a>),
    UdpWrite(UdpWrite<'a>),
    UnloadStack,
    GetCachedInfo(GetCachedInfo<'a>),
    RestartTftp(TftpReadFile<'a>),
    StartBase,
    StopBase,
}

// ═══════════════════════════════════════════════════════════════════════════
// UNDI
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct StartUndi {
    /// PCI bus/device/function of the adapter to use, or `NO_DEVICE`.
    pub pci_bus_dev_func: u16,
}

impl StartUndi {
    pub const NO_DEVICE: u16 = 0xFFFF;
}

impl Default for StartUndi {
    fn default() -> Self {
        Self {
            pci_bus_dev_func: Self::NO_DEVICE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiInitialize {
    /// Protocol.ini pointer; ignored, kept for layout parity.
    pub protocol_ini: u32,
}

#[derive(Debug, Default)]
pub struct UndiResetAdapter<'a> {
    pub multicast: &'a [MacAddress],
}

#[derive(Debug, Default)]
pub struct UndiOpen<'a> {
    pub open_flag: u16,
    /// `PacketFilter` bits.
    pub packet_filter: u8,
    pub multicast: &'a [MacAddress],
}

/// Protocol field of UNDI_TRANSMIT and UNDI_ISR.
pub mod protocol {
    /// Frame already carries its media header.
    pub const P_UNKNOWN: u8 = 0;
    pub const P_IP: u8 = 1;
    pub const P_ARP: u8 = 2;
    pub const P_RARP: u8 = 3;
}

#[derive(Debug, Default)]
pub struct UndiTransmit<'a> {
    pub protocol: u8,
    /// `XMT_DESTADDR` or `XMT_BROADCAST`.
    pub xmit_flag: u8,
    pub dest_addr: MacAddress,
    /// Payload, or the whole frame for `P_UNKNOWN`.
    pub frame: &'a [u8],
}

impl UndiTransmit<'_> {
    pub const XMT_DESTADDR: u8 = 0;
    pub const XMT_BROADCAST: u8 = 1;
}

#[derive(Debug, Default)]
pub struct UndiSetMcastAddress<'a> {
    pub multicast: &'a [MacAddress],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiSetStationAddress {
    pub station_address: MacAddress,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiSetPacketFilter {
    pub filter: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndiGetInformation {
    pub base_io: u16,
    pub int_number: u16,
    pub max_tran_unit: u16,
    pub hw_type: u16,
    pub hw_addr_len: u16,
    pub current_node_address: MacAddress,
    pub permanent_node_address: MacAddress,
    pub rom_address: u16,
    pub rx_buf_ct: u16,
    pub tx_buf_ct: u16,
}

impl UndiGetInformation {
    /// ARP hardware type for Ethernet.
    pub const ETHER_TYPE: u16 = 1;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndiGetStatistics {
    pub xmt_good_frames: u32,
    pub rcv_good_frames: u32,
    pub rcv_crc_errors: u32,
    pub rcv_resource_errors: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiGetMcastAddress {
    pub ip: [u8; 4],
    pub media_addr: MacAddress,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiGetNicType {
    pub nic_type: u8,
    pub pci: PciIdentity,
}

impl UndiGetNicType {
    pub const PCI_NIC: u8 = 2;
}

bitflags! {
    /// Service flags of UNDI_GET_IFACE_INFO.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ServiceFlags: u32 {
        const BROADCAST = 0x0001;
        const MULTICAST = 0x0002;
        const SET_STATION_ADDRESS = 0x0004;
        const RESET = 0x0008;
        const OPEN_CLOSE = 0x0010;
        const IRQ = 0x0020;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UndiGetIfaceInfo {
    /// NUL-padded interface type name.
    pub if_name: [u8; 16],
    pub link_speed: u32,
    pub service_flags: ServiceFlags,
}

/// UNDI_ISR parameter block.
#[derive(Debug, Default)]
pub struct UndiIsr<'a> {
    /// In: `START`, `PROCESS` or `GET_NEXT`. Out: one of the `OUT_*` values.
    pub func_flag: u16,
    /// Bytes copied into `frame`.
    pub buffer_length: u16,
    /// Length of the received frame on the wire.
    pub frame_length: u16,
    pub frame_header_length: u16,
    pub frame: &'a mut [u8],
    pub prot_type: u8,
    pub pkt_type: u8,
}

impl UndiIsr<'_> {
    pub const START: u16 = 1;
    pub const PROCESS: u16 = 2;
    pub const GET_NEXT: u16 = 3;

    pub const OUT_OURS: u16 = 0;
    pub const OUT_NOT_OURS: u16 = 1;
    pub const OUT_DONE: u16 = 0;
    pub const OUT_TRANSMIT: u16 = 2;
    pub const OUT_RECEIVE: u16 = 3;
    pub const OUT_BUSY: u16 = 4;

    pub const P_DIRECTED: u8 = 0;
    pub const P_BROADCAST: u8 = 1;
    pub const P_MULTICAST: u8 = 2;
    pub const P_PROMISCUOUS: u8 = 3;
}

// ═══════════════════════════════════════════════════════════════════════════
// TFTP / UDP
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct TftpOpen<'a> {
    pub server_ip: [u8; 4],
    pub gateway_ip: [u8; 4],
    pub filename: &'a [u8],
    pub tftp_port: u16,
    /// In: requested block size. Out: negotiated block size.
    pub packet_size: u16,
}

#[derive(Debug, Default)]
pub struct TftpRead<'a> {
    pub packet_number: u16,
    pub buffer_size: u16,
    pub buffer: &'a mut [u8],
}

/// Parameters of TFTP_READ_FILE, also used by RESTART_TFTP.
#[derive(Debug, Default)]
pub struct TftpReadFile<'a> {
    pub filename: &'a [u8],
    pub server_ip: [u8; 4],
    pub gateway_ip: [u8; 4],
    pub buffer: &'a mut [u8],
    /// Out: bytes read.
    pub buffer_size: u32,
}

#[derive(Debug, Default)]
pub struct TftpGetFsize<'a> {
    pub server_ip: [u8; 4],
    pub gateway_ip: [u8; 4],
    pub filename: &'a [u8],
    pub file_size: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UdpOpen {
    /// Our address; zero means "use the one from the cached DHCPACK".
    pub src_ip: [u8; 4],
}

#[derive(Debug, Default)]
pub struct UdpRead<'a> {
    pub src_ip: [u8; 4],
    pub dest_ip: [u8; 4],
    pub s_port: u16,
    /// In: local port to read (0 = any). Out: port the datagram arrived on.
    pub d_port: u16,
    pub buffer_size: u16,
    pub buffer: &'a mut [u8],
}

#[derive(Debug, Default)]
pub struct UdpWrite<'a> {
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    /// Zero means the default source port (2069).
    pub src_port: u16,
    pub dst_port: u16,
    pub buffer: &'a [u8],
}

#[derive(Debug, Default)]
pub struct GetCachedInfo<'a> {
    pub packet_type: u16,
    /// Out: bytes copied.
    pub buffer_size: u16,
    pub buffer: &'a mut [u8],
    /// Out: full size of the cached packet.
    pub buffer_limit: u16,
}

impl GetCachedInfo<'_> {
    pub const DHCP_DISCOVER: u16 = 1;
    pub const DHCP_ACK: u16 = 2;
    pub const CACHED_REPLY: u16 = 3;
}
