//! PXE API opcodes.
//!
//! The set is fixed by PXE 2.1, so this is a closed enum and
//! the opcode table is an exhaustive match. Adding a variant without a
//! handler does not compile.

use crate::api::PxeApi;
use crate::envelope::Envelope;
use crate::handlers::{cached, isr, lifecycle, tftp, udp, undi};
use crate::status::ExitCode;

/// Handler signature shared by every opcode.
pub type Handler = fn(&mut PxeApi, &mut Envelope<'_>) -> ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    StartUndi = 0x0000,
    UndiStartup = 0x0001,
    UndiCleanup = 0x0002,
    UndiInitialize = 0x0003,
    UndiResetAdapter = 0x0004,
    UndiShutdown = 0x0005,
    UndiOpen = 0x0006,
    UndiClose = 0x0007,
    UndiTransmit = 0x0008,
    UndiSetMcastAddress = 0x0009,
    UndiSetStationAddress = 0x000A,
    UndiSetPacketFilter = 0x000B,
    UndiGetInformation = 0x000C,
    UndiGetStatistics = 0x000D,
    UndiClearStatistics = 0x000E,
    UndiInitiateDiags = 0x000F,
    UndiForceInterrupt = 0x0010,
    UndiGetMcastAddress = 0x0011,
    UndiGetNicType = 0x0012,
    UndiGetIfaceInfo = 0x0013,
    UndiIsr = 0x0014,
    StopUndi = 0x0015,
    TftpOpen = 0x0020,
    TftpClose = 0x0021,
    TftpRead = 0x0022,
    TftpReadFile = 0x0023,
    TftpGetFsize = 0x0025,
    UdpOpen = 0x0030,
    UdpClose = 0x0031,
    UdpRead = 0x0032,
    UdpWrite = 0x0033,
    UnloadStack = 0x0070,
    GetCachedInfo = 0x0071,
    RestartTftp = 0x0073,
    StartBase = 0x0075,
    StopBase = 0x0076,
}

impl Opcode {
    pub const ALL: [Opcode; 36] = [
        Opcode::StartUndi,
        Opcode::UndiStartup,
        Opcode::UndiCleanup,
        Opcode::UndiInitialize,
        Opcode::UndiResetAdapter,
        Opcode::UndiShutdown,
        Opcode::UndiOpen,
        Opcode::UndiClose,
        Opcode::UndiTransmit,
        Opcode::UndiSetMcastAddress,
        Opcode::UndiSetStationAddress,
        Opcode::UndiSetPacketFilter,
        Opcode::UndiGetInformation,
        Opcode::UndiGetStatistics,
        Opcode::UndiClearStatistics,
        Opcode::UndiInitiateDiags,
        Opcode::UndiForceInterrupt,
        Opcode::UndiGetMcastAddress,
        Opcode::UndiGetNicType,
        Opcode::UndiGetIfaceInfo,
        Opcode::UndiIsr,
        Opcode::StopUndi,
        Opcode::TftpOpen,
        Opcode::TftpClose,
        Opcode::TftpRead,
        Opcode::TftpReadFile,
        Opcode::TftpGetFsize,
        Opcode::UdpOpen,
        Opcode::UdpClose,
        Opcode::UdpRead,
        Opcode::UdpWrite,
        Opcode::UnloadStack,
        Opcode::GetCachedInfo,
        Opcode::RestartTftp,
        Opcode::StartBase,
        Opcode::StopBase,
    ];

    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u16 == raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self as u16
    }

    /// Name used in trace output.
    pub const fn name(self) -> &'static str {
        match self {
            Opcode::StartUndi => "PXENV_START_UNDI",
            Opcode::UndiStartup => "PXENV_UNDI_STARTUP",
            Opcode::UndiCleanup => "PXENV_UNDI_CLEANUP",
            Opcode::UndiInitialize => "PXENV_UNDI_INITIALIZE",
            Opcode::UndiResetAdapter => "PXENV_UNDI_RESET_ADAPTER",
            Opcode::UndiShutdown => "PXENV_UNDI_SHUTDOWN",
            Opcode::UndiOpen => "PXENV_UNDI_OPEN",
            Opcode::UndiClose => "PXENV_UNDI_CLOSE",
            Opcode::UndiTransmit => "PXENV_UNDI_TRANSMIT",
            Opcode::UndiSetMcastAddress => "PXENV_UNDI_SET_MCAST_ADDRESS",
            Opcode::UndiSetStationAddress => "PXENV_UNDI_SET_STATION_ADDRESS",
            Opcode::UndiSetPacketFilter => "PXENV_UNDI_SET_PACKET_FILTER",
            Opcode::UndiGetInformation => "PXENV_UNDI_GET_INFORMATION",
            Opcode::UndiGetStatistics => "PXENV_UNDI_GET_STATISTICS",
            Opcode::UndiClearStatistics => "PXENV_UNDI_CLEAR_STATISTICS",
            Opcode::UndiInitiateDiags => "PXENV_UNDI_INITIATE_DIAGS",
            Opcode::UndiForceInterrupt => "PXENV_UNDI_FORCE_INTERRUPT",
            Opcode::UndiGetMcastAddress => "PXENV_UNDI_GET_MCAST_ADDRESS",
            Opcode::UndiGetNicType => "PXENV_UNDI_GET_NIC_TYPE",
            Opcode::UndiGetIfaceInfo => "PXENV_UNDI_GET_IFACE_INFO",
            Opcode::UndiIsr => "PXENV_UNDI_ISR",
            Opcode::StopUndi => "PXENV_STOP_UNDI",
            Opcode::TftpOpen => "PXENV_TFTP_OPEN",
            Opcode::TftpClose => "PXENV_TFTP_CLOSE",
            Opcode::TftpRead => "PXENV_TFTP_READ",
            Opcode::TftpReadFile => "PXENV_TFTP_READ_FILE",
            Opcode::TftpGetFsize => "PXENV_TFTP_GET_FSIZE",
            Opcode::UdpOpen => "PXENV_UDP_OPEN",
            Opcode::UdpClose => "PXENV_UDP_CLOSE",
            Opcode::UdpRead => "PXENV_UDP_READ",
            Opcode::UdpWrite => "PXENV_UDP_WRITE",
            Opcode::UnloadStack => "PXENV_UNLOAD_STACK",
            Opcode::GetCachedInfo => "PXENV_GET_CACHED_INFO",
            Opcode::RestartTftp => "PXENV_RESTART_TFTP",
            Opcode::StartBase => "PXENV_START_BASE",
            Opcode::StopBase => "PXENV_STOP_BASE",
        }
    }

    /// The opcode table.
    pub fn handler(self) -> Handler {
        match self {
            Opcode::StartUndi => lifecycle::start_undi,
            Opcode::UndiStartup => lifecycle::undi_startup,
            Opcode::UndiCleanup => lifecycle::undi_cleanup,
            Opcode::UndiInitialize => lifecycle::undi_initialize,
            Opcode::UndiResetAdapter => lifecycle::undi_reset_adapter,
            Opcode::UndiShutdown => lifecycle::undi_shutdown,
            Opcode::UndiOpen => undi::undi_open,
            Opcode::UndiClose => undi::undi_close,
            Opcode::UndiTransmit => undi::undi_transmit,
            Opcode::UndiSetMcastAddress => undi::undi_set_mcast_address,
            Opcode::UndiSetStationAddress => undi::undi_set_station_address,
            Opcode::UndiSetPacketFilter => undi::undi_set_packet_filter,
            Opcode::UndiGetInformation => undi::undi_get_information,
            Opcode::UndiGetStatistics => undi::undi_get_statistics,
            Opcode::UndiClearStatistics => undi::undi_clear_statistics,
            Opcode::UndiInitiateDiags => undi::undi_initiate_diags,
            Opcode::UndiForceInterrupt => undi::undi_force_interrupt,
            Opcode::UndiGetMcastAddress => undi::undi_get_mcast_address,
            Opcode::UndiGetNicType => undi::undi_get_nic_type,
            Opcode::UndiGetIfaceInfo => undi::undi_get_iface_info,
            Opcode::UndiIsr => isr::undi_isr,
            Opcode::StopUndi => lifecycle::stop_undi,
            Opcode::TftpOpen => tftp::tftp_open,
            Opcode::TftpClose => tftp::tftp_close,
            Opcode::TftpRead => tftp::tftp_read,
            Opcode::TftpReadFile => tftp::tftp_read_file,
            Opcode::TftpGetFsize => tftp::tftp_get_fsize,
            Opcode::UdpOpen => udp::udp_open,
            Opcode::UdpClose => udp::udp_close,
            Opcode::UdpRead => udp::udp_read,
            Opcode::UdpWrite => udp::udp_write,
            Opcode::UnloadStack => lifecycle::unload_stack,
            Opcode::GetCachedInfo => cached::get_cached_info,
            Opcode::RestartTftp => tftp::restart_tftp,
            Opcode::StartBase => lifecycle::start_base,
            Opcode::StopBase => lifecycle::stop_base,
        }
    }
}
