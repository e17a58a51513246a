//! PXE status and exit codes.
//!
//! Every call reports twice: a `Status` written into the envelope and an
//! `ExitCode` returned from the entry point. Both are plain 16-bit values on
//! the wire, so both are transparent newtypes rather than enums; a caller
//! can hand us anything and we must be able to echo it back.

use core::fmt;

use morpheus_undi::{BindError, NicError, TxError, UdpError};

use crate::gate::GateError;
use crate::stack::StateError;

/// Value of the envelope's status field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Status(pub u16);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    /// Generic failure; preset before every handler runs.
    pub const FAILURE: Status = Status(0x01);
    pub const BAD_FUNC: Status = Status(0x02);
    pub const UNSUPPORTED: Status = Status(0x03);
    pub const KEEP_UNDI: Status = Status(0x04);
    pub const KEEP_ALL: Status = Status(0x05);
    pub const OUT_OF_RESOURCES: Status = Status(0x06);

    pub const ARP_TIMEOUT: Status = Status(0x11);
    pub const UDP_CLOSED: Status = Status(0x18);
    pub const UDP_OPEN: Status = Status(0x19);
    pub const TFTP_CLOSED: Status = Status(0x1A);
    pub const TFTP_OPEN: Status = Status(0x1B);
    pub const TFTP_CANNOT_OPEN_CONNECTION: Status = Status(0x38);
    pub const TFTP_FILE_NOT_FOUND: Status = Status(0x3B);

    pub const UNDI_INVALID_STATE: Status = Status(0x6A);
    pub const UNDI_TRANSMIT_ERROR: Status = Status(0x6B);
    pub const UNDI_INVALID_PARAMETER: Status = Status(0x6C);

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::FAILURE
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({:#04x})", self.0)
    }
}

impl fmt::LowerHex for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Value returned in AX from a PXE call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ExitCode(pub u16);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// `SUCCESS` or `FAILURE`; anything else is a handler bug.
    #[inline]
    pub const fn is_canonical(self) -> bool {
        self.0 == Self::SUCCESS.0 || self.0 == Self::FAILURE.0
    }
}

impl From<bool> for ExitCode {
    fn from(ok: bool) -> Self {
        if ok {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR MAPPING
// ═══════════════════════════════════════════════════════════════════════════

impl From<StateError> for Status {
    fn from(_: StateError) -> Self {
        Status::UNDI_INVALID_STATE
    }
}

impl From<GateError> for Status {
    fn from(_: GateError) -> Self {
        Status::FAILURE
    }
}

impl From<BindError> for Status {
    fn from(_: BindError) -> Self {
        Status::UNDI_INVALID_STATE
    }
}

impl From<NicError> for Status {
    fn from(err: NicError) -> Self {
        match err {
            NicError::Unsupported => Status::UNSUPPORTED,
            NicError::InvalidMac => Status::UNDI_INVALID_PARAMETER,
            NicError::NotReady => Status::UNDI_INVALID_STATE,
            NicError::ResetTimeout | NicError::PhyNotAccessible => Status::FAILURE,
        }
    }
}

impl From<TxError> for Status {
    fn from(err: TxError) -> Self {
        match err {
            TxError::FrameTooLarge { .. } => Status::UNDI_INVALID_PARAMETER,
            TxError::QueueFull | TxError::NotReady => Status::UNDI_TRANSMIT_ERROR,
        }
    }
}

impl From<UdpError> for Status {
    fn from(err: UdpError) -> Self {
        match err {
            UdpError::ArpTimeout => Status::ARP_TIMEOUT,
            UdpError::TooLarge(_) | UdpError::QueueFull => Status::OUT_OF_RESOURCES,
            UdpError::Bind(_) | UdpError::Receive => Status::FAILURE,
        }
    }
}
