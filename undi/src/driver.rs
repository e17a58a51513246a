//! Driver abstraction for the PXE provider.
//!
//! # Contract
//!
//! - `NetworkDriver` is the data path: frames in, frames out. It is the
//!   same surface the smoltcp adapter consumes.
//! - `NicControl` adds what the UNDI API needs on top: bring-up/shutdown,
//!   interrupt source control, station address and receive filters.
//!
//! Drivers are handed over already probed (PCI enumeration and BAR mapping
//! happen in platform init). `bring_up` must leave the interrupt source
//! MASKED; the caller decides when to unmask it.
//!
//! Both operations are idempotent from the caller's point of view: the PXE
//! lifecycle code only calls them on real transitions, but a driver must
//! tolerate a repeated `shutdown`.

use thiserror::Error;

use crate::filter::{MulticastList, PacketFilter};
use crate::types::MacAddress;

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// Transmit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("transmit queue full")]
    QueueFull,
    #[error("frame of {provided} bytes exceeds {max}")]
    FrameTooLarge { provided: usize, max: usize },
    #[error("adapter not initialized")]
    NotReady,
}

/// Receive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RxError {
    #[error("receive buffer of {provided} bytes too small for {needed}")]
    BufferTooSmall { provided: usize, needed: usize },
    #[error("frame failed CRC check")]
    Crc,
    #[error("adapter ran out of receive resources")]
    Resources,
    #[error("adapter not initialized")]
    NotReady,
}

/// Adapter control errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NicError {
    #[error("device reset timed out")]
    ResetTimeout,
    #[error("PHY not accessible")]
    PhyNotAccessible,
    #[error("invalid MAC address")]
    InvalidMac,
    #[error("operation not supported by this adapter")]
    Unsupported,
    #[error("adapter not initialized")]
    NotReady,
}

// ═══════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// PCI identity of an adapter, as reported by UNDI_GET_NIC_TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PciIdentity {
    pub vendor_id: u16,
    pub device_id: u16,
    pub base_class: u8,
    pub sub_class: u8,
    pub prog_intf: u8,
    pub revision: u8,
    /// Bus/device/function packed as `bus << 8 | dev << 3 | fn`.
    pub bus_dev_func: u16,
    pub sub_vendor_id: u16,
    pub sub_device_id: u16,
}

/// Static adapter information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NicInfo {
    /// I/O base (0 for MMIO-only adapters).
    pub base_io: u16,
    /// Legacy IRQ line.
    pub irq: u8,
    /// Burned-in address.
    pub permanent_mac: MacAddress,
    /// Link speed in bits per second.
    pub link_speed: u32,
    /// Whether the adapter can raise interrupts at all.
    pub irq_capable: bool,
    pub pci: Option<PciIdentity>,
}

// ═══════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════

/// Frame-level data path.
pub trait NetworkDriver {
    /// Current station address.
    fn mac_address(&self) -> MacAddress;

    fn can_transmit(&self) -> bool;

    fn can_receive(&self) -> bool;

    /// Queue one complete Ethernet frame (header included, no FCS).
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError>;

    /// Copy the next received frame into `buffer`.
    ///
    /// `Ok(None)` means nothing is pending.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError>;

    fn refill_rx_queue(&mut self) {}

    /// Link state; adapters that cannot tell report up.
    fn link_up(&self) -> bool {
        true
    }
}

/// Adapter control used by the UNDI calls and the PXE lifecycle.
pub trait NicControl: NetworkDriver {
    /// Bring the adapter to an operating state with its interrupt masked.
    fn bring_up(&mut self) -> Result<(), NicError>;

    /// Quiesce the adapter. Must disable the interrupt source first.
    fn shutdown(&mut self) -> Result<(), NicError>;

    /// Mask or unmask the adapter's interrupt source.
    fn set_irq_enabled(&mut self, enabled: bool);

    /// Read-and-acknowledge the interrupt cause register.
    fn irq_pending(&mut self) -> bool;

    /// Raise an interrupt on request of the boot program.
    fn force_interrupt(&mut self) -> Result<(), NicError> {
        Err(NicError::Unsupported)
    }

    fn set_station_address(&mut self, mac: &MacAddress) -> Result<(), NicError>;

    fn set_receive_filter(
        &mut self,
        filter: PacketFilter,
        multicast: &MulticastList,
    ) -> Result<(), NicError>;

    fn info(&self) -> NicInfo;
}
