//! NIC binding policy.
//!
//! Decides which adapter backs the PXE stack when the lifecycle needs a NIC
//! and none is bound yet. Probing itself is platform init's job; the binder
//! only chooses among adapters that were already discovered.
//!
//! Policy, in order:
//! 1. The device the boot program named through START_UNDI, if any.
//! 2. Otherwise the first available candidate.
//!
//! Reusing an already bound adapter is the caller's decision and never
//! reaches the binder.

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

use thiserror::Error;

use crate::driver::NicControl;

/// PCI bus/device/function of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciLocation {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciLocation {
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device: device & 0x1F,
            function: function & 0x07,
        }
    }

    /// Decode the packed `bus << 8 | dev << 3 | fn` form used by START_UNDI.
    pub const fn from_packed(packed: u16) -> Self {
        Self::new((packed >> 8) as u8, ((packed >> 3) & 0x1F) as u8, (packed & 0x07) as u8)
    }

    pub const fn packed(&self) -> u16 {
        ((self.bus as u16) << 8) | ((self.device as u16) << 3) | self.function as u16
    }
}

/// Boxed adapter owned by the PXE stack.
pub type BoxedNic = Box<dyn NicControl + Send>;

/// An adapter handed out by a binder.
pub struct BoundNic {
    pub nic: BoxedNic,
    pub location: Option<PciLocation>,
}

/// Binding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("no network adapter available")]
    NoDevice,
    #[error("no adapter at PCI {0:?}")]
    NotFound(PciLocation),
}

/// Source of adapters for the PXE stack.
pub trait NicBinder: Send {
    /// Hand out an adapter, preferring `requested` when given.
    fn bind(&mut self, requested: Option<PciLocation>) -> Result<BoundNic, BindError>;

    /// Take back an adapter the stack no longer wants.
    fn release(&mut self, nic: BoundNic);
}

/// Binder over adapters handed over by platform init.
#[derive(Default)]
pub struct HandoffBinder {
    candidates: Vec<BoundNic>,
}

impl HandoffBinder {
    pub fn new() -> Self {
        Self { candidates: Vec::new() }
    }

    /// Register a discovered adapter.
    pub fn add(&mut self, nic: BoxedNic, location: Option<PciLocation>) {
        self.candidates.push(BoundNic { nic, location });
    }

    pub fn available(&self) -> usize {
        self.candidates.len()
    }
}

impl NicBinder for HandoffBinder {
    fn bind(&mut self, requested: Option<PciLocation>) -> Result<BoundNic, BindError> {
        let idx = match requested {
            Some(loc) => self
                .candidates
                .iter()
                .position(|c| c.location == Some(loc))
                .ok_or(BindError::NotFound(loc))?,
            None if self.candidates.is_empty() => return Err(BindError::NoDevice),
            None => 0,
        };
        log::debug!("binder: handing out adapter {:?}", self.candidates[idx].location);
        Ok(self.candidates.remove(idx))
    }

    fn release(&mut self, nic: BoundNic) {
        self.candidates.push(nic);
    }
}
