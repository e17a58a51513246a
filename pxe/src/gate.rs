//! Interrupt gate.
//!
//! While the stack is at least `Midway` we own two real-mode vectors:
//!
//! - INT 1Ah: PXE installation check and API entry
//! - INT 15h: memory map filtering, so callers do not hand out our base
//!   memory while we are resident
//!
//! `InterruptGate` is the seam the lifecycle code drives. `IvtGate` is the
//! concrete implementation that patches the IVT through `RealModeMemory`
//! and remembers the previous handlers for chaining.

use thiserror::Error;

use crate::config::VectorEntries;

/// IVT base (linear).
pub const IVT_BASE: u32 = 0x0000;

pub const INT_15: u8 = 0x15;
pub const INT_1A: u8 = 0x1A;

/// AX value of the PXE installation check ("PV").
pub const PXE_INSTALL_CHECK: u16 = 0x5650;
/// AX value answering the installation check ("PN").
pub const PXE_INSTALL_ANSWER: u16 = 0x564E;

// ═══════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Real-mode segment:offset pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FarPtr {
    pub segment: u16,
    pub offset: u16,
}

impl FarPtr {
    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    /// Decode an IVT entry (offset in the low word).
    pub const fn from_dword(raw: u32) -> Self {
        Self {
            segment: (raw >> 16) as u16,
            offset: raw as u16,
        }
    }

    pub const fn to_dword(self) -> u32 {
        ((self.segment as u32) << 16) | self.offset as u32
    }

    pub const fn linear(self) -> u32 {
        ((self.segment as u32) << 4) + self.offset as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("INT {0:#04x} was re-hooked by another program")]
    VectorStolen(u8),
    #[error("interrupt gate unavailable")]
    Unavailable,
}

/// Ownership of the vectors the stack depends on.
///
/// Both operations are idempotent: hooking a hooked gate or unhooking an
/// unhooked one succeeds without touching anything.
pub trait InterruptGate: Send {
    fn hook(&mut self) -> Result<(), GateError>;

    fn unhook(&mut self) -> Result<(), GateError>;

    fn is_hooked(&self) -> bool;
}

/// Dword access to the first megabyte.
pub trait RealModeMemory: Send {
    fn read_u32(&self, addr: u32) -> u32;

    fn write_u32(&mut self, addr: u32, value: u32);
}

/// Identity-mapped low memory, accessed with volatile loads and stores.
pub struct LowMemory {
    base: *mut u8,
}

impl LowMemory {
    /// # Safety
    /// `base` must map linear address 0 for at least the IVT, writable, for
    /// as long as this value lives.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

// The mapping is global and not tied to any thread.
unsafe impl Send for LowMemory {}

impl RealModeMemory for LowMemory {
    fn read_u32(&self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(self.base.add(addr as usize) as *const u32) }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(self.base.add(addr as usize) as *mut u32, value) }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IVT GATE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Vector {
    number: u8,
    entry: FarPtr,
    /// Handler we displaced; `Some` while hooked.
    chained: Option<FarPtr>,
}

impl Vector {
    fn slot(&self) -> u32 {
        IVT_BASE + u32::from(self.number) * 4
    }
}

/// Gate that patches INT 1Ah and INT 15h in the real-mode IVT.
pub struct IvtGate<M: RealModeMemory> {
    memory: M,
    vectors: [Vector; 2],
}

impl<M: RealModeMemory> IvtGate<M> {
    pub fn new(memory: M, entries: VectorEntries) -> Self {
        Self {
            memory,
            vectors: [
                Vector { number: INT_1A, entry: entries.int1a, chained: None },
                Vector { number: INT_15, entry: entries.int15, chained: None },
            ],
        }
    }

    /// Previous handler for `number`, for chaining calls we do not answer.
    pub fn chained(&self, number: u8) -> Option<FarPtr> {
        self.vectors.iter().find(|v| v.number == number).and_then(|v| v.chained)
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}

impl<M: RealModeMemory> InterruptGate for IvtGate<M> {
    fn hook(&mut self) -> Result<(), GateError> {
        for vector in self.vectors.iter_mut() {
            if vector.chained.is_some() {
                continue;
            }
            let previous = FarPtr::from_dword(self.memory.read_u32(vector.slot()));
            // Single dword store: the vector is never half-written.
            self.memory.write_u32(vector.slot(), vector.entry.to_dword());
            vector.chained = Some(previous);
            log::debug!(
                "gate: INT {:02x} -> {:04x}:{:04x} (was {:04x}:{:04x})",
                vector.number,
                vector.entry.segment,
                vector.entry.offset,
                previous.segment,
                previous.offset
            );
        }
        Ok(())
    }

    fn unhook(&mut self) -> Result<(), GateError> {
        // Refuse before touching anything if someone chained on top of us.
        for vector in self.vectors.iter().filter(|v| v.chained.is_some()) {
            if self.memory.read_u32(vector.slot()) != vector.entry.to_dword() {
                log::warn!("gate: INT {:02x} no longer ours, leaving hooked", vector.number);
                return Err(GateError::VectorStolen(vector.number));
            }
        }
        for vector in self.vectors.iter_mut() {
            if let Some(previous) = vector.chained.take() {
                self.memory.write_u32(vector.slot(), previous.to_dword());
                log::debug!("gate: INT {:02x} restored", vector.number);
            }
        }
        Ok(())
    }

    fn is_hooked(&self) -> bool {
        self.vectors.iter().all(|v| v.chained.is_some())
    }
}

/// Register result of an INT 1Ah call we answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallCheck {
    pub ax: u16,
    pub carry: bool,
}

/// Answer the PXE installation check. `None` means chain to the old handler.
pub fn int1a_installation_check(ax: u16) -> Option<InstallCheck> {
    (ax == PXE_INSTALL_CHECK).then_some(InstallCheck {
        ax: PXE_INSTALL_ANSWER,
        carry: false,
    })
}
