//! Lifecycle state.
//!
//! The stack is always in one of three states, ordered so handlers can ask
//! for "at least" a state:
//!
//! | state       | vectors hooked | NIC up |
//! |-------------|----------------|--------|
//! | `CanUnload` | no             | no     |
//! | `Midway`    | yes            | no     |
//! | `Ready`     | yes            | yes    |
//!
//! The NIC is never up with the vectors unhooked. The value is shared with
//! the interrupt path, so it lives in an atomic and is only ever written by
//! the reconcile step in `stack.rs`.

extern crate alloc;
use alloc::sync::Arc;

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the PXE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// Vectors not hooked, NIC down. Safe to free everything.
    CanUnload = 0,
    /// Vectors hooked, NIC down.
    Midway = 1,
    /// Vectors hooked, NIC up.
    Ready = 2,
}

impl LifecycleState {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::CanUnload),
            1 => Some(Self::Midway),
            2 => Some(Self::Ready),
            _ => None,
        }
    }

    #[inline]
    pub const fn vectors_hooked(self) -> bool {
        !matches!(self, Self::CanUnload)
    }

    #[inline]
    pub const fn nic_up(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CanUnload => "CAN_UNLOAD",
            Self::Midway => "MIDWAY",
            Self::Ready => "READY",
        };
        f.write_str(name)
    }
}

/// Atomic home of the lifecycle state.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::CanUnload as u8))
    }

    #[inline]
    pub fn load(&self) -> LifecycleState {
        // Only `publish` writes the cell, so the raw value is always valid.
        LifecycleState::from_raw(self.0.load(Ordering::Acquire)).unwrap_or(LifecycleState::CanUnload)
    }

    #[inline]
    pub(crate) fn publish(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the state for the interrupt path.
#[derive(Debug, Clone)]
pub struct StateObserver(Arc<StateCell>);

impl StateObserver {
    pub(crate) fn new(cell: Arc<StateCell>) -> Self {
        Self(cell)
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.0.load()
    }

    /// Whether a NIC interrupt can belong to us right now.
    #[inline]
    pub fn nic_active(&self) -> bool {
        self.state().nic_up()
    }
}
