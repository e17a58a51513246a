//! MorpheusX PXE API provider core.
//!
//! Boot programs loaded over the network call back into the firmware
//! through the PXE API. The calls may arrive in almost any order, so this
//! crate arbitrates: every call names the lifecycle state it needs, and the
//! stack moves the NIC and our two interrupt vectors there in a fixed,
//! recoverable order.
//!
//! - `state` - lifecycle states and the atomic cell the interrupt path reads
//! - `stack` - `PxeStack`, its session state and `reconcile`
//! - `gate` - INT 1Ah / INT 15h ownership in the real-mode IVT
//! - `api` - call dispatch and the firmware-wide entry point
//! - `envelope` - per-call parameter blocks
//! - `opcode` - the opcode table
//! - `status` - PXE status and exit codes
//! - `tftp` - the TFTP client seam
//! - `config` - stack configuration
//!
//! # What This Crate Does NOT Do
//!
//! - Real-mode thunking (the resident stub translates parameter blocks)
//! - NIC register programming (see `morpheus-undi` driver traits)
//! - TFTP, UDP or DHCP wire formats

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod api;
pub mod config;
pub mod envelope;
pub mod gate;
mod handlers;
pub mod opcode;
pub mod stack;
pub mod state;
pub mod status;
pub mod tftp;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{install, pxe_api_call, state_observer, unload, PxeApi, UnloadError};
pub use config::{StackConfig, VectorEntries};
pub use envelope::{Call, Envelope};
pub use gate::{FarPtr, GateError, InterruptGate, IvtGate, LowMemory, RealModeMemory};
pub use opcode::Opcode;
pub use stack::{CachedPacket, PxeStack, StateError, Statistics, MAX_CACHED_PACKET};
pub use state::{LifecycleState, StateObserver};
pub use status::{ExitCode, Status};
pub use tftp::{TftpBlock, TftpClient, TftpRequest};
