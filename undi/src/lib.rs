//! MorpheusX UNDI layer.
//!
//! Everything the PXE API core needs from the network adapter side:
//!
//! - `driver` - `NetworkDriver` data path and `NicControl` adapter control
//! - `types` - Ethernet constants and header classification
//! - `filter` - receive filter flags, multicast list, IPv4 multicast mapping
//! - `binder` - NIC binding policy (which adapter backs the stack)
//! - `adapter` - smoltcp `Device` adapter over any `NetworkDriver`
//! - `udp` - UDP endpoint used by the PXE UDP calls
//! - `time` - TSC-based timing
//! - `serial` - COM1 `log` backend
//!
//! # What This Crate Does NOT Do
//!
//! - Register-level driver programming (drivers implement the traits)
//! - PXE lifecycle arbitration (see `morpheus-pxe`)

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod adapter;
pub mod binder;
pub mod driver;
pub mod filter;
pub mod serial;
pub mod time;
pub mod types;
pub mod udp;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::SmoltcpAdapter;
pub use binder::{BindError, HandoffBinder, NicBinder, PciLocation};
pub use driver::{NetworkDriver, NicControl, NicError, NicInfo, PciIdentity, RxError, TxError};
pub use filter::{multicast_mac_for, MulticastList, PacketFilter, MAX_MCAST_ADDRESSES};
pub use types::{MacAddress, BROADCAST_MAC, ETH_ALEN, ETH_HLEN, ETH_MTU};
pub use udp::{UdpConfig, UdpDatagram, UdpEndpoint, UdpError};
