//! The PXE stack handle and its lifecycle.
//!
//! # Reconcile
//!
//! Every API call first asks for the lifecycle state it needs. `reconcile`
//! moves the stack there from wherever it is, always in this order:
//!
//! 1. `wanted >= Midway`: hook the vectors (every time; hooking is
//!    idempotent)
//! 2. `wanted > Midway`: bring the NIC up; otherwise shut it down
//! 3. `wanted < Midway`: unhook the vectors
//!
//! Vectors go in before the NIC can interrupt and come out only after it
//! cannot. Each step is attempted even when an earlier one failed; the
//! result is the first failure, and the published state is whatever was
//! actually reached. Two guards keep the invariant when a step fails: the
//! NIC is never brought up without the vectors, and the vectors are never
//! released under a live NIC.
//!
//! # Interrupt path
//!
//! The NIC interrupt is masked before bring-up and before shutdown.
//! `Ready` is published only once the NIC is up, `Midway` only once it is
//! down, so an interrupt handler reading the `StateObserver` never sees a
//! half transition.

extern crate alloc;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use thiserror::Error;

use morpheus_undi::binder::{BoxedNic, BoundNic};
use morpheus_undi::{
    BindError, MulticastList, NicBinder, NicError, PacketFilter, PciLocation, UdpEndpoint,
};

use crate::config::StackConfig;
use crate::gate::{GateError, InterruptGate};
use crate::state::{LifecycleState, StateCell, StateObserver};
use crate::tftp::TftpClient;

/// Why the stack could not reach a requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no PXE stack loaded")]
    NoStack,
    #[error("hooking vectors failed: {0}")]
    Hook(GateError),
    #[error("unhooking vectors failed: {0}")]
    Unhook(GateError),
    #[error("NIC bring-up refused: vectors not hooked")]
    VectorsNotHooked,
    #[error("unhook refused: NIC still up")]
    NicStillUp,
    #[error("no NIC to bind: {0}")]
    Bind(BindError),
    #[error("NIC bring-up failed: {0}")]
    BringUp(NicError),
    #[error("NIC shutdown failed: {0}")]
    Shutdown(NicError),
}

/// UNDI statistics counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub xmt_good: u32,
    pub rcv_good: u32,
    pub rcv_crc_errors: u32,
    pub rcv_resource_errors: u32,
}

impl Statistics {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// DHCP packets cached by the boot ROM before the boot program ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedPacket {
    DhcpDiscover,
    DhcpAck,
    CachedReply,
}

impl CachedPacket {
    pub const fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::DhcpDiscover),
            2 => Some(Self::DhcpAck),
            3 => Some(Self::CachedReply),
            _ => None,
        }
    }
}

/// Offset of `yiaddr` in a BOOTP/DHCP packet.
const BOOTP_YIADDR: usize = 16;

#[derive(Debug, Default)]
struct CachedPackets {
    discover: Vec<u8>,
    ack: Vec<u8>,
    reply: Vec<u8>,
}

/// Largest cached packet, bounded by the 16-bit GET_CACHED_INFO sizes.
pub const MAX_CACHED_PACKET: usize = u16::MAX as usize;

/// Per-session state the API calls work on.
pub(crate) struct Session {
    pub filter: PacketFilter,
    pub multicast: MulticastList,
    /// UNDI_OPEN seen since the last UNDI_CLOSE.
    pub opened: bool,
    pub stats: Statistics,
    /// Transmit completions not yet reported through UNDI_ISR.
    pub pending_tx: u8,
    pub udp: Option<UdpEndpoint>,
    pub tftp_open: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            filter: PacketFilter::boot_default(),
            multicast: MulticastList::new(),
            opened: false,
            stats: Statistics::default(),
            pending_tx: 0,
            udp: None,
            tftp_open: false,
        }
    }
}

/// Disjoint mutable views into a `PxeStack`.
pub(crate) struct Parts<'s> {
    pub nic: Option<&'s mut BoxedNic>,
    pub session: &'s mut Session,
    pub tftp: Option<&'s mut (dyn TftpClient + 'static)>,
}

/// The loaded PXE stack.
pub struct PxeStack {
    state: Arc<StateCell>,
    gate: Box<dyn InterruptGate>,
    binder: Box<dyn NicBinder>,
    nic: Option<BoundNic>,
    /// Adapter named by START_UNDI.
    requested: Option<PciLocation>,
    cached: CachedPackets,
    pub(crate) tftp: Option<Box<dyn TftpClient>>,
    pub(crate) session: Session,
    pub(crate) config: StackConfig,
}

impl PxeStack {
    pub fn new(gate: Box<dyn InterruptGate>, binder: Box<dyn NicBinder>, config: StackConfig) -> Self {
        Self {
            state: Arc::new(StateCell::new()),
            gate,
            binder,
            nic: None,
            requested: None,
            cached: CachedPackets::default(),
            tftp: None,
            session: Session::new(),
            config,
        }
    }

    /// Plug in the TFTP client used by the TFTP calls.
    pub fn with_tftp(mut self, client: Box<dyn TftpClient>) -> Self {
        self.tftp = Some(client);
        self
    }

    /// Store a DHCP packet for GET_CACHED_INFO.
    /// Store a DHCP packet for GET_CACHED_INFO.
    ///
    /// Packets are cut to `MAX_CACHED_PACKET`, the largest size the call can report.
    pub fn set_cached_packet(&mut self, kind: CachedPacket, packet: &[u8]) {
        let slot = match kind {
            CachedPacket::DhcpDiscover => &mut self.cached.discover,
            CachedPacket::DhcpAck => &mut self.cached.ack,
            CachedPacket::CachedReply => &mut self.cached.reply,
        };
        let kept = packet.len().min(MAX_CACHED_PACKET);
        if kept < packet.len() {
            log::warn!("pxe: cached {:?} cut from {} to {} bytes", kind, packet.len(), kept);
        }
        slot.clear();
        slot.extend_from_slice(&packet[..kept]);
    }

    pub fn cached_packet(&self, kind: CachedPacket) -> &[u8] {
        match kind {
            CachedPacket::DhcpDiscover => &self.cached.discover,
            CachedPacket::DhcpAck => &self.cached.ack,
            CachedPacket::CachedReply => &self.cached.reply,
        }
    }

    /// Our address according to the cached DHCPACK.
    pub fn client_ip(&self) -> Option<[u8; 4]> {
        let ack = &self.cached.ack;
        let bytes = ack.get(BOOTP_YIADDR..BOOTP_YIADDR + 4)?;
        let ip = [bytes[0], bytes[1], bytes[2], bytes[3]];
        (ip != [0; 4]).then_some(ip)
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    pub fn observer(&self) -> StateObserver {
        StateObserver::new(self.state.clone())
    }

    /// Publish into `cell` from now on. Observers taken earlier stop updating.
    pub(crate) fn adopt_state_cell(&mut self, cell: Arc<StateCell>) {
        cell.publish(self.state());
        self.state = cell;
    }

    pub fn statistics(&self) -> Statistics {
        self.session.stats
    }

    /// The adapter, while bound.
    pub fn nic_mut(&mut self) -> Option<&mut BoxedNic> {
        self.nic.as_mut().map(|bound| &mut bound.nic)
    }

    /// Split borrow for handlers that need the adapter next to session state.
    pub(crate) fn parts(&mut self) -> Parts<'_> {
        Parts {
            nic: self.nic.as_mut().map(|bound| &mut bound.nic),
            session: &mut self.session,
            tftp: self.tftp.as_deref_mut(),
        }
    }

    pub(crate) fn nic_location(&self) -> Option<PciLocation> {
        self.nic.as_ref().and_then(|bound| bound.location)
    }

    pub(crate) fn request_device(&mut self, location: Option<PciLocation>) {
        self.requested = location;
    }

    pub(crate) fn requested_device(&self) -> Option<PciLocation> {
        self.requested
    }

    /// Whether the NIC interrupt should be live while we are `Ready`.
    pub(crate) fn irq_wanted(&self) -> bool {
        self.session.opened
            && self
                .nic
                .as_ref()
                .map_or(false, |bound| bound.nic.info().irq_capable)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RECONCILE
    // ═══════════════════════════════════════════════════════════════════════

    /// Drive the stack to `wanted`.
    pub fn reconcile(&mut self, wanted: LifecycleState) -> Result<(), StateError> {
        let mut result = Ok(());
        if wanted >= LifecycleState::Midway {
            result = result.and(self.hook_vectors());
        }
        if wanted > LifecycleState::Midway {
            result = result.and(self.bring_up_nic());
        } else {
            result = result.and(self.shut_down_nic());
        }
        if wanted < LifecycleState::Midway {
            result = result.and(self.unhook_vectors());
        }

        if let Err(err) = result {
            log::debug!("reconcile {} stopped at {}: {}", wanted, self.state(), err);
        }
        result
    }

    fn hook_vectors(&mut self) -> Result<(), StateError> {
        self.gate.hook().map_err(StateError::Hook)?;
        if self.state() == LifecycleState::CanUnload {
            self.state.publish(LifecycleState::Midway);
        }
        Ok(())
    }

    fn bring_up_nic(&mut self) -> Result<(), StateError> {
        if self.state() >= LifecycleState::Ready {
            return Ok(());
        }
        if self.state() < LifecycleState::Midway || !self.gate.is_hooked() {
            return Err(StateError::VectorsNotHooked);
        }

        // START_UNDI may have named a different adapter since we last bound.
        let stale = match (self.requested, &self.nic) {
            (Some(wanted), Some(bound)) => bound.location != Some(wanted),
            _ => false,
        };
        if stale {
            if let Some(old) = self.nic.take() {
                log::debug!("nic: releasing {:?} for {:?}", old.location, self.requested);
                self.binder.release(old);
            }
        }
        if self.nic.is_none() {
            let bound = self.binder.bind(self.requested).map_err(StateError::Bind)?;
            self.nic = Some(bound);
        }
        let Some(bound) = self.nic.as_mut() else {
            return Err(StateError::Bind(BindError::NoDevice));
        };

        bound.nic.set_irq_enabled(false);
        bound.nic.bring_up().map_err(StateError::BringUp)?;
        if let Err(err) = bound
            .nic
            .set_receive_filter(self.session.filter, &self.session.multicast)
        {
            log::warn!("nic: receive filter not restored: {}", err);
        }
        self.state.publish(LifecycleState::Ready);

        if self.irq_wanted() {
            if let Some(bound) = self.nic.as_mut() {
                bound.nic.set_irq_enabled(true);
            }
        }
        log::debug!("nic: up");
        Ok(())
    }

    fn shut_down_nic(&mut self) -> Result<(), StateError> {
        if self.state() <= LifecycleState::Midway {
            return Ok(());
        }
        if let Some(bound) = self.nic.as_mut() {
            bound.nic.set_irq_enabled(false);
            bound.nic.shutdown().map_err(StateError::Shutdown)?;
        }
        self.state.publish(LifecycleState::Midway);
        self.session.pending_tx = 0;
        log::debug!("nic: down");
        Ok(())
    }

    fn unhook_vectors(&mut self) -> Result<(), StateError> {
        if self.state() >= LifecycleState::Ready {
            return Err(StateError::NicStillUp);
        }
        self.gate.unhook().map_err(StateError::Unhook)?;
        self.state.publish(LifecycleState::CanUnload);
        Ok(())
    }
}
