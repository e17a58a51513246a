//! Test doubles: an IVT image, a recording gate, an in-memory NIC and a
//! TFTP server stub, wired into a `PxeStack` by `Harness`.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use spin::{Mutex, MutexGuard};

use morpheus_undi::types::{write_header, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use morpheus_undi::{
    HandoffBinder, MacAddress, MulticastList, NetworkDriver, NicControl, NicError, NicInfo,
    PacketFilter, PciIdentity, PciLocation, RxError, TxError,
};

use crate::api::PxeApi;
use crate::config::StackConfig;
use crate::gate::{GateError, InterruptGate, IvtGate, RealModeMemory};
use crate::stack::PxeStack;
use crate::status::Status;
use crate::tftp::{TftpBlock, TftpClient, TftpRequest, DEFAULT_BLOCK_SIZE};

pub const TEST_MAC: MacAddress = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub const PEER_MAC: MacAddress = [0x52, 0x54, 0x00, 0x00, 0x00, 0x01];
pub const PEER_IP: [u8; 4] = [10, 0, 0, 1];

/// Hardware-visible transitions, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Hook,
    Unhook,
    NicUp,
    NicDown,
    IrqMasked,
    IrqEnabled,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

// ═══════════════════════════════════════════════════════════════════════════
// GATE
// ═══════════════════════════════════════════════════════════════════════════

/// First KiB of real-mode memory.
pub struct IvtImage {
    bytes: Vec<u8>,
}

impl IvtImage {
    pub fn new() -> Self {
        Self { bytes: vec![0; 1024] }
    }
}

impl RealModeMemory for IvtImage {
    fn read_u32(&self, addr: u32) -> u32 {
        let at = addr as usize;
        u32::from_le_bytes([self.bytes[at], self.bytes[at + 1], self.bytes[at + 2], self.bytes[at + 3]])
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        let at = addr as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[derive(Debug, Default)]
pub struct GateState {
    pub fail_hook: bool,
    pub fail_unhook: bool,
}

/// `IvtGate` over an `IvtImage`, with failure injection and event recording.
pub struct MockGate {
    inner: IvtGate<IvtImage>,
    state: Arc<Mutex<GateState>>,
    events: EventLog,
}

impl InterruptGate for MockGate {
    fn hook(&mut self) -> Result<(), GateError> {
        if self.state.lock().fail_hook {
            return Err(GateError::Unavailable);
        }
        let was_hooked = self.inner.is_hooked();
        self.inner.hook()?;
        if !was_hooked {
            self.events.lock().push(Event::Hook);
        }
        Ok(())
    }

    fn unhook(&mut self) -> Result<(), GateError> {
        if self.state.lock().fail_unhook {
            return Err(GateError::VectorStolen(0x1A));
        }
        let was_hooked = self.inner.is_hooked();
        self.inner.unhook()?;
        if was_hooked {
            self.events.lock().push(Event::Unhook);
        }
        Ok(())
    }

    fn is_hooked(&self) -> bool {
        self.inner.is_hooked()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NIC
// ═══════════════════════════════════════════════════════════════════════════

pub struct NicState {
    pub mac: MacAddress,
    pub up: bool,
    pub irq_enabled: bool,
    pub rx: VecDeque<Vec<u8>>,
    /// Receive errors reported ahead of any queued frame.
    pub rx_errors: VecDeque<RxError>,
    pub tx: Vec<Vec<u8>>,
    pub link_up: bool,
    pub fail_bring_up: bool,
    pub fail_shutdown: bool,
    pub fail_transmit: bool,
    pub pci: Option<PciIdentity>,
    /// Last receive filter programmed.
    pub filter: PacketFilter,
    pub multicast: MulticastList,
    pub forced: u32,
    /// Answer ARP requests for any address with this MAC.
    pub arp_peer: Option<MacAddress>,
}

impl NicState {
    fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            up: false,
            irq_enabled: false,
            rx: VecDeque::new(),
            rx_errors: VecDeque::new(),
            tx: Vec::new(),
            link_up: true,
            fail_bring_up: false,
            fail_shutdown: false,
            fail_transmit: false,
            pci: None,
            filter: PacketFilter::empty(),
            multicast: MulticastList::new(),
            forced: 0,
            arp_peer: None,
        }
    }

    fn answer_arp(&mut self, frame: &[u8]) {
        let Some(peer) = self.arp_peer else { return };
        if frame.len() < 42 || frame[12..14] != ETHERTYPE_ARP.to_be_bytes() || frame[20..22] != [0u8, 1] {
            return;
        }
        let (sha, spa, tpa) = (&frame[22..28], &frame[28..32], &frame[38..42]);

        let mut reply = vec![0u8; 60];
        reply[0..6].copy_from_slice(sha);
        reply[6..12].copy_from_slice(&peer);
        reply[12..14].copy_from_slice(&ETHERTYPE_ARP.to_be_bytes());
        reply[14..22].copy_from_slice(&[0, 1, 0x08, 0x00, 6, 4, 0, 2]);
        reply[22..28].copy_from_slice(&peer);
        reply[28..32].copy_from_slice(tpa);
        reply[32..38].copy_from_slice(sha);
        reply[38..42].copy_from_slice(spa);
        self.rx.push_back(reply);
    }
}

/// In-memory adapter whose state stays inspectable after the stack owns it.
pub struct TestNic {
    state: Arc<Mutex<NicState>>,
    events: EventLog,
}

impl TestNic {
    pub fn new() -> Self {
        Self::with_mac(TEST_MAC, Arc::default())
    }

    fn with_mac(mac: MacAddress, events: EventLog) -> Self {
        Self {
            state: Arc::new(Mutex::new(NicState::new(mac))),
            events,
        }
    }
}

impl NetworkDriver for TestNic {
    fn mac_address(&self) -> MacAddress {
        self.state.lock().mac
    }

    fn can_transmit(&self) -> bool {
        self.state.lock().up
    }

    fn can_receive(&self) -> bool {
        let state = self.state.lock();
        state.up && !state.rx.is_empty()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
        let mut state = self.state.lock();
        if state.fail_transmit {
            return Err(TxError::QueueFull);
        }
        state.answer_arp(frame);
        state.tx.push(frame.to_vec());
        Ok(())
    }

    fn link_up(&self) -> bool {
        self.state.lock().link_up
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        let mut state = self.state.lock();
        if let Some(err) = state.rx_errors.pop_front() {
            return Err(err);
        }
        let Some(frame) = state.rx.pop_front() else { return Ok(None) };
        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        Ok(Some(len))
    }
}

impl NicControl for TestNic {
    fn bring_up(&mut self) -> Result<(), NicError> {
        let mut state = self.state.lock();
        if state.fail_bring_up {
            return Err(NicError::PhyNotAccessible);
        }
        state.up = true;
        self.events.lock().push(Event::NicUp);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), NicError> {
        let mut state = self.state.lock();
        if state.fail_shutdown {
            return Err(NicError::ResetTimeout);
        }
        state.up = false;
        state.irq_enabled = false;
        self.events.lock().push(Event::NicDown);
        Ok(())
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        self.state.lock().irq_enabled = enabled;
        let event = if enabled { Event::IrqEnabled } else { Event::IrqMasked };
        self.events.lock().push(event);
    }

    fn irq_pending(&mut self) -> bool {
        !self.state.lock().rx.is_empty()
    }

    fn force_interrupt(&mut self) -> Result<(), NicError> {
        self.state.lock().forced += 1;
        Ok(())
    }

    fn set_station_address(&mut self, mac: &MacAddress) -> Result<(), NicError> {
        self.state.lock().mac = *mac;
        Ok(())
    }

    fn set_receive_filter(&mut self, filter: PacketFilter, multicast: &MulticastList) -> Result<(), NicError> {
        let mut state = self.state.lock();
        state.filter = filter;
        state.multicast = multicast.clone();
        Ok(())
    }

    fn info(&self) -> NicInfo {
        NicInfo {
            base_io: 0xC000,
            irq: 11,
            permanent_mac: TEST_MAC,
            link_speed: 0,
            irq_capable: true,
            pci: self.state.lock().pci,
        }
    }
}

/// Ethernet frame from the peer to `dst` with a zeroed payload.
pub fn frame_to(dst: MacAddress, ethertype: u16, payload_len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; 14 + payload_len];
    write_header(&mut frame, &dst, &PEER_MAC, ethertype);
    frame
}

/// IPv4/UDP frame from `PEER_IP` to `TEST_MAC`/`dst_ip`, UDP checksum off.
pub fn udp_frame(dst_ip: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let ip_len = 20 + udp_len;
    let mut frame = frame_to(TEST_MAC, ETHERTYPE_IPV4, ip_len);

    let ip = &mut frame[14..34];
    ip[0] = 0x45;
    ip[2..4].copy_from_slice(&(ip_len as u16).to_be_bytes());
    ip[8] = 64;
    ip[9] = 17;
    ip[12..16].copy_from_slice(&PEER_IP);
    ip[16..20].copy_from_slice(&dst_ip);
    let sum = ip_checksum(ip);
    ip[10..12].copy_from_slice(&sum.to_be_bytes());

    let udp = &mut frame[34..];
    udp[0..2].copy_from_slice(&src_port.to_be_bytes());
    udp[2..4].copy_from_slice(&dst_port.to_be_bytes());
    udp[4..6].copy_from_slice(&(udp_len as u16).to_be_bytes());
    udp[8..].copy_from_slice(payload);
    frame
}

fn ip_checksum(header: &[u8]) -> u16 {
    let mut sum = 0u32;
    for pair in header.chunks(2) {
        sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

// ═══════════════════════════════════════════════════════════════════════════
// TFTP
// ═══════════════════════════════════════════════════════════════════════════

/// Serves one file in fixed 512-byte blocks.
pub struct MockTftp {
    name: Vec<u8>,
    data: Vec<u8>,
    open: bool,
    pos: usize,
    block: u16,
}

impl MockTftp {
    pub fn with_file(name: &[u8], data: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            data: data.to_vec(),
            open: false,
            pos: 0,
            block: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl TftpClient for MockTftp {
    fn open(&mut self, _nic: &mut dyn NicControl, request: &TftpRequest<'_>) -> Result<u16, Status> {
        if request.filename != self.name.as_slice() {
            return Err(Status::TFTP_FILE_NOT_FOUND);
        }
        self.open = true;
        self.pos = 0;
        self.block = 0;
        Ok(DEFAULT_BLOCK_SIZE)
    }

    fn read(&mut self, _nic: &mut dyn NicControl, buf: &mut [u8]) -> Result<TftpBlock, Status> {
        if !self.open {
            return Err(Status::TFTP_CLOSED);
        }
        let len = (self.data.len() - self.pos).min(usize::from(DEFAULT_BLOCK_SIZE));
        if buf.len() < len {
            return Err(Status::OUT_OF_RESOURCES);
        }
        buf[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        self.block = self.block.wrapping_add(1);
        Ok(TftpBlock { packet_number: self.block, len })
    }

    fn close(&mut self, _nic: &mut dyn NicControl) {
        self.open = false;
    }

    fn file_size(&mut self, _nic: &mut dyn NicControl, request: &TftpRequest<'_>) -> Result<u32, Status> {
        if request.filename != self.name.as_slice() {
            return Err(Status::TFTP_FILE_NOT_FOUND);
        }
        Ok(self.data.len() as u32)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════

/// Handles into the doubles a `PxeStack` owns.
pub struct Doubles {
    events: EventLog,
    gate: Arc<Mutex<GateState>>,
    nic: Arc<Mutex<NicState>>,
}

impl Doubles {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn gate_control(&self) -> MutexGuard<'_, GateState> {
        self.gate.lock()
    }

    /// State of the first adapter handed to the binder.
    pub fn nic_control(&self) -> MutexGuard<'_, NicState> {
        self.nic.lock()
    }

    /// No NIC came up without vectors, no vectors left under a live NIC.
    pub fn invariant_held(&self) -> bool {
        let (mut hooked, mut nic_up) = (false, false);
        for event in self.events() {
            match event {
                Event::Hook => hooked = true,
                Event::Unhook if nic_up => return false,
                Event::Unhook => hooked = false,
                Event::NicUp if !hooked => return false,
                Event::NicUp => nic_up = true,
                Event::NicDown => nic_up = false,
                Event::IrqMasked | Event::IrqEnabled => {}
            }
        }
        true
    }
}

pub struct Harness {
    pub stack: PxeStack,
    doubles: Doubles,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(1)
    }

    pub fn without_nic() -> Self {
        Self::build(0)
    }

    /// Adapters at PCI 00:03.0 and 00:04.0, bound in that order.
    pub fn with_two_nics() -> Self {
        Self::build(2)
    }

    pub fn api() -> (PxeApi, Doubles) {
        Self::new().into_api()
    }

    pub fn api_without_nic() -> (PxeApi, Doubles) {
        Self::without_nic().into_api()
    }

    pub fn api_with_two_nics() -> (PxeApi, Doubles) {
        Self::with_two_nics().into_api()
    }

    fn build(nics: u8) -> Self {
        let events = EventLog::default();
        let gate_state = Arc::new(Mutex::new(GateState::default()));

        let config = StackConfig::default();
        let mut memory = IvtImage::new();
        memory.write_u32(0x1A * 4, 0xF000_FE6E);
        memory.write_u32(0x15 * 4, 0xF000_F859);
        let gate = MockGate {
            inner: IvtGate::new(memory, config.vectors),
            state: gate_state.clone(),
            events: events.clone(),
        };

        let mut binder = HandoffBinder::new();
        let mut first = None;
        for i in 0..nics {
            let mut mac = TEST_MAC;
            mac[5] = mac[5].wrapping_add(i);
            let nic = TestNic::with_mac(mac, events.clone());
            first.get_or_insert_with(|| nic.state.clone());
            binder.add(Box::new(nic), Some(PciLocation::new(0, 3 + i, 0)));
        }
        let nic = first.unwrap_or_else(|| Arc::new(Mutex::new(NicState::new(TEST_MAC))));

        let stack = PxeStack::new(Box::new(gate), Box::new(binder), config);
        Self {
            stack,
            doubles: Doubles {
                events,
                gate: gate_state,
                nic,
            },
        }
    }

    fn into_api(self) -> (PxeApi, Doubles) {
        let mut api = PxeApi::new();
        if api.load(self.stack).is_err() {
            unreachable!("fresh api refused a stack");
        }
        (api, self.doubles)
    }
}

impl Deref for Harness {
    type Target = Doubles;

    fn deref(&self) -> &Doubles {
        &self.doubles
    }
}
