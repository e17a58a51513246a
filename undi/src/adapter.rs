//! smoltcp Device adapter for NetworkDriver trait.
//!
//! Bridges our NetworkDriver abstraction to smoltcp's Device trait.
//! Fixed-size buffers only; nothing on the packet path allocates.
//! Works over trait objects so the PXE stack can lend its boxed adapter.
//!
//! smoltcp 0.11 does not expose a UDP socket's transmit queue, so callers
//! that need to know a datagram left can watch its UDP source port here.

use smoltcp::phy::{Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

use crate::driver::NetworkDriver;
use crate::types::{ETHERTYPE_IPV4, ETH_FRAME_MAX, ETH_HLEN};

const FRAME_BUF: usize = 2048;

/// smoltcp `Device` over a borrowed driver.
pub struct SmoltcpAdapter<'a, D: NetworkDriver + ?Sized> {
    driver: &'a mut D,
    /// Frame pulled from the driver but not yet consumed by smoltcp.
    pending: [u8; FRAME_BUF],
    pending_len: usize,
    tx: TxTally,
    rx_count: u32,
}

/// Transmit counters shared with the TX token.
#[derive(Debug, Default)]
struct TxTally {
    frames: u32,
    watch_port: Option<u16>,
    watched: u32,
}

impl TxTally {
    fn record(&mut self, frame: &[u8]) {
        self.frames += 1;
        if let Some(port) = self.watch_port {
            if udp_source_port(frame) == Some(port) {
                self.watched += 1;
            }
        }
    }
}

/// UDP source port of an Ethernet/IPv4/UDP frame.
fn udp_source_port(frame: &[u8]) -> Option<u16> {
    if frame.len() < ETH_HLEN + 20 || frame[12..14] != ETHERTYPE_IPV4.to_be_bytes() {
        return None;
    }
    let ip = &frame[ETH_HLEN..];
    let ihl = usize::from(ip[0] & 0x0F) * 4;
    if ip[9] != 17 || ihl < 20 || ip.len() < ihl + 8 {
        return None;
    }
    Some(u16::from_be_bytes([ip[ihl], ip[ihl + 1]]))
}

impl<'a, D: NetworkDriver + ?Sized> SmoltcpAdapter<'a, D> {
    pub fn new(driver: &'a mut D) -> Self {
        Self {
            driver,
            pending: [0u8; FRAME_BUF],
            pending_len: 0,
            tx: TxTally::default(),
            rx_count: 0,
        }
    }

    /// Count transmitted UDP datagrams sent from `port`.
    pub fn watch_udp_source(mut self, port: u16) -> Self {
        self.tx.watch_port = Some(port);
        self
    }

    /// Datagrams from the watched source port the driver accepted.
    pub fn watched_sent(&self) -> u32 {
        self.tx.watched
    }

    /// Frames handed to the driver through this adapter.
    pub fn tx_count(&self) -> u32 {
        self.tx.frames
    }

    /// Frames taken from the driver through this adapter.
    pub fn rx_count(&self) -> u32 {
        self.rx_count
    }

    fn pull_frame(&mut self) {
        if self.pending_len != 0 {
            return;
        }
        match self.driver.receive(&mut self.pending) {
            Ok(Some(len)) => {
                self.pending_len = len.min(FRAME_BUF);
                self.rx_count += 1;
            }
            Ok(None) => {}
            Err(err) => log::trace!("adapter: receive dropped: {}", err),
        }
    }
}

/// Borrows the adapter's pending frame.
pub struct RxToken<'a> {
    frame: &'a mut [u8],
}

impl smoltcp::phy::RxToken for RxToken<'_> {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(self.frame)
    }
}

/// Builds the frame on the stack and hands it straight to the driver.
pub struct TxToken<'a, D: NetworkDriver + ?Sized> {
    driver: &'a mut D,
    tally: &'a mut TxTally,
}

impl<D: NetworkDriver + ?Sized> smoltcp::phy::TxToken for TxToken<'_, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut frame = [0u8; FRAME_BUF];
        let len = len.min(FRAME_BUF);
        let result = f(&mut frame[..len]);

        // smoltcp retransmits at its own layer; a refused frame is just lost.
        match self.driver.transmit(&frame[..len]) {
            Ok(()) => self.tally.record(&frame[..len]),
            Err(err) => log::trace!("adapter: transmit dropped: {}", err),
        }
        result
    }
}

impl<'a, D: NetworkDriver + ?Sized> Device for SmoltcpAdapter<'a, D> {
    type RxToken<'b> = RxToken<'b> where Self: 'b;
    type TxToken<'b> = TxToken<'b, D> where Self: 'b;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        self.pull_frame();
        if self.pending_len == 0 {
            return None;
        }
        let len = core::mem::take(&mut self.pending_len);
        Some((
            RxToken { frame: &mut self.pending[..len] },
            TxToken { driver: &mut *self.driver, tally: &mut self.tx },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.driver.can_transmit() {
            return None;
        }
        Some(TxToken { driver: &mut *self.driver, tally: &mut self.tx })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = ETH_FRAME_MAX;
        caps.max_burst_size = Some(1);
        caps
    }
}
