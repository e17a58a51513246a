//! UDP endpoint for the PXE UDP calls.
//!
//! One smoltcp `Interface` per open endpoint, addressed with the source IP
//! given to UDP_OPEN. Sockets are created lazily per local port. The
//! adapter is borrowed per call rather than owned, because the PXE stack
//! keeps ownership of the NIC across lifecycle transitions.
//!
//! Reads never block: one interface poll, then whatever is queued.
//! Writes poll until the adapter has seen the datagram leave (ARP
//! included) or the poll budget runs out.

extern crate alloc;
use alloc::vec;
use alloc::vec::Vec;

use smoltcp::iface::{Config as IfaceConfig, Interface, SocketHandle, SocketSet};
use smoltcp::socket::udp::{PacketBuffer, PacketMetadata, Socket as UdpSocket};
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress, IpAddress, IpCidr, IpEndpoint, Ipv4Address};
use thiserror::Error;

use crate::adapter::SmoltcpAdapter;
use crate::driver::NetworkDriver;
use crate::time::{get_tsc, Timeouts};

/// Source port used when the caller passes zero.
pub const DEFAULT_SOURCE_PORT: u16 = 2069;

/// UDP endpoint configuration.
#[derive(Debug, Clone, Copy)]
pub struct UdpConfig {
    /// Packets buffered per direction per socket.
    pub packets: usize,
    /// Payload bytes buffered per direction per socket.
    pub payload_bytes: usize,
    /// Subnet prefix applied to the source address.
    pub subnet_prefix: u8,
    /// Interface polls a write may spend waiting for ARP/transmit.
    pub write_poll_budget: u32,
    /// TSC frequency in Hz (0 = uncalibrated).
    pub tsc_freq: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            packets: 8,
            payload_bytes: 8192,
            subnet_prefix: 24,
            write_poll_budget: 64,
            tsc_freq: 0,
        }
    }
}

/// Datagram metadata returned by `UdpEndpoint::read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram {
    pub src_ip: [u8; 4],
    pub src_port: u16,
    pub dst_port: u16,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UdpError {
    #[error("cannot bind UDP port {0}")]
    Bind(u16),
    #[error("datagram of {0} bytes does not fit the transmit buffer")]
    TooLarge(usize),
    #[error("transmit buffer full")]
    QueueFull,
    #[error("no ARP reply for next hop")]
    ArpTimeout,
    #[error("receive failed")]
    Receive,
}

/// Open UDP endpoint.
pub struct UdpEndpoint {
    iface: Interface,
    sockets: SocketSet<'static>,
    bound: Vec<(u16, SocketHandle)>,
    src_ip: [u8; 4],
    config: UdpConfig,
    timeouts: Timeouts,
}

impl UdpEndpoint {
    /// Open an endpoint with `src_ip` as our address.
    pub fn open<D: NetworkDriver + ?Sized>(driver: &mut D, src_ip: [u8; 4], config: UdpConfig) -> Self {
        let timeouts = Timeouts::new(config.tsc_freq);
        let mac = driver.mac_address();
        let mut adapter = SmoltcpAdapter::new(driver);

        let iface_config = IfaceConfig::new(HardwareAddress::Ethernet(EthernetAddress(mac)));
        let mut iface = Interface::new(
            iface_config,
            &mut adapter,
            Instant::from_millis(timeouts.now_ms()),
        );
        iface.update_ip_addrs(|addrs| {
            addrs.clear();
            let cidr = IpCidr::new(IpAddress::Ipv4(Ipv4Address(src_ip)), config.subnet_prefix);
            if addrs.push(cidr).is_err() {
                log::warn!("udp: interface address table full");
            }
        });

        log::debug!("udp: open {:?}/{}", src_ip, config.subnet_prefix);

        Self {
            iface,
            sockets: SocketSet::new(vec![]),
            bound: Vec::new(),
            src_ip,
            config,
            timeouts,
        }
    }

    pub fn source_ip(&self) -> [u8; 4] {
        self.src_ip
    }

    /// Send one datagram. `gateway` of zero means the destination is on-link.
    pub fn write<D: NetworkDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        dst_ip: [u8; 4],
        gateway: [u8; 4],
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
    ) -> Result<(), UdpError> {
        if payload.len() > self.config.payload_bytes {
            return Err(UdpError::TooLarge(payload.len()));
        }
        let src_port = if src_port == 0 { DEFAULT_SOURCE_PORT } else { src_port };

        if gateway == [0; 4] {
            self.iface.routes_mut().remove_default_ipv4_route();
        } else if self
            .iface
            .routes_mut()
            .add_default_ipv4_route(Ipv4Address(gateway))
            .is_err()
        {
            log::warn!("udp: route table full, gateway {:?} ignored", gateway);
        }

        let handle = self.socket_for(src_port)?;
        let endpoint = IpEndpoint::new(IpAddress::Ipv4(Ipv4Address(dst_ip)), dst_port);
        self.sockets
            .get_mut::<UdpSocket>(handle)
            .send_slice(payload, endpoint)
            .map_err(|_| UdpError::QueueFull)?;

        let start = get_tsc();
        for _ in 0..self.config.write_poll_budget {
            // Each write queues exactly one datagram on this port's socket.
            if self.poll(driver, Some(src_port)) > 0 {
                return Ok(());
            }
            if self.timeouts.expired(start, self.timeouts.arp()) {
                break;
            }
        }

        // Drop the stuck datagram so the next write starts clean.
        self.rebind(src_port, handle);
        log::debug!("udp: write to {:?}:{} timed out", dst_ip, dst_port);
        Err(UdpError::ArpTimeout)
    }

    /// Fetch one queued datagram for `local_port` (0 = any bound port).
    pub fn read<D: NetworkDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        local_port: u16,
        buf: &mut [u8],
    ) -> Result<Option<UdpDatagram>, UdpError> {
        if local_port != 0 {
            self.socket_for(local_port)?;
        }
        self.poll(driver, None);

        for &(port, handle) in self.bound.iter() {
            if local_port != 0 && port != local_port {
                continue;
            }
            let socket = self.sockets.get_mut::<UdpSocket>(handle);
            if !socket.can_recv() {
                continue;
            }
            let (len, meta) = socket.recv_slice(buf).map_err(|_| UdpError::Receive)?;
            return Ok(Some(UdpDatagram {
                src_ip: ipv4_octets(meta.endpoint.addr),
                src_port: meta.endpoint.port,
                dst_port: port,
                len,
            }));
        }
        Ok(None)
    }

    /// One interface poll. Returns datagrams sent from `watch_port`.
    fn poll<D: NetworkDriver + ?Sized>(&mut self, driver: &mut D, watch_port: Option<u16>) -> u32 {
        let now = Instant::from_millis(self.timeouts.now_ms());
        let mut adapter = SmoltcpAdapter::new(driver);
        if let Some(port) = watch_port {
            adapter = adapter.watch_udp_source(port);
        }
        let _ = self.iface.poll(now, &mut adapter, &mut self.sockets);
        if adapter.tx_count() != 0 || adapter.rx_count() != 0 {
            log::trace!("udp: poll tx={} rx={}", adapter.tx_count(), adapter.rx_count());
        }
        adapter.watched_sent()
    }

    fn socket_for(&mut self, port: u16) -> Result<SocketHandle, UdpError> {
        if let Some(&(_, handle)) = self.bound.iter().find(|(p, _)| *p == port) {
            return Ok(handle);
        }
        let mut socket = self.new_socket();
        socket.bind(port).map_err(|_| UdpError::Bind(port))?;
        let handle = self.sockets.add(socket);
        self.bound.push((port, handle));
        Ok(handle)
    }

    fn rebind(&mut self, port: u16, handle: SocketHandle) {
        self.sockets.remove(handle);
        self.bound.retain(|(p, _)| *p != port);
        if self.socket_for(port).is_err() {
            log::warn!("udp: cannot rebind port {}", port);
        }
    }

    fn new_socket(&self) -> UdpSocket<'static> {
        let rx = PacketBuffer::new(
            vec![PacketMetadata::EMPTY; self.config.packets],
            vec![0u8; self.config.payload_bytes],
        );
        let tx = PacketBuffer::new(
            vec![PacketMetadata::EMPTY; self.config.packets],
            vec![0u8; self.config.payload_bytes],
        );
        UdpSocket::new(rx, tx)
    }
}

fn ipv4_octets(addr: IpAddress) -> [u8; 4] {
    match addr {
        IpAddress::Ipv4(v4) => v4.0,
        #[allow(unreachable_patterns)]
        _ => [0; 4],
    }
}
