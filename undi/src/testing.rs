//! In-memory adapter for unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use crate::driver::{NetworkDriver, NicControl, NicError, NicInfo, RxError, TxError};
use crate::filter::{MulticastList, PacketFilter};
use crate::types::{MacAddress, ETHERTYPE_ARP};

pub struct MockNic {
    pub mac: MacAddress,
    pub up: bool,
    pub irq_enabled: bool,
    pub rx: VecDeque<Vec<u8>>,
    pub tx: Vec<Vec<u8>>,
    /// Answer ARP requests for any address with this MAC.
    pub arp_peer: Option<MacAddress>,
}

impl MockNic {
    pub fn new(mac: MacAddress) -> Self {
        Self {
            mac,
            up: true,
            irq_enabled: false,
            rx: VecDeque::new(),
            tx: Vec::new(),
            arp_peer: None,
        }
    }

    fn answer_arp(&mut self, frame: &[u8]) {
        let Some(peer) = self.arp_peer else { return };
        if frame.len() < 42 || frame[12..14] != ETHERTYPE_ARP.to_be_bytes() || frame[20..22] != [0u8, 1] {
            return;
        }
        let sha = &frame[22..28];
        let spa = &frame[28..32];
        let tpa = &frame[38..42];

        let mut reply = Vec::with_capacity(60);
        reply.extend_from_slice(sha);
        reply.extend_from_slice(&peer);
        reply.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
        reply.extend_from_slice(&[0, 1, 0x08, 0x00, 6, 4, 0, 2]);
        reply.extend_from_slice(&peer);
        reply.extend_from_slice(tpa);
        reply.extend_from_slice(sha);
        reply.extend_from_slice(spa);
        reply.resize(60, 0);
        self.rx.push_back(reply);
    }
}

impl NetworkDriver for MockNic {
    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn can_transmit(&self) -> bool {
        self.up
    }

    fn can_receive(&self) -> bool {
        self.up && !self.rx.is_empty()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
        if !self.up {
            return Err(TxError::NotReady);
        }
        self.answer_arp(frame);
        self.tx.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        let Some(frame) = self.rx.pop_front() else { return Ok(None) };
        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        Ok(Some(len))
    }
}

impl NicControl for MockNic {
    fn bring_up(&mut self) -> Result<(), NicError> {
        self.up = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), NicError> {
        self.irq_enabled = false;
        self.up = false;
        Ok(())
    }

    fn set_irq_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }

    fn irq_pending(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn set_station_address(&mut self, mac: &MacAddress) -> Result<(), NicError> {
        self.mac = *mac;
        Ok(())
    }

    fn set_receive_filter(&mut self, _filter: PacketFilter, _multicast: &MulticastList) -> Result<(), NicError> {
        Ok(())
    }

    fn info(&self) -> NicInfo {
        NicInfo {
            permanent_mac: self.mac,
            ..NicInfo::default()
        }
    }
}
