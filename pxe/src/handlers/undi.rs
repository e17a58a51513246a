//! UNDI adapter calls.

use morpheus_undi::filter::multicast_list_from;
use morpheus_undi::types::{write_header, FrameProtocol, ETH_FRAME_MAX};
use morpheus_undi::{multicast_mac_for, PacketFilter, BROADCAST_MAC, ETH_ALEN, ETH_HLEN, ETH_MTU};

use super::{finish, finish_with};
use crate::api::PxeApi;
use crate::envelope::{protocol, Call, Envelope, ServiceFlags, UndiGetNicType, UndiTransmit};
use crate::state::LifecycleState::{Midway, Ready};
use crate::status::{ExitCode, Status};

/// Interface type reported by UNDI_GET_IFACE_INFO.
const IFACE_NAME: &[u8] = b"DIX+802.3";

pub(crate) fn undi_open(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiOpen);
    let filter = PacketFilter::from_bits_truncate(params.packet_filter);
    let (multicast, truncated) = multicast_list_from(params.multicast);
    if truncated {
        log::warn!(" multicast list truncated to {}", multicast.len());
    }

    let stack = ensure_state!(api, env, Ready);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    if let Err(err) = nic.set_receive_filter(filter, &multicast) {
        return finish(env, err.into());
    }
    parts.session.filter = filter;
    parts.session.multicast = multicast;
    parts.session.opened = true;
    if nic.info().irq_capable {
        nic.set_irq_enabled(true);
    }
    finish(env, Status::SUCCESS)
}

/// Closing only stops reception; the adapter drops back to `Midway`.
pub(crate) fn undi_close(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiClose);
    let stack = ensure_state!(api, env, Midway);
    stack.session.opened = false;
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_transmit(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiTransmit);
    let stack = ensure_state!(api, env, Ready);
    let depth = stack.config.tx_completion_depth;
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);

    let mut buf = [0u8; ETH_FRAME_MAX];
    let frame: &[u8] = if params.protocol == protocol::P_UNKNOWN {
        if params.frame.len() < ETH_HLEN || params.frame.len() > ETH_FRAME_MAX {
            return finish(env, Status::UNDI_INVALID_PARAMETER);
        }
        params.frame
    } else {
        let proto = match params.protocol {
            protocol::P_IP => FrameProtocol::Ip,
            protocol::P_ARP => FrameProtocol::Arp,
            protocol::P_RARP => FrameProtocol::Rarp,
            _ => return finish(env, Status::UNDI_INVALID_PARAMETER),
        };
        let Some(ethertype) = proto.ethertype() else {
            return finish(env, Status::UNDI_INVALID_PARAMETER);
        };
        if params.frame.len() > ETH_MTU {
            return finish(env, Status::UNDI_INVALID_PARAMETER);
        }
        let dst = if params.xmit_flag == UndiTransmit::XMT_BROADCAST {
            BROADCAST_MAC
        } else {
            params.dest_addr
        };
        let len = ETH_HLEN + params.frame.len();
        write_header(&mut buf, &dst, &nic.mac_address(), ethertype);
        buf[ETH_HLEN..len].copy_from_slice(params.frame);
        &buf[..len]
    };

    if let Err(err) = nic.transmit(frame) {
        log::debug!(" transmit failed: {}", err);
        return finish(env, err.into());
    }
    let session = parts.session;
    session.stats.xmt_good = session.stats.xmt_good.wrapping_add(1);
    session.pending_tx = session.pending_tx.saturating_add(1).min(depth);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_set_mcast_address(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiSetMcastAddress);
    let (multicast, truncated) = multicast_list_from(params.multicast);
    if truncated {
        return finish(env, Status::OUT_OF_RESOURCES);
    }
    let stack = ensure_state!(api, env, Ready);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let result = nic.set_receive_filter(parts.session.filter, &multicast);
    if result.is_ok() {
        parts.session.multicast = multicast;
    }
    finish_with(env, result)
}

pub(crate) fn undi_set_station_address(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiSetStationAddress);
    let mac = params.station_address;
    if mac[0] & 0x01 != 0 {
        return finish(env, Status::UNDI_INVALID_PARAMETER);
    }
    let stack = ensure_state!(api, env, Ready);
    let nic = bound_nic!(stack.nic_mut(), env);
    finish_with(env, nic.set_station_address(&mac))
}

pub(crate) fn undi_set_packet_filter(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiSetPacketFilter);
    let filter = PacketFilter::from_bits_truncate(params.filter);
    let stack = ensure_state!(api, env, Ready);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let result = nic.set_receive_filter(filter, &parts.session.multicast);
    if result.is_ok() {
        parts.session.filter = filter;
    }
    finish_with(env, result)
}

pub(crate) fn undi_get_information(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiGetInformation);
    let stack = ensure_state!(api, env, Ready);
    let (rx_buffers, tx_buffers) = (stack.config.rx_buffers, stack.config.tx_buffers);
    let nic = bound_nic!(stack.nic_mut(), env);
    let info = nic.info();

    params.base_io = info.base_io;
    params.int_number = u16::from(info.irq);
    params.max_tran_unit = ETH_MTU as u16;
    params.hw_type = crate::envelope::UndiGetInformation::ETHER_TYPE;
    params.hw_addr_len = ETH_ALEN as u16;
    params.current_node_address = nic.mac_address();
    params.permanent_node_address = info.permanent_mac;
    params.rom_address = 0;
    params.rx_buf_ct = rx_buffers;
    params.tx_buf_ct = tx_buffers;
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_get_statistics(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiGetStatistics);
    let stack = ensure_state!(api, env, Ready);
    let stats = stack.statistics();
    params.xmt_good_frames = stats.xmt_good;
    params.rcv_good_frames = stats.rcv_good;
    params.rcv_crc_errors = stats.rcv_crc_errors;
    params.rcv_resource_errors = stats.rcv_resource_errors;
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_clear_statistics(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiClearStatistics);
    let stack = ensure_state!(api, env, Ready);
    stack.session.stats.clear();
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_initiate_diags(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiInitiateDiags);
    ensure_state!(api, env, Ready);
    finish(env, Status::UNSUPPORTED)
}

pub(crate) fn undi_force_interrupt(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiForceInterrupt);
    let stack = ensure_state!(api, env, Ready);
    let nic = bound_nic!(stack.nic_mut(), env);
    finish_with(env, nic.force_interrupt())
}

pub(crate) fn undi_get_mcast_address(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiGetMcastAddress);
    ensure_state!(api, env, Ready);
    // Class D only.
    if params.ip[0] & 0xF0 != 0xE0 {
        return finish(env, Status::UNDI_INVALID_PARAMETER);
    }
    params.media_addr = multicast_mac_for(params.ip);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_get_nic_type(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiGetNicType);
    let stack = ensure_state!(api, env, Ready);
    let nic = bound_nic!(stack.nic_mut(), env);
    match nic.info().pci {
        Some(pci) => {
            params.nic_type = UndiGetNicType::PCI_NIC;
            params.pci = pci;
            finish(env, Status::SUCCESS)
        }
        None => finish(env, Status::UNSUPPORTED),
    }
}

pub(crate) fn undi_get_iface_info(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiGetIfaceInfo);
    let stack = ensure_state!(api, env, Ready);
    let fallback_speed = stack.config.link_speed;
    let nic = bound_nic!(stack.nic_mut(), env);
    let info = nic.info();

    params.if_name = [0; 16];
    params.if_name[..IFACE_NAME.len()].copy_from_slice(IFACE_NAME);
    params.link_speed = match (nic.link_up(), info.link_speed) {
        (false, _) => 0,
        (true, 0) => fallback_speed,
        (true, speed) => speed,
    };
    params.service_flags = ServiceFlags::BROADCAST
        | ServiceFlags::MULTICAST
        | ServiceFlags::SET_STATION_ADDRESS
        | ServiceFlags::RESET
        | ServiceFlags::OPEN_CLOSE;
    if info.irq_capable {
        params.service_flags |= ServiceFlags::IRQ;
    }
    finish(env, Status::SUCCESS)
}
