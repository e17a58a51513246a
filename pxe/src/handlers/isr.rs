//! UNDI_ISR.
//!
//! The boot program's interrupt handler calls us with `START` to ask
//! whether the interrupt was ours (we mask the NIC if so), then with
//! `PROCESS` and `GET_NEXT` until we answer `DONE`. Transmit completions
//! are reported before received frames.

use morpheus_undi::driver::RxError;
use morpheus_undi::types::{classify, FrameDestination, FrameProtocol, ETH_FRAME_MAX};
use morpheus_undi::ETH_HLEN;

use super::finish;
use crate::api::PxeApi;
use crate::envelope::{protocol, Call, Envelope, UndiIsr};
use crate::state::LifecycleState::Ready;
use crate::status::{ExitCode, Status};

pub(crate) fn undi_isr(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiIsr);
    let stack = ensure_state!(api, env, Ready);
    let irq_wanted = stack.irq_wanted();
    let rx_budget = stack.config.rx_buffers.max(1);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let session = parts.session;

    match params.func_flag {
        UndiIsr::START => {
            if nic.irq_pending() {
                nic.set_irq_enabled(false);
                params.func_flag = UndiIsr::OUT_OURS;
            } else {
                params.func_flag = UndiIsr::OUT_NOT_OURS;
            }
        }
        UndiIsr::PROCESS | UndiIsr::GET_NEXT => {
            params.buffer_length = 0;
            params.frame_length = 0;
            params.frame_header_length = 0;

            if session.pending_tx > 0 {
                session.pending_tx -= 1;
                params.func_flag = UndiIsr::OUT_TRANSMIT;
                return finish(env, Status::SUCCESS);
            }

            let station = nic.mac_address();
            let mut frame = [0u8; ETH_FRAME_MAX];
            for _ in 0..rx_budget {
                let len = match nic.receive(&mut frame) {
                    Ok(Some(len)) => len,
                    Ok(None) => break,
                    Err(err) => {
                        match err {
                            RxError::Crc => {
                                session.stats.rcv_crc_errors = session.stats.rcv_crc_errors.wrapping_add(1)
                            }
                            _ => {
                                session.stats.rcv_resource_errors =
                                    session.stats.rcv_resource_errors.wrapping_add(1)
                            }
                        }
                        continue;
                    }
                };
                let Some(class) = classify(&frame[..len], &station) else {
                    continue;
                };
                let mut dst = [0u8; 6];
                dst.copy_from_slice(&frame[..6]);
                if !session.filter.accepts(class.destination, &dst, &session.multicast) {
                    continue;
                }

                session.stats.rcv_good = session.stats.rcv_good.wrapping_add(1);
                let copied = len.min(params.frame.len());
                params.frame[..copied].copy_from_slice(&frame[..copied]);
                params.buffer_length = copied as u16;
                params.frame_length = len as u16;
                params.frame_header_length = ETH_HLEN as u16;
                params.prot_type = match class.protocol {
                    FrameProtocol::Ip => protocol::P_IP,
                    FrameProtocol::Arp => protocol::P_ARP,
                    FrameProtocol::Rarp => protocol::P_RARP,
                    FrameProtocol::Other => protocol::P_UNKNOWN,
                };
                params.pkt_type = match class.destination {
                    FrameDestination::Directed => UndiIsr::P_DIRECTED,
                    FrameDestination::Broadcast => UndiIsr::P_BROADCAST,
                    FrameDestination::Multicast => UndiIsr::P_MULTICAST,
                    FrameDestination::Promiscuous => UndiIsr::P_PROMISCUOUS,
                };
                params.func_flag = UndiIsr::OUT_RECEIVE;
                return finish(env, Status::SUCCESS);
            }

            nic.refill_rx_queue();
            params.func_flag = UndiIsr::OUT_DONE;
            if irq_wanted {
                nic.set_irq_enabled(true);
            }
        }
        other => {
            log::debug!(" bad ISR function {:#x}", other);
            return finish(env, Status::UNDI_INVALID_PARAMETER);
        }
    }
    finish(env, Status::SUCCESS)
}
