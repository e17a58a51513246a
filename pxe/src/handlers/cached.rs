//! GET_CACHED_INFO.

use super::finish;
use crate::api::PxeApi;
use crate::envelope::{Call, Envelope};
use crate::stack::CachedPacket;
use crate::state::LifecycleState::Ready;
use crate::status::{ExitCode, Status};

pub(crate) fn get_cached_info(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::GetCachedInfo);
    let stack = ensure_state!(api, env, Ready);
    let Some(kind) = CachedPacket::from_raw(params.packet_type) else {
        return finish(env, Status::UNSUPPORTED);
    };

    let packet = stack.cached_packet(kind);
    let copied = packet.len().min(params.buffer.len());
    params.buffer[..copied].copy_from_slice(&packet[..copied]);
    params.buffer_size = copied as u16;
    params.buffer_limit = packet.len() as u16;

    if copied < packet.len() {
        log::debug!(" cached packet {:?} truncated to {}", kind, copied);
        return finish(env, Status::OUT_OF_RESOURCES);
    }
    finish(env, Status::SUCCESS)
}
