//! UDP calls.

use morpheus_undi::UdpEndpoint;

use super::{finish, finish_with};
use crate::api::PxeApi;
use crate::envelope::{Call, Envelope};
use crate::state::LifecycleState::Ready;
use crate::status::{ExitCode, Status};

pub(crate) fn udp_open(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UdpOpen);
    let requested = params.src_ip;
    let stack = ensure_state!(api, env, Ready);
    if stack.session.udp.is_some() {
        return finish(env, Status::UDP_OPEN);
    }

    let src_ip = if requested != [0; 4] {
        requested
    } else {
        match stack.client_ip() {
            Some(ip) => ip,
            None => return finish(env, Status::UNDI_INVALID_PARAMETER),
        }
    };
    let config = stack.config.udp;
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    parts.session.udp = Some(UdpEndpoint::open(nic.as_mut(), src_ip, config));
    finish(env, Status::SUCCESS)
}

pub(crate) fn udp_close(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UdpClose);
    let stack = ensure_state!(api, env, Ready);
    stack.session.udp = None;
    finish(env, Status::SUCCESS)
}

/// Non-blocking: no queued datagram is a plain failure the caller polls past.
pub(crate) fn udp_read(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UdpRead);
    let stack = ensure_state!(api, env, Ready);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let Some(endpoint) = parts.session.udp.as_mut() else {
        return finish(env, Status::UDP_CLOSED);
    };

    match endpoint.read(nic.as_mut(), params.d_port, params.buffer) {
        Ok(Some(datagram)) => {
            params.src_ip = datagram.src_ip;
            params.s_port = datagram.src_port;
            params.d_port = datagram.dst_port;
            params.dest_ip = endpoint.source_ip();
            params.buffer_size = datagram.len as u16;
            finish(env, Status::SUCCESS)
        }
        Ok(None) => {
            params.buffer_size = 0;
            finish(env, Status::FAILURE)
        }
        Err(err) => finish(env, err.into()),
    }
}

pub(crate) fn udp_write(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UdpWrite);
    let stack = ensure_state!(api, env, Ready);
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let Some(endpoint) = parts.session.udp.as_mut() else {
        return finish(env, Status::UDP_CLOSED);
    };

    let result = endpoint.write(
        nic.as_mut(),
        params.ip,
        params.gateway,
        params.src_port,
        params.dst_port,
        params.buffer,
    );
    if result.is_ok() {
        parts.session.stats.xmt_good = parts.session.stats.xmt_good.wrapping_add(1);
    }
    finish_with(env, result)
}
