//! TFTP calls.
//!
//! One session at a time: TFTP_OPEN/READ/CLOSE share the client with the
//! whole-file calls, so the latter refuse while a session is open.

use super::{c_str, finish};
use crate::api::PxeApi;
use crate::envelope::{Call, Envelope, TftpReadFile};
use crate::stack::PxeStack;
use crate::state::LifecycleState::Ready;
use crate::status::{ExitCode, Status};
use crate::tftp::{TftpRequest, DEFAULT_BLOCK_SIZE, TFTP_PORT};

pub(crate) fn tftp_open(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::TftpOpen);
    let stack = ensure_state!(api, env, Ready);
    if stack.session.tftp_open {
        return finish(env, Status::TFTP_OPEN);
    }

    let request = TftpRequest {
        server_ip: params.server_ip,
        gateway_ip: params.gateway_ip,
        filename: c_str(params.filename),
        port: if params.tftp_port == 0 { TFTP_PORT } else { params.tftp_port },
        packet_size: if params.packet_size == 0 { DEFAULT_BLOCK_SIZE } else { params.packet_size },
    };
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let Some(client) = parts.tftp else {
        return finish(env, Status::TFTP_CANNOT_OPEN_CONNECTION);
    };

    match client.open(nic.as_mut(), &request) {
        Ok(block_size) => {
            params.packet_size = block_size;
            parts.session.tftp_open = true;
            finish(env, Status::SUCCESS)
        }
        Err(status) => finish(env, status),
    }
}

pub(crate) fn tftp_close(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::TftpClose);
    let stack = ensure_state!(api, env, Ready);
    if !stack.session.tftp_open {
        return finish(env, Status::TFTP_CLOSED);
    }

    let parts = stack.parts();
    parts.session.tftp_open = false;
    if let (Some(nic), Some(client)) = (parts.nic, parts.tftp) {
        client.close(nic.as_mut());
    }
    finish(env, Status::SUCCESS)
}

pub(crate) fn tftp_read(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::TftpRead);
    let stack = ensure_state!(api, env, Ready);
    if !stack.session.tftp_open {
        return finish(env, Status::TFTP_CLOSED);
    }

    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let Some(client) = parts.tftp else {
        parts.session.tftp_open = false;
        return finish(env, Status::TFTP_CLOSED);
    };

    match client.read(nic.as_mut(), params.buffer) {
        Ok(block) => {
            params.packet_number = block.packet_number;
            params.buffer_size = block.len as u16;
            finish(env, Status::SUCCESS)
        }
        Err(status) => {
            params.buffer_size = 0;
            // A short buffer can be retried; anything else ends the transfer.
            if status != Status::OUT_OF_RESOURCES {
                client.close(nic.as_mut());
                parts.session.tftp_open = false;
            }
            finish(env, status)
        }
    }
}

pub(crate) fn tftp_read_file(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::TftpReadFile);
    let stack = ensure_state!(api, env, Ready);
    let status = read_file_into(stack, params);
    finish(env, status)
}

pub(crate) fn tftp_get_fsize(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::TftpGetFsize);
    let stack = ensure_state!(api, env, Ready);
    if stack.session.tftp_open {
        return finish(env, Status::TFTP_OPEN);
    }

    let request = TftpRequest {
        server_ip: params.server_ip,
        gateway_ip: params.gateway_ip,
        filename: c_str(params.filename),
        port: TFTP_PORT,
        packet_size: DEFAULT_BLOCK_SIZE,
    };
    let parts = stack.parts();
    let nic = bound_nic!(parts.nic, env);
    let Some(client) = parts.tftp else {
        return finish(env, Status::TFTP_CANNOT_OPEN_CONNECTION);
    };

    match client.file_size(nic.as_mut(), &request) {
        Ok(size) => {
            params.file_size = size;
            finish(env, Status::SUCCESS)
        }
        Err(status) => {
            params.file_size = 0;
            finish(env, status)
        }
    }
}

/// Fetch a fresh boot image. Running it is up to the caller.
pub(crate) fn restart_tftp(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::RestartTftp);
    let stack = ensure_state!(api, env, Ready);
    log::debug!(" restart with {:?}", core::str::from_utf8(c_str(params.filename)));
    let status = read_file_into(stack, params);
    finish(env, status)
}

fn read_file_into(stack: &mut PxeStack, params: &mut TftpReadFile<'_>) -> Status {
    params.buffer_size = 0;
    if stack.session.tftp_open {
        return Status::TFTP_OPEN;
    }

    let request = TftpRequest {
        server_ip: params.server_ip,
        gateway_ip: params.gateway_ip,
        filename: c_str(params.filename),
        port: TFTP_PORT,
        packet_size: DEFAULT_BLOCK_SIZE,
    };
    let parts = stack.parts();
    let Some(nic) = parts.nic else {
        return Status::UNDI_INVALID_STATE;
    };
    let Some(client) = parts.tftp else {
        return Status::TFTP_CANNOT_OPEN_CONNECTION;
    };

    match client.read_file(nic.as_mut(), &request, params.buffer) {
        Ok(len) => {
            params.buffer_size = len as u32;
            Status::SUCCESS
        }
        Err(status) => status,
    }
}
