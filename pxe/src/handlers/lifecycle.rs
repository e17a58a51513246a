//! Startup and teardown calls.
//!
//! PXE 2.1 is loose about the order of these calls, so each
//! one only states the lifecycle state it leaves the stack in and lets
//! `reconcile` work out the rest.

use morpheus_undi::filter::multicast_list_from;
use morpheus_undi::PciLocation;

use super::finish;
use crate::api::PxeApi;
use crate::envelope::{Call, Envelope, StartUndi};
use crate::state::LifecycleState::{CanUnload, Midway, Ready};
use crate::status::{ExitCode, Status};

pub(crate) fn start_undi(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::StartUndi);
    let packed = params.pci_bus_dev_func;
    let stack = ensure_state!(api, env, Midway);

    let location = (packed != StartUndi::NO_DEVICE).then(|| PciLocation::from_packed(packed));
    if location != stack.requested_device() {
        log::debug!(" device {:?}", location);
    }
    stack.request_device(location);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_startup(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiStartup);
    ensure_state!(api, env, Midway);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_cleanup(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiCleanup);
    ensure_state!(api, env, CanUnload);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_initialize(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    params!(env, Call::UndiInitialize);
    ensure_state!(api, env, Ready);
    finish(env, Status::SUCCESS)
}

/// Power-cycle the adapter. Bring-up restores the receive filter, so the
/// new multicast list goes into the session while the NIC is down.
pub(crate) fn undi_reset_adapter(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    let params = params!(env, Call::UndiResetAdapter);
    let (multicast, truncated) = multicast_list_from(params.multicast);
    let stack = ensure_state!(api, env, Midway);
    if truncated {
        log::warn!(" multicast list truncated to {}", multicast.len());
    }
    stack.session.multicast = multicast;
    ensure_state!(api, env, Ready);
    finish(env, Status::SUCCESS)
}

pub(crate) fn undi_shutdown(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UndiShutdown);
    ensure_state!(api, env, Midway);
    finish(env, Status::SUCCESS)
}

pub(crate) fn stop_undi(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::StopUndi);
    let stack = ensure_state!(api, env, CanUnload);
    stack.request_device(None);
    finish(env, Status::SUCCESS)
}

/// Only gets the stack to `CanUnload`; the host frees it via `PxeApi::unload`.
pub(crate) fn unload_stack(api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::UnloadStack);
    ensure_state!(api, env, CanUnload);
    finish(env, Status::SUCCESS)
}

/// There is no base code to start; we are the base code.
pub(crate) fn start_base(_api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::StartBase);
    finish(env, Status::UNSUPPORTED)
}

pub(crate) fn stop_base(_api: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
    expect_call!(env, Call::StopBase);
    finish(env, Status::SUCCESS)
}
