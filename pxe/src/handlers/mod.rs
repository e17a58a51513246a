//! Per-opcode handlers.
//!
//! Every handler follows the same shape:
//!
//! 1. Pick its parameter block out of the envelope; a mismatched block
//!    leaves the dispatcher's generic failure in place.
//! 2. Ask for the lifecycle state it needs (`ensure_state!`). Failure
//!    means `UNDI_INVALID_STATE` and no side effects.
//! 3. Do its narrow job and set the status.
//!
//! Handlers never write the lifecycle state themselves.

/// Borrow the parameter block of a tuple variant, or fail the call.
macro_rules! params {
    ($env:expr, $variant:path) => {
        match &mut $env.call {
            $variant(params) => params,
            _ => return $crate::status::ExitCode::FAILURE,
        }
    };
}

/// Check a parameterless call variant, or fail the call.
macro_rules! expect_call {
    ($env:expr, $variant:path) => {
        if !matches!($env.call, $variant) {
            return $crate::status::ExitCode::FAILURE;
        }
    };
}

/// Reconcile to a state and yield the stack, or fail with `UNDI_INVALID_STATE`.
macro_rules! ensure_state {
    ($api:expr, $env:expr, $wanted:expr) => {
        match $api.stack_in($wanted) {
            Ok(stack) => stack,
            Err(err) => {
                log::debug!(" cannot reach {}: {}", $wanted, err);
                $env.status = $crate::status::Status::UNDI_INVALID_STATE;
                return $crate::status::ExitCode::FAILURE;
            }
        }
    };
}

/// The bound adapter; `Ready` guarantees one, but never trust it blindly.
macro_rules! bound_nic {
    ($nic:expr, $env:expr) => {
        match $nic {
            Some(nic) => nic,
            None => {
                $env.status = $crate::status::Status::UNDI_INVALID_STATE;
                return $crate::status::ExitCode::FAILURE;
            }
        }
    };
}

pub(crate) mod cached;
pub(crate) mod isr;
pub(crate) mod lifecycle;
pub(crate) mod tftp;
pub(crate) mod udp;
pub(crate) mod undi;

use crate::envelope::Envelope;
use crate::status::{ExitCode, Status};

/// Finish a call with `status`.
pub(crate) fn finish(env: &mut Envelope<'_>, status: Status) -> ExitCode {
    env.status = status;
    ExitCode::from(status.is_success())
}

/// Finish a call from a fallible step.
pub(crate) fn finish_with<E: Into<Status>>(env: &mut Envelope<'_>, result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => finish(env, Status::SUCCESS),
        Err(err) => finish(env, err.into()),
    }
}

/// Strip the NUL terminator (and anything after it) from a PXE string.
pub(crate) fn c_str(raw: &[u8]) -> &[u8] {
    raw.iter().position(|&b| b == 0).map_or(raw, |end| &raw[..end])
}
