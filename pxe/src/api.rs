//! API entry: stack ownership and call dispatch.
//!
//! `PxeApi` is the single owner of the loaded stack. The firmware keeps one
//! instance behind a spin lock (`install` / `pxe_api_call` / `unload`);
//! tests and hosted tools can own their own.

extern crate alloc;
use alloc::sync::Arc;

use core::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::envelope::Envelope;
use crate::opcode::{Handler, Opcode};
use crate::stack::{PxeStack, StateError};
use crate::state::{LifecycleState, StateCell, StateObserver};
use crate::status::{ExitCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnloadError {
    #[error("no PXE stack loaded")]
    NotLoaded,
    #[error("stack still active: {0}")]
    StillActive(StateError),
}

/// Owner of the (at most one) loaded PXE stack.
pub struct PxeApi {
    stack: Option<PxeStack>,
}

impl PxeApi {
    pub const fn new() -> Self {
        Self { stack: None }
    }

    /// Load `stack`. Gives it back if one is already loaded.
    pub fn load(&mut self, stack: PxeStack) -> Result<(), PxeStack> {
        if self.stack.is_some() {
            return Err(stack);
        }
        log::info!("pxe: stack loaded");
        self.stack = Some(stack);
        Ok(())
    }

    /// Tear the stack down to `CanUnload` and hand it back for freeing.
    ///
    /// Leaves the stack in place if it cannot get there.
    pub fn unload(&mut self) -> Result<PxeStack, UnloadError> {
        let stack = self.stack.as_mut().ok_or(UnloadError::NotLoaded)?;
        stack.reconcile(LifecycleState::CanUnload).map_err(UnloadError::StillActive)?;
        log::info!("pxe: stack unloaded");
        self.stack.take().ok_or(UnloadError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.stack.is_some()
    }

    pub fn state(&self) -> Option<LifecycleState> {
        self.stack.as_ref().map(PxeStack::state)
    }

    pub fn observer(&self) -> Option<StateObserver> {
        self.stack.as_ref().map(PxeStack::observer)
    }

    pub fn stack(&self) -> Option<&PxeStack> {
        self.stack.as_ref()
    }

    pub fn stack_mut(&mut self) -> Option<&mut PxeStack> {
        self.stack.as_mut()
    }

    /// Drive the loaded stack to `wanted`.
    pub fn ensure_state(&mut self, wanted: LifecycleState) -> Result<(), StateError> {
        self.stack_in(wanted).map(|_| ())
    }

    /// Drive the loaded stack to `wanted` and lend it out.
    pub(crate) fn stack_in(&mut self, wanted: LifecycleState) -> Result<&mut PxeStack, StateError> {
        let stack = self.stack.as_mut().ok_or(StateError::NoStack)?;
        stack.reconcile(wanted)?;
        Ok(stack)
    }

    /// Run one PXE API call.
    pub fn dispatch(&mut self, opcode: u16, env: &mut Envelope<'_>) -> ExitCode {
        self.dispatch_with(opcode, env, Opcode::handler)
    }

    fn dispatch_with(
        &mut self,
        opcode: u16,
        env: &mut Envelope<'_>,
        table: impl Fn(Opcode) -> Handler,
    ) -> ExitCode {
        // Whatever the handler does, the caller never sees a stale status.
        env.status = Status::FAILURE;

        let exit = match Opcode::from_raw(opcode) {
            Some(op) => {
                log::trace!("[{}", op.name());
                table(op)(self, env)
            }
            None => {
                log::trace!("[PXENV_UNKNOWN_{:04x}", opcode);
                env.status = Status::UNSUPPORTED;
                ExitCode::FAILURE
            }
        };

        if !env.status.is_success() {
            log::trace!(" {:x}", env.status);
        }
        if !exit.is_success() {
            log::trace!("{}", if exit == ExitCode::FAILURE { " err" } else { " ??" });
        }
        log::trace!("]");
        exit
    }
}

impl Default for PxeApi {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GLOBAL ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════

static PXE: spin::Mutex<PxeApi> = spin::Mutex::new(PxeApi::new());

/// State cell of the installed stack, readable without `PXE`.
static STATE: spin::Once<Arc<StateCell>> = spin::Once::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the firmware-wide stack. Gives it back if one is already installed.
pub fn install(mut stack: PxeStack) -> Result<(), PxeStack> {
    let mut api = PXE.lock();
    if api.is_loaded() {
        return Err(stack);
    }
    stack.adopt_state_cell(STATE.call_once(|| Arc::new(StateCell::new())).clone());
    api.load(stack)?;
    INSTALLED.store(true, Ordering::Release);
    Ok(())
}

/// Firmware entry for a PXE API call.
///
/// The real-mode thunk translates the caller's parameter block into an
/// `Envelope` and back; everything else happens here.
pub fn pxe_api_call(opcode: u16, env: &mut Envelope<'_>) -> ExitCode {
    PXE.lock().dispatch(opcode, env)
}

/// Unload the firmware-wide stack.
pub fn unload() -> Result<PxeStack, UnloadError> {
    let stack = PXE.lock().unload()?;
    INSTALLED.store(false, Ordering::Release);
    Ok(stack)
}

/// State view for the NIC interrupt handler; `None` while nothing is installed.
///
/// Never touches the API lock: the interrupt may arrive while a call holds it.
pub fn state_observer() -> Option<StateObserver> {
    if !INSTALLED.load(Ordering::Acquire) {
        return None;
    }
    STATE.get().map(|cell| StateObserver::new(cell.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Call, StartUndi, UndiGetInformation};
    use crate::testing::{Event, Harness};
    use serial_test::serial;
    use LifecycleState::{CanUnload, Midway, Ready};

    fn stub(_: &mut PxeApi, _: &mut Envelope<'_>) -> ExitCode {
        ExitCode::SUCCESS
    }

    fn bogus_exit(_: &mut PxeApi, env: &mut Envelope<'_>) -> ExitCode {
        env.status = Status::SUCCESS;
        ExitCode(0x55)
    }

    #[test]
    fn test_ensure_state_without_stack() {
        let mut api = PxeApi::new();
        assert_eq!(api.ensure_state(Midway), Err(StateError::NoStack));
        assert_eq!(api.unload().err(), Some(UnloadError::NotLoaded));
    }

    #[test]
    fn test_unknown_opcode() {
        let (mut api, _h) = Harness::api();
        let mut env = Envelope::new(Call::UndiStartup);
        env.status = Status(0xBEEF);

        assert_eq!(api.dispatch(0xFFFF, &mut env), ExitCode::FAILURE);
        assert_eq!(env.status, Status::UNSUPPORTED);
        // Unknown opcodes never touch the lifecycle.
        assert_eq!(api.state(), Some(CanUnload));
    }

    #[test]
    fn test_stubbed_handler_leaves_generic_failure() {
        let (mut api, _h) = Harness::api();
        let mut env = Envelope::new(Call::UndiStartup);
        env.status = Status(0x1234);

        let exit = api.dispatch_with(Opcode::UndiStartup.raw(), &mut env, |_| stub);
        assert_eq!(exit, ExitCode::SUCCESS);
        assert_eq!(env.status, Status::FAILURE);
    }

    #[test]
    fn test_non_canonical_exit_passes_through() {
        let (mut api, _h) = Harness::api();
        let mut env = Envelope::new(Call::UndiStartup);
        let exit = api.dispatch_with(Opcode::UndiStartup.raw(), &mut env, |_| bogus_exit);
        assert_eq!(exit, ExitCode(0x55));
        assert!(!exit.is_canonical());
    }

    #[test]
    fn test_mismatched_call_keeps_generic_failure() {
        let (mut api, h) = Harness::api();
        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(api.dispatch(Opcode::UndiGetInformation.raw(), &mut env), ExitCode::FAILURE);
        assert_eq!(env.status, Status::FAILURE);
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_no_stack_reports_invalid_state() {
        let mut api = PxeApi::new();
        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(api.dispatch(Opcode::UndiStartup.raw(), &mut env), ExitCode::FAILURE);
        assert_eq!(env.status, Status::UNDI_INVALID_STATE);
    }

    #[test]
    fn test_out_of_order_call_reaches_ready() {
        let (mut api, h) = Harness::api();
        let mut env = Envelope::new(Call::UndiGetInformation(UndiGetInformation::default()));

        assert_eq!(api.dispatch(Opcode::UndiGetInformation.raw(), &mut env), ExitCode::SUCCESS);
        assert_eq!(env.status, Status::SUCCESS);
        assert_eq!(api.state(), Some(Ready));
        assert_eq!(h.events(), vec![Event::Hook, Event::IrqMasked, Event::NicUp]);
    }

    #[test]
    fn test_ready_without_nic_is_invalid_state() {
        let (mut api, _h) = Harness::api_without_nic();
        let mut env = Envelope::new(Call::UndiGetInformation(UndiGetInformation::default()));

        assert_eq!(api.dispatch(Opcode::UndiGetInformation.raw(), &mut env), ExitCode::FAILURE);
        assert_eq!(env.status, Status::UNDI_INVALID_STATE);
        assert!(api.state() <= Some(Midway));
    }

    #[test]
    fn test_round_trip_teardown_and_rebuild() {
        let (mut api, h) = Harness::api();
        api.ensure_state(Ready).unwrap();
        api.ensure_state(CanUnload).unwrap();
        h.clear_events();

        let mut env = Envelope::new(Call::StartUndi(StartUndi { pci_bus_dev_func: StartUndi::NO_DEVICE }));
        assert_eq!(api.dispatch(Opcode::StartUndi.raw(), &mut env), ExitCode::SUCCESS);
        assert_eq!(env.status, Status::SUCCESS);
        assert_eq!(api.state(), Some(Midway));
        assert_eq!(h.events(), vec![Event::Hook]);
    }

    #[test]
    fn test_unload_requires_can_unload() {
        let (mut api, h) = Harness::api();
        api.ensure_state(Ready).unwrap();
        h.gate_control().fail_unhook = true;

        assert!(matches!(api.unload(), Err(UnloadError::StillActive(_))));
        assert!(api.is_loaded());

        h.gate_control().fail_unhook = false;
        let stack = api.unload().ok().expect("unloaded");
        assert_eq!(stack.state(), CanUnload);
        assert!(!api.is_loaded());
    }

    #[test]
    fn test_second_load_is_refused() {
        let (mut api, _h) = Harness::api();
        let extra = Harness::new().stack;
        assert!(api.load(extra).is_err());
    }

    #[test]
    #[serial]
    fn test_global_install_and_unload() {
        let h = Harness::new();
        assert!(install(h.stack).is_ok());
        let observer = state_observer().expect("observer");

        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(pxe_api_call(Opcode::UndiStartup.raw(), &mut env), ExitCode::SUCCESS);
        assert_eq!(observer.state(), Midway);

        assert!(unload().is_ok());
        assert!(state_observer().is_none());
        assert_eq!(observer.state(), CanUnload);
    }

    #[test]
    #[serial]
    fn test_observer_available_while_call_in_progress() {
        use std::sync::mpsc;
        use std::time::Duration;

        assert!(install(Harness::new().stack).is_ok());
        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(pxe_api_call(Opcode::UndiStartup.raw(), &mut env), ExitCode::SUCCESS);

        let held = PXE.lock();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(state_observer().map(|observer| observer.state()));
        });
        let seen = rx.recv_timeout(Duration::from_secs(2));
        drop(held);

        assert_eq!(seen, Ok(Some(Midway)));
        assert!(unload().is_ok());
    }

    #[test]
    #[serial]
    fn test_second_install_keeps_first_stack() {
        assert!(install(Harness::new().stack).is_ok());
        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(pxe_api_call(Opcode::UndiStartup.raw(), &mut env), ExitCode::SUCCESS);

        let refused = install(Harness::new().stack).expect_err("already installed");
        assert_eq!(refused.state(), CanUnload);
        assert_eq!(state_observer().map(|o| o.state()), Some(Midway));
        assert!(unload().is_ok());
    }

    #[test]
    #[serial]
    fn test_global_call_without_stack() {
        let mut env = Envelope::new(Call::UndiStartup);
        assert_eq!(pxe_api_call(Opcode::UndiStartup.raw(), &mut env), ExitCode::FAILURE);
        assert_eq!(env.status, Status::UNDI_INVALID_STATE);
    }
}
