//! Innermost invocation and panic containment.
//!
//! Everything user-supplied (bodies, constructors, behavior layers, argument sources, listeners aside) runs inside
//! [`guarded`], which turns both `Err` returns and panics into a [`Fault`]. A process-wide panic hook, installed once,
//! keeps the default "thread panicked" report off stderr while a guarded region is active on the current thread and
//! stashes the panic location and backtrace for the fault instead.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use casework_core::Fault;

use super::behavior::CaseContext;
use super::case::Case;
use crate::capture;
use crate::model::{Invocation, TestMethod};

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let message = payload_message(info.payload());
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            if capture::is_capturing() {
                capture::write(&format!("panicked at {}:\n{}\n", location, message));
            }
            let backtrace = Backtrace::capture();
            let trace = match backtrace.status() {
                BacktraceStatus::Captured => backtrace.to_string(),
                _ => format!("   at {}", location),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(trace));
        }));
    });
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        GUARD_DEPTH.with(|d| d.set(d.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// Run `f`, turning a panic into a `panic` fault.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, Fault>) -> Result<T, Fault> {
    install_hook();
    let _depth = DepthGuard::enter();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let fault = Fault::panic(payload_message(payload.as_ref()));
            match LAST_PANIC.with(|slot| slot.borrow_mut().take()) {
                Some(trace) => Err(fault.with_stack_trace(trace)),
                None => Err(fault),
            }
        }
    }
}

/// Faults detectable before the body is called.
fn preflight(method: &TestMethod, case: &Case) -> Result<(), Fault> {
    if case.args().len() != method.parameter_count() {
        return Err(Fault::new("ParameterCountMismatch", "Parameter count mismatch."));
    }
    if !case.resolution().is_complete() {
        return Err(Fault::new(
            "GenericResolution",
            format!(
                "Could not resolve type parameters for generic method. Unresolved: {}",
                case.resolution().open_parameters().join(", ")
            ),
        ));
    }
    Ok(())
}

/// The innermost behavior: call the test method with the case's bound arguments.
pub(crate) fn invoke(context: &mut CaseContext) {
    let (class, instance, case) = context.parts();
    let Some(method) = class.methods().get(case.method_index()) else {
        case.fail(Fault::new(
            "MethodNotFound",
            format!("`{}` has no method at index {}", class.full_name(), case.method_index()),
        ));
        return;
    };
    if let Err(fault) = preflight(method, case) {
        case.fail(fault);
        return;
    }

    let type_args = case.resolution().type_arguments();
    let outcome = {
        let invocation = Invocation {
            case_name: &case.name().name,
            args: case.args(),
            type_params: method.type_params(),
            type_args: &type_args,
        };
        guarded(|| method.call(instance, &invocation))
    };
    if let Err(fault) = outcome {
        case.fail(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_passes_results_through() {
        assert_eq!(guarded(|| Ok::<_, Fault>(7)).unwrap(), 7);
        let fault = guarded(|| Err::<(), _>(Fault::new("Assert", "nope"))).unwrap_err();
        assert_eq!(fault.type_name, "Assert");
    }

    #[test]
    fn test_guarded_converts_panics() {
        let fault = guarded(|| -> Result<(), Fault> { panic!("exploded: {}", 42) }).unwrap_err();
        assert!(fault.is_panic());
        assert_eq!(fault.message, "exploded: 42");
    }

    #[test]
    fn test_panic_message_lands_in_capture() {
        let scope = capture::scope();
        let _ = guarded(|| -> Result<(), Fault> { panic!("visible") });
        let output = scope.finish();
        assert!(output.contains("visible"), "output was {:?}", output);
    }

    #[test]
    fn test_depth_is_restored_after_panic() {
        let _ = guarded(|| -> Result<(), Fault> { panic!("once") });
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
    }
}
