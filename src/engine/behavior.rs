//! The behavior chain: user layers wrapped around the engine's own work.
//!
//! A chain is an ordered slice of [`Behavior`] objects, outermost first. [`drive`] calls layer `i` and hands it a
//! continuation that drives layer `i + 1`; the last continuation is the engine core. Three chains exist, one per
//! context: type level ([`ClassContext`]), instance level ([`FixtureContext`]) and case level ([`CaseContext`]).
//!
//! Faults never unwind through the chain. A layer that returns `Err` (or panics) has that fault appended to every
//! case its context governs; the continuation returns `()` because whatever happened deeper is already recorded on
//! the cases.
//!
//! A layer that never calls `next` leaves its cases untouched, and untouched cases are reported as passed.

use std::any::Any;
use std::sync::Arc;

use casework_core::Fault;

use super::case::Case;
use super::invoke::guarded;
use crate::model::{Instance, TestClass};

/// One layer of a behavior chain.
pub trait Behavior<C>: Send + Sync {
    /// Run around `next`. Calling `next` zero times means the governed cases are never attempted.
    fn wrap(&self, context: &mut C, next: &mut dyn FnMut(&mut C)) -> Result<(), Fault>;
}

impl<C, F> Behavior<C> for F
where
    F: Fn(&mut C, &mut dyn FnMut(&mut C)) -> Result<(), Fault> + Send + Sync,
{
    fn wrap(&self, context: &mut C, next: &mut dyn FnMut(&mut C)) -> Result<(), Fault> {
        self(context, next)
    }
}

/// A setup/teardown pair that reports faults as a list instead of failing fast.
pub trait SetupTeardown<C>: Send + Sync {
    fn setup(&self, context: &mut C) -> Vec<Fault>;

    fn teardown(&self, _context: &mut C) -> Vec<Fault> {
        Vec::new()
    }
}

/// Adapts a [`SetupTeardown`] pair into a [`Behavior`] layer.
///
/// Setup faults fail the governed cases and skip both the inner chain and teardown. Otherwise teardown runs after the
/// inner chain whatever its outcome, and its faults are appended to every governed case.
pub struct Paired<P>(pub P);

impl<C: Governed, P: SetupTeardown<C>> Behavior<C> for Paired<P> {
    fn wrap(&self, context: &mut C, next: &mut dyn FnMut(&mut C)) -> Result<(), Fault> {
        let setup = fault_list(|| self.0.setup(context));
        if !setup.is_empty() {
            setup.into_iter().for_each(|fault| context.fail_all(fault));
            return Ok(());
        }
        next(context);
        for fault in fault_list(|| self.0.teardown(context)) {
            context.fail_all(fault);
        }
        Ok(())
    }
}

fn fault_list(f: impl FnOnce() -> Vec<Fault>) -> Vec<Fault> {
    guarded(|| Ok(f())).unwrap_or_else(|fault| vec![fault])
}

/// A context whose cases can be failed as a group.
pub trait Governed {
    /// Append `fault` to every case this context governs.
    fn fail_all(&mut self, fault: Fault);
}

/// Drive `layers` outermost first, finishing with `core`.
pub(crate) fn drive<C: Governed>(layers: &[Arc<dyn Behavior<C>>], context: &mut C, core: &mut dyn FnMut(&mut C)) {
    let Some((layer, inner)) = layers.split_first() else {
        core(context);
        return;
    };
    let outcome = guarded(|| layer.wrap(context, &mut |context: &mut C| drive(inner, context, core)));
    if let Err(fault) = outcome {
        tracing::debug!(fault = %fault, "behavior layer faulted");
        context.fail_all(fault);
    }
}

// ============================================================================
// Contexts
// ============================================================================

/// Type-level context: every runnable case of one class.
pub struct ClassContext {
    class: Arc<TestClass>,
    cases: Vec<Case>,
}

impl ClassContext {
    pub(crate) fn new(class: Arc<TestClass>, cases: Vec<Case>) -> Self {
        Self { class, cases }
    }

    pub fn class(&self) -> &TestClass {
        &self.class
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub(crate) fn shared_class(&self) -> Arc<TestClass> {
        Arc::clone(&self.class)
    }

    pub(crate) fn take_cases(&mut self) -> Vec<Case> {
        std::mem::take(&mut self.cases)
    }

    pub(crate) fn restore_cases(&mut self, cases: Vec<Case>) {
        self.cases.extend(cases);
    }

    pub(crate) fn into_cases(self) -> Vec<Case> {
        self.cases
    }
}

impl Governed for ClassContext {
    fn fail_all(&mut self, fault: Fault) {
        fail_each(&mut self.cases, fault);
    }
}

/// Instance-level context: one constructed instance and the cases it hosts.
pub struct FixtureContext {
    class: Arc<TestClass>,
    instance: Option<Instance>,
    cases: Vec<Case>,
}

impl FixtureContext {
    pub(crate) fn new(class: Arc<TestClass>, instance: Instance, cases: Vec<Case>) -> Self {
        Self {
            class,
            instance: Some(instance),
            cases,
        }
    }

    pub fn class(&self) -> &TestClass {
        &self.class
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// The instance as its concrete fixture type.
    pub fn instance_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.instance.as_mut()?.downcast_mut::<T>()
    }

    pub(crate) fn shared_class(&self) -> Arc<TestClass> {
        Arc::clone(&self.class)
    }

    pub(crate) fn take_instance(&mut self) -> Option<Instance> {
        self.instance.take()
    }

    pub(crate) fn take_cases(&mut self) -> Vec<Case> {
        std::mem::take(&mut self.cases)
    }

    pub(crate) fn put_back(&mut self, instance: Instance, cases: Vec<Case>) {
        self.instance = Some(instance);
        self.cases.extend(cases);
    }

    pub(crate) fn into_parts(self) -> (Option<Instance>, Vec<Case>) {
        (self.instance, self.cases)
    }
}

impl Governed for FixtureContext {
    fn fail_all(&mut self, fault: Fault) {
        fail_each(&mut self.cases, fault);
    }
}

/// Case-level context: one case and the instance it runs on.
pub struct CaseContext {
    class: Arc<TestClass>,
    instance: Instance,
    case: Case,
}

impl CaseContext {
    pub(crate) fn new(class: Arc<TestClass>, instance: Instance, case: Case) -> Self {
        Self { class, instance, case }
    }

    pub fn class(&self) -> &TestClass {
        &self.class
    }

    pub fn case(&self) -> &Case {
        &self.case
    }

    pub fn instance_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.instance.downcast_mut::<T>()
    }

    pub(crate) fn parts(&mut self) -> (&TestClass, &mut Instance, &mut Case) {
        (self.class.as_ref(), &mut self.instance, &mut self.case)
    }

    pub(crate) fn into_parts(self) -> (Instance, Case) {
        (self.instance, self.case)
    }
}

impl Governed for CaseContext {
    fn fail_all(&mut self, fault: Fault) {
        self.case.fail(fault);
    }
}

fn fail_each(cases: &mut [Case], fault: Fault) {
    for case in cases {
        case.fail(fault.clone());
    }
}
