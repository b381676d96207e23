//! The lifecycle engine.
//!
//! [`Engine::run_class`] takes one discovered class through its lifecycle:
//!
//! 1. **Discovery of cases**: skipped methods become skip cases; every other method's argument sources are drained
//!    into concrete cases, with type parameters resolved per argument list.
//! 2. **Execution**: the type-level behavior chain wraps construction, the instance-level chain wraps the cases
//!    hosted by one instance, and the case-level chain wraps each invocation.
//! 3. **Finalization**: overhead is apportioned over the cases and completion events are recorded.
//!
//! Every fault lands on a case. The only errors returned are [`EngineError`]s, which mean the engine's own
//! bookkeeping broke.
//!
//! ## Notes
//!
//! - A behavior layer that never calls its continuation leaves its cases unattempted, and unattempted cases are
//!   reported as **passed**.
//! - Cases of one class run sequentially on the calling thread; instances are never shared across threads.

mod behavior;
mod case;
mod invoke;


use std::sync::Arc;
use std::time::{Duration, Instant};

use casework_core::{ExecutionSummary, Fault, Resolution, TypeRef, resolve};

use crate::capture;
use crate::config::{ConstructionPolicy, EngineConfig};
use crate::errors::{EngineError, EngineResult};
use crate::model::{Arg, ArgList, ArgumentSource, TestClass, TestMethod};
use crate::recorder::Recorder;

pub use behavior::{Behavior, CaseContext, ClassContext, FixtureContext, Governed, Paired, SetupTeardown};
pub use case::{Case, Disposition};

use case::apportion;
use invoke::guarded;

/// Lifecycle state of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    NotStarted,
    Constructing,
    Executing,
    TearingDown,
    Finalized,
}

impl ClassState {
    pub fn can_transition_to(self, next: ClassState) -> bool {
        use ClassState::*;
        matches!(
            (self, next),
            (NotStarted, Constructing)
                | (NotStarted, Finalized)
                | (Constructing, Executing)
                | (Constructing, TearingDown)
                | (Executing, Executing)
                | (Executing, TearingDown)
                | (TearingDown, Constructing)
                | (TearingDown, Finalized)
        )
    }
}

/// Validated state tracker for one class run.
#[derive(Debug)]
struct Lifecycle {
    class: String,
    state: ClassState,
}

impl Lifecycle {
    fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            state: ClassState::NotStarted,
        }
    }

    fn transition(&mut self, next: ClassState) -> EngineResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::IllegalTransition {
                class: self.class.clone(),
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(class = %self.class, from = ?self.state, to = ?next, "class state");
        self.state = next;
        Ok(())
    }
}

/// The finalized outcome of one class.
#[derive(Debug, Clone)]
pub struct ClassReport {
    pub class: String,
    /// Every case in discovery order, skipped ones included
    pub cases: Vec<Case>,
    /// Wall time from the start of the type-level chain to finalization
    pub duration: Duration,
}

impl ClassReport {
    pub fn passed(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Failed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&Disposition) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.disposition())).count()
    }

    /// Fold this class's cases into `summary`, the same way their result events would be.
    pub fn tally_into(&self, summary: &mut ExecutionSummary) {
        for case in &self.cases {
            match case.disposition() {
                Disposition::Passed => summary.passed += 1,
                Disposition::Failed => summary.failed += 1,
                // Skipped events always carry a zero duration
                Disposition::Skipped { .. } => {
                    summary.skipped += 1;
                    continue;
                }
            }
            summary.duration += case.duration();
        }
    }
}

/// Runs classes against one configuration, reporting into one recorder.
pub struct Engine<'a> {
    config: &'a EngineConfig,
    recorder: &'a Recorder,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a EngineConfig, recorder: &'a Recorder) -> Self {
        Self { config, recorder }
    }

    /// Run every method of `class` and record its events.
    ///
    /// ## Errors
    /// - [`EngineError`] only for bookkeeping defects. Test, behavior and source faults are recorded on cases.
    #[tracing::instrument(skip_all, fields(class = %class.full_name(), policy = %self.config.construction))]
    pub fn run_class(&self, class: Arc<TestClass>) -> EngineResult<ClassReport> {
        let mut lifecycle = Lifecycle::new(class.full_name());
        let (skipped, cases) = self.discover(&class);
        let expected = skipped.len() + cases.len();
        tracing::debug!(cases = cases.len(), skipped = skipped.len(), "discovered cases");

        for case in &skipped {
            self.recorder.record(case.completion_event());
        }

        let (blocked, runnable): (Vec<Case>, Vec<Case>) = cases.into_iter().partition(Case::is_blocked);
        let started = Instant::now();
        let mut finished = if runnable.is_empty() {
            lifecycle.transition(ClassState::Finalized)?;
            Vec::new()
        } else {
            let mut context = ClassContext::new(Arc::clone(&class), runnable);
            let mut defect = None;
            behavior::drive(&self.config.class_behaviors, &mut context, &mut |context: &mut ClassContext| {
                if defect.is_some() {
                    return;
                }
                if let Err(err) = self.execute(context, &mut lifecycle) {
                    defect = Some(err);
                }
            });
            if let Some(err) = defect {
                return Err(err);
            }
            lifecycle.transition(ClassState::Finalized)?;
            context.into_cases()
        };
        let duration = started.elapsed();
        apportion(&mut finished, duration);

        finished.extend(blocked);
        finished.sort_by_key(Case::ordinal);
        let actual = skipped.len() + finished.len();
        if actual != expected {
            return Err(EngineError::CaseAccounting {
                class: class.full_name().to_string(),
                expected,
                actual,
            });
        }

        for case in &mut finished {
            if case.start() {
                self.recorder.record(case.started_event());
            }
            self.recorder.record(case.completion_event());
        }

        let mut cases: Vec<Case> = skipped.into_iter().chain(finished).collect();
        cases.sort_by_key(Case::ordinal);
        Ok(ClassReport {
            class: class.full_name().to_string(),
            cases,
            duration,
        })
    }

    /// Split `class` into skip cases and runnable (or blocked) cases, in discovery order.
    fn discover(&self, class: &TestClass) -> (Vec<Case>, Vec<Case>) {
        let mut skipped = Vec::new();
        let mut cases = Vec::new();
        let mut ordinal = 0;
        for (index, method) in class.methods().iter().enumerate() {
            let (mut lists, failure) = match guarded(|| Ok(self.config.skip_reason(class, method))) {
                Ok(Some(reason)) => {
                    skipped.push(Case::skipped(class, ordinal, index, reason));
                    ordinal += 1;
                    continue;
                }
                Ok(None) => self.generate(method),
                Err(fault) => (Vec::new(), Some(fault)),
            };
            if lists.is_empty() {
                lists.push(Vec::new());
            }
            for args in lists {
                let resolution = bind(method, &args);
                let mut case = Case::new(class, ordinal, index, args, resolution);
                if let Some(fault) = &failure {
                    case.block(fault.clone());
                }
                cases.push(case);
                ordinal += 1;
            }
        }
        (skipped, cases)
    }

    /// Drain the method's sources, then the configured ones for parameterized methods.
    ///
    /// Stops at the first infrastructure fault, returning what was produced before it.
    fn generate(&self, method: &TestMethod) -> (Vec<ArgList>, Option<Fault>) {
        let extra: &[Arc<dyn ArgumentSource>] = if method.parameter_count() > 0 {
            &self.config.argument_sources
        } else {
            &[]
        };
        let mut lists = Vec::new();
        for source in method.sources().iter().chain(extra) {
            let outcome = guarded(|| {
                for item in source.arguments(method) {
                    lists.push(item?);
                }
                Ok(())
            });
            if let Err(fault) = outcome {
                tracing::debug!(method = method.name(), fault = %fault, "argument source failed");
                return (lists, Some(fault));
            }
        }
        (lists, None)
    }

    /// Core of the type-level chain: construct instances per the policy and run the instance-level chain.
    fn execute(&self, context: &mut ClassContext, lifecycle: &mut Lifecycle) -> EngineResult<()> {
        let class = context.shared_class();
        let cases = context.take_cases();
        let done = match self.config.construction {
            ConstructionPolicy::Shared => self.run_fixture(&class, cases, lifecycle)?,
            ConstructionPolicy::PerCase => {
                let mut done = Vec::with_capacity(cases.len());
                for case in cases {
                    let started = Instant::now();
                    let mut hosted = self.run_fixture(&class, vec![case], lifecycle)?;
                    // Construction and disposal belong to the only case this instance hosted.
                    let invoked: Duration = hosted.iter().map(Case::duration).sum();
                    let overhead = started.elapsed().saturating_sub(invoked);
                    if let Some(case) = hosted.first_mut() {
                        case.add_time(overhead);
                    }
                    done.extend(hosted);
                }
                done
            }
        };
        context.restore_cases(done);
        Ok(())
    }

    /// Construct one instance, run `cases` through the instance-level chain, dispose.
    fn run_fixture(&self, class: &Arc<TestClass>, mut cases: Vec<Case>, lifecycle: &mut Lifecycle) -> EngineResult<Vec<Case>> {
        lifecycle.transition(ClassState::Constructing)?;
        let instance = match guarded(|| self.config.construct(class)) {
            Ok(instance) => instance,
            Err(fault) => {
                tracing::debug!(fault = %fault, "construction failed");
                for case in &mut cases {
                    case.fail(fault.clone());
                }
                lifecycle.transition(ClassState::TearingDown)?;
                return Ok(cases);
            }
        };

        let mut fixture = FixtureContext::new(Arc::clone(class), instance, cases);
        let mut defect = None;
        behavior::drive(&self.config.fixture_behaviors, &mut fixture, &mut |fixture: &mut FixtureContext| {
            if defect.is_some() {
                return;
            }
            if let Err(err) = self.run_cases(fixture, lifecycle) {
                defect = Some(err);
            }
        });
        if let Some(err) = defect {
            return Err(err);
        }

        lifecycle.transition(ClassState::TearingDown)?;
        let (instance, mut cases) = fixture.into_parts();
        let mut instance = instance.ok_or_else(|| EngineError::InstanceLost {
            class: class.full_name().to_string(),
        })?;
        if let Err(fault) = guarded(|| class.dispose(&mut instance)) {
            tracing::debug!(fault = %fault, "disposal failed");
            for case in &mut cases {
                case.fail(fault.clone());
            }
        }
        drop(instance);
        Ok(cases)
    }

    /// Core of the instance-level chain: run each case through the case-level chain.
    fn run_cases(&self, fixture: &mut FixtureContext, lifecycle: &mut Lifecycle) -> EngineResult<()> {
        let class = fixture.shared_class();
        let mut instance = fixture.take_instance().ok_or_else(|| EngineError::InstanceLost {
            class: class.full_name().to_string(),
        })?;
        let cases = fixture.take_cases();
        let mut done = Vec::with_capacity(cases.len());
        for mut case in cases {
            lifecycle.transition(ClassState::Executing)?;
            if case.start() {
                self.recorder.record(case.started_event());
            }
            let started = Instant::now();
            let output = capture::scope();
            let mut context = CaseContext::new(Arc::clone(&class), instance, case);
            behavior::drive(&self.config.case_behaviors, &mut context, &mut invoke::invoke);
            let text = output.finish();
            (instance, case) = context.into_parts();
            case.append_output(&text);
            case.add_time(started.elapsed());
            done.push(case);
        }
        fixture.put_back(instance, done);
        Ok(())
    }
}

/// Resolve `method`'s type parameters from one argument list.
fn bind(method: &TestMethod, args: &[Option<Arg>]) -> Resolution {
    let runtime: Vec<Option<&TypeRef>> = args.iter().map(|a| a.as_ref().map(Arg::runtime_type)).collect();
    resolve(method.type_params(), &method.parameter_types(), &runtime)
}
