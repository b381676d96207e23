#![forbid(unsafe_code)]
//! casework: a test lifecycle engine
//!
//! Given discovered test classes, casework expands their methods into concrete cases, constructs instances under a
//! configurable policy, runs every case through a user-extensible behavior chain, and reports lifecycle events through
//! a serialized recorder. The deterministic pieces (identity matching, generic resolution, fault and event shapes)
//! live in `casework_core`.
//!
//! ## Panic Policy
//!
//! - **Production code**: `Result` / `Option` with `?`. The crate denies `clippy::unwrap_used` and
//!   `clippy::expect_used`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - **User code**: panics raised by test bodies, behaviors, factories and argument sources are caught and recorded as
//!   `panic` faults on the affected cases. They never unwind into the driver.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod capture;
pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod recorder;
pub mod remote;
pub mod runner;

pub use casework_core::{
    ExecutionSummary, Fault, LifecycleEvent, Resolution, TestName, TestPattern, TypeBinding, TypeParam, TypeRef,
};
pub use config::{ConstructionPolicy, EngineConfig, InstanceFactory, RunSettings, SkipPolicy};
pub use engine::{
    Behavior, Case, CaseContext, ClassContext, ClassReport, ClassState, Disposition, Engine, FixtureContext, Governed,
    Paired, SetupTeardown,
};
pub use errors::{EngineError, EngineResult};
pub use model::{Arg, ArgList, ArgumentSource, ClassBuilder, FnArguments, Invocation, MethodSpec, StaticArguments, TestClass, TestMethod};
pub use recorder::{Listener, Recorder};
pub use runner::Runner;
