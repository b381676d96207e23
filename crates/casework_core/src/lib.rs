//! Provide the pure semantic core of the casework test engine.
//!
//! This crate is intentionally small and dependency-light. It holds the deterministic pieces that both the lifecycle
//! engine and any out-of-process collaborator (reporters, IDE adapters, a child-process runner) need to agree on:
//! - the runtime type vocabulary and generic parameter resolution,
//! - test identity matching,
//! - fault records and lifecycle event shapes.
//!
//! ## Notes
//!
//! - This is a “semantic core” crate: **no IO**, no threads, no global state.
//! - Everything here is safe to call from any worker; nothing here can panic on user input.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod event;
pub mod fault;
pub mod generics;
pub mod pattern;
pub mod types;

pub use event::{ExecutionSummary, LifecycleEvent, TestName};
pub use fault::Fault;
pub use generics::{Resolution, TypeBinding, resolve};
pub use pattern::TestPattern;
pub use types::{Constraint, RuntimeType, TypeParam, TypeRef};
