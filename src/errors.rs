//! Engine defects.
//!
//! Anything a test, behavior, factory or argument source does wrong is a [`Fault`](casework_core::Fault) attached to
//! the affected cases. The errors here are different: they mean the engine's own bookkeeping is broken, and they are
//! the only errors that ever reach the driver.

use miette::Diagnostic;
use thiserror::Error;

use crate::engine::ClassState;

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("illegal lifecycle transition for `{class}`: {from:?} -> {to:?}")]
    #[diagnostic(
        code(casework::illegal_transition),
        help("this is a bookkeeping bug in casework, not a test failure")
    )]
    IllegalTransition { class: String, from: ClassState, to: ClassState },

    #[error("instance for `{class}` was lost while its cases were executing")]
    #[diagnostic(code(casework::instance_lost))]
    InstanceLost { class: String },

    #[error("`{class}` discovered {expected} case(s) but finalized {actual}")]
    #[diagnostic(code(casework::case_accounting))]
    CaseAccounting {
        class: String,
        expected: usize,
        actual: usize,
    },

    #[error("worker pool could not be started: {0}")]
    #[diagnostic(code(casework::worker_pool))]
    WorkerPool(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
