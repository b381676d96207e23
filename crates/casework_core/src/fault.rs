//! Fault records: a raised error captured as data.
//!
//! [`Fault`] intentionally does not implement [`std::error::Error`]. That keeps the blanket
//! `impl<E: Error> From<E> for Fault` coherent, so test bodies returning `Result<(), Fault>` can use `?` on any error
//! type and still get the inner-fault chain from [`Error::source`].

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Type name given to faults recovered from a panic.
pub const PANIC_FAULT_TYPE: &str = "panic";

/// Frames whose symbol starts with one of these are engine or runtime plumbing, not user code.
const FILTERED_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "casework::engine::",
    "casework::capture::",
    "rust_begin_unwind",
    "__rust",
    "<alloc::",
    "<core::",
    "<std::",
];

/// A raised error captured as structured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Declared type of the raised error
    pub type_name: String,
    pub message: String,
    /// Stack trace with engine/runtime frames removed; may be empty
    pub stack_trace: String,
    pub inner: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: String::new(),
            inner: None,
        }
    }

    /// A fault with the conventional `panic` type name.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(PANIC_FAULT_TYPE, message)
    }

    pub fn with_stack_trace(mut self, trace: impl AsRef<str>) -> Self {
        self.stack_trace = filter_stack_trace(trace.as_ref());
        self
    }

    pub fn with_inner(mut self, inner: Fault) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Capture an error value, its static type name and its `source()` chain.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut fault = Self::new(std::any::type_name::<E>(), error.to_string());
        fault.inner = error.source().map(|source| Box::new(Self::from_source(source)));
        fault
    }

    fn from_source(error: &(dyn Error + 'static)) -> Self {
        // Source errors are type-erased; only their rendering survives.
        let mut fault = Self::new("source", error.to_string());
        fault.inner = error.source().map(|source| Box::new(Self::from_source(source)));
        fault
    }

    /// Iterate over this fault and its inner chain, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &Fault> {
        std::iter::successors(Some(self), |f| f.inner.as_deref())
    }

    pub fn is_panic(&self) -> bool {
        self.type_name == PANIC_FAULT_TYPE
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;
        if let Some(inner) = &self.inner {
            write!(f, "\n  ---> {}", inner)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> From<E> for Fault {
    fn from(error: E) -> Self {
        Fault::from_error(&error)
    }
}

/// Drop runtime and engine frames from a rendered backtrace.
///
/// Frames are recognised in the layout `std::backtrace::Backtrace` renders: a numbered symbol line (`  12: path::fn`)
/// followed by zero or more indented `at file:line` lines. Unrecognised text is kept as-is.
pub fn filter_stack_trace(trace: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;

    for line in trace.lines() {
        let trimmed = line.trim_start();
        if let Some(symbol) = frame_symbol(trimmed) {
            skipping = FILTERED_FRAME_PREFIXES.iter().any(|p| symbol.starts_with(p));
            if !skipping {
                kept.push(line);
            }
        } else if !(skipping && trimmed.starts_with("at ")) {
            skipping = false;
            kept.push(line);
        }
    }

    kept.join("\n")
}

fn frame_symbol(line: &str) -> Option<&str> {
    let (index, rest) = line.split_once(':')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim())
}
