//! Lifecycle events and run summaries.
//!
//! Events are immutable once created. They are the only thing the engine hands to the outside world, and they are
//! serializable so the same shapes can cross a process boundary unchanged.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fault::Fault;

/// Identity of a test case as reported to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestName {
    /// Fully-qualified declaring type
    pub class: String,
    /// Method name within the type
    pub method: String,
    /// Display name of the concrete case, including type and value arguments
    pub name: String,
}

impl TestName {
    pub fn new(class: impl Into<String>, method: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            name: name.into(),
        }
    }

    /// `Class.Method`, the identity the pattern matcher is applied to.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.class, self.method)
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One transition in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ExecutionStarted,
    TestStarted {
        test: TestName,
    },
    TestPassed {
        test: TestName,
        duration: Duration,
        output: String,
    },
    TestFailed {
        test: TestName,
        duration: Duration,
        output: String,
        /// Primary fault first, then secondary faults in the order they were raised
        faults: Vec<Fault>,
    },
    TestSkipped {
        test: TestName,
        duration: Duration,
        reason: Option<String>,
    },
    ExecutionCompleted {
        summary: ExecutionSummary,
    },
}

impl LifecycleEvent {
    pub fn test(&self) -> Option<&TestName> {
        match self {
            LifecycleEvent::TestStarted { test }
            | LifecycleEvent::TestPassed { test, .. }
            | LifecycleEvent::TestFailed { test, .. }
            | LifecycleEvent::TestSkipped { test, .. } => Some(test),
            LifecycleEvent::ExecutionStarted | LifecycleEvent::ExecutionCompleted { .. } => None,
        }
    }

    /// Duration of a completed case; `None` for non-terminal events.
    pub fn case_duration(&self) -> Option<Duration> {
        match self {
            LifecycleEvent::TestPassed { duration, .. }
            | LifecycleEvent::TestFailed { duration, .. }
            | LifecycleEvent::TestSkipped { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    pub fn is_case_result(&self) -> bool {
        self.case_duration().is_some()
    }
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Sum of all case durations
    pub duration: Duration,
}

impl ExecutionSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Fold one event into the tally. Non-result events are ignored.
    pub fn observe(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::TestPassed { duration, .. } => {
                self.passed += 1;
                self.duration += *duration;
            }
            LifecycleEvent::TestFailed { duration, .. } => {
                self.failed += 1;
                self.duration += *duration;
            }
            LifecycleEvent::TestSkipped { duration, .. } => {
                self.skipped += 1;
                self.duration += *duration;
            }
            _ => {}
        }
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped in {:.2}s",
            self.passed,
            self.failed,
            self.skipped,
            self.duration.as_secs_f64()
        )
    }
}
