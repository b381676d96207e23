//! Engine configuration.
//!
//! [`EngineConfig`] carries everything the lifecycle engine takes from outside: the construction policy, the skip
//! policy, an optional instance factory, the behavior chain and any extra argument sources. [`RunSettings`] is the
//! plain-data subset a driver may load from a file or the environment.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use casework_core::Fault;
use serde::{Deserialize, Serialize};

use crate::engine::{Behavior, CaseContext, ClassContext, FixtureContext, Paired, SetupTeardown};
use crate::model::{ArgumentSource, Instance, TestClass, TestMethod};

/// Environment variable overriding the construction policy (`per_case` or `shared`).
pub const CONSTRUCTION_ENV: &str = "CASEWORK_CONSTRUCTION";
/// Environment variable overriding parallel class execution (`true`/`false`/`1`/`0`).
pub const PARALLEL_ENV: &str = "CASEWORK_PARALLEL";

/// How many instances a test class gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionPolicy {
    /// Construct and dispose an instance around every case
    #[default]
    PerCase,
    /// Construct once before the first case, dispose once after the last
    Shared,
}

impl FromStr for ConstructionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_case" | "per-case" | "percase" => Ok(ConstructionPolicy::PerCase),
            "shared" => Ok(ConstructionPolicy::Shared),
            other => Err(format!("unknown construction policy `{}` (expected `per_case` or `shared`)", other)),
        }
    }
}

impl fmt::Display for ConstructionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionPolicy::PerCase => write!(f, "per_case"),
            ConstructionPolicy::Shared => write!(f, "shared"),
        }
    }
}

/// Decide which tests are skipped before anything is constructed.
pub trait SkipPolicy: Send + Sync {
    fn should_skip(&self, class: &TestClass, method: &TestMethod) -> bool;

    fn reason(&self, _class: &TestClass, _method: &TestMethod) -> Option<String> {
        None
    }
}

/// [`SkipPolicy`] built from a predicate and a reason function.
pub struct SkipWhen<P, R> {
    predicate: P,
    reason: R,
}

impl<P, R> SkipPolicy for SkipWhen<P, R>
where
    P: Fn(&TestClass, &TestMethod) -> bool + Send + Sync,
    R: Fn(&TestClass, &TestMethod) -> Option<String> + Send + Sync,
{
    fn should_skip(&self, class: &TestClass, method: &TestMethod) -> bool {
        (self.predicate)(class, method)
    }

    fn reason(&self, class: &TestClass, method: &TestMethod) -> Option<String> {
        (self.reason)(class, method)
    }
}

/// Custom construction of test instances.
pub trait InstanceFactory: Send + Sync {
    fn create(&self, class: &TestClass) -> Result<Instance, Fault>;
}

impl<F> InstanceFactory for F
where
    F: Fn(&TestClass) -> Result<Instance, Fault> + Send + Sync,
{
    fn create(&self, class: &TestClass) -> Result<Instance, Fault> {
        self(class)
    }
}

/// Engine configuration
#[derive(Clone, Default)]
pub struct EngineConfig {
    /// Instance construction policy
    pub construction: ConstructionPolicy,
    pub(crate) skip: Option<Arc<dyn SkipPolicy>>,
    pub(crate) factory: Option<Arc<dyn InstanceFactory>>,
    pub(crate) class_behaviors: Vec<Arc<dyn Behavior<ClassContext>>>,
    pub(crate) fixture_behaviors: Vec<Arc<dyn Behavior<FixtureContext>>>,
    pub(crate) case_behaviors: Vec<Arc<dyn Behavior<CaseContext>>>,
    pub(crate) argument_sources: Vec<Arc<dyn ArgumentSource>>,
}

impl EngineConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the construction policy
    pub fn with_construction(mut self, policy: ConstructionPolicy) -> Self {
        self.construction = policy;
        self
    }

    /// Set the skip policy
    pub fn with_skip(mut self, policy: impl SkipPolicy + 'static) -> Self {
        self.skip = Some(Arc::new(policy));
        self
    }

    /// Skip tests matching `predicate`, reporting `reason`
    pub fn skip_when<P, R>(self, predicate: P, reason: R) -> Self
    where
        P: Fn(&TestClass, &TestMethod) -> bool + Send + Sync + 'static,
        R: Fn(&TestClass, &TestMethod) -> Option<String> + Send + Sync + 'static,
    {
        self.with_skip(SkipWhen { predicate, reason })
    }

    /// Replace the class's own constructor
    pub fn with_factory(mut self, factory: impl InstanceFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Append an outermost-first type-level wrapper
    pub fn wrap_class(mut self, behavior: impl Behavior<ClassContext> + 'static) -> Self {
        self.class_behaviors.push(Arc::new(behavior));
        self
    }

    /// Append an instance-level wrapper
    pub fn wrap_fixture(mut self, behavior: impl Behavior<FixtureContext> + 'static) -> Self {
        self.fixture_behaviors.push(Arc::new(behavior));
        self
    }

    /// Append an instance-level setup/teardown pair
    pub fn fixture_setup(self, pair: impl SetupTeardown<FixtureContext> + 'static) -> Self {
        self.wrap_fixture(Paired(pair))
    }

    /// Append a case-level wrapper
    pub fn wrap_case(mut self, behavior: impl Behavior<CaseContext> + 'static) -> Self {
        self.case_behaviors.push(Arc::new(behavior));
        self
    }

    /// Append a case-level setup/teardown pair
    pub fn case_setup(self, pair: impl SetupTeardown<CaseContext> + 'static) -> Self {
        self.wrap_case(Paired(pair))
    }

    /// Add an argument source consulted for every method that declares parameters
    pub fn with_argument_source(mut self, source: impl ArgumentSource + 'static) -> Self {
        self.argument_sources.push(Arc::new(source));
        self
    }

    pub(crate) fn construct(&self, class: &TestClass) -> Result<Instance, Fault> {
        match &self.factory {
            Some(factory) => factory.create(class),
            None => class.construct(),
        }
    }

    /// The skip reason for `method`, or `None` when it runs.
    pub(crate) fn skip_reason(&self, class: &TestClass, method: &TestMethod) -> Option<Option<String>> {
        let policy = self.skip.as_ref()?;
        policy
            .should_skip(class, method)
            .then(|| policy.reason(class, method))
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("construction", &self.construction)
            .field("has_skip", &self.skip.is_some())
            .field("has_factory", &self.factory.is_some())
            .field("class_behaviors", &self.class_behaviors.len())
            .field("fixture_behaviors", &self.fixture_behaviors.len())
            .field("case_behaviors", &self.case_behaviors.len())
            .field("argument_sources", &self.argument_sources.len())
            .finish()
    }
}

/// Driver-level settings that can come from a file or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub construction: Option<ConstructionPolicy>,
    pub parallel: Option<bool>,
    /// Identity pattern; empty or absent runs everything
    pub pattern: Option<String>,
}

impl RunSettings {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`. Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let construction = lookup(CONSTRUCTION_ENV).and_then(|raw| match raw.parse() {
            Ok(policy) => Some(policy),
            Err(err) => {
                tracing::warn!(var = CONSTRUCTION_ENV, %err, "ignoring construction override");
                None
            }
        });
        let parallel = lookup(PARALLEL_ENV).and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => {
                tracing::warn!(var = PARALLEL_ENV, value = %raw, "ignoring parallel override");
                None
            }
        });
        Self {
            construction,
            parallel,
            pattern: None,
        }
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merged(self, overrides: RunSettings) -> Self {
        Self {
            construction: overrides.construction.or(self.construction),
            parallel: overrides.parallel.or(self.parallel),
            pattern: overrides.pattern.or(self.pattern),
        }
    }

    /// Apply these settings to an engine configuration.
    pub fn apply(&self, config: EngineConfig) -> EngineConfig {
        match self.construction {
            Some(policy) => config.with_construction(policy),
            None => config,
        }
    }
}
