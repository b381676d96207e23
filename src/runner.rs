//! Run driver: filter, fan out over classes, report one summary.

use std::sync::Arc;

use casework_core::{ExecutionSummary, LifecycleEvent, TestPattern};
use rayon::prelude::*;

use crate::config::{EngineConfig, RunSettings};
use crate::engine::{ClassReport, Engine};
use crate::errors::{EngineError, EngineResult};
use crate::model::TestClass;
use crate::recorder::Recorder;

/// Runs a set of classes against one configuration and recorder.
pub struct Runner {
    config: EngineConfig,
    recorder: Arc<Recorder>,
    pattern: TestPattern,
    /// Whether classes run concurrently
    parallel: bool,
    /// Worker count for a dedicated pool; `None` uses rayon's global pool
    threads: Option<usize>,
}

impl Runner {
    pub fn new(config: EngineConfig, recorder: Arc<Recorder>) -> Self {
        Self {
            config,
            recorder,
            pattern: TestPattern::everything(),
            parallel: true,
            threads: None,
        }
    }

    /// Only run tests whose `Class.Method` identity matches `pattern`.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = TestPattern::new(pattern);
        self
    }

    /// Set whether classes run in parallel
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run parallel classes on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Apply driver settings (construction policy, parallelism, pattern).
    pub fn with_settings(mut self, settings: &RunSettings) -> Self {
        self.config = settings.apply(self.config);
        if let Some(parallel) = settings.parallel {
            self.parallel = parallel;
        }
        if let Some(pattern) = &settings.pattern {
            self.pattern = TestPattern::new(pattern.clone());
        }
        self
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Run `classes` and return the aggregate for this run.
    ///
    /// Emits `ExecutionStarted` first and `ExecutionCompleted` last; everything in between is per-case traffic from
    /// the engine. The aggregate covers only this run's cases, so the recorder may be shared with other producers.
    pub fn run(&self, classes: impl IntoIterator<Item = TestClass>) -> EngineResult<ExecutionSummary> {
        self.run_with_reports(classes).map(|(summary, _)| summary)
    }

    /// Like [`Runner::run`], also returning each class's report in input order.
    #[tracing::instrument(skip_all, fields(pattern = %self.pattern.as_str(), parallel = self.parallel))]
    pub fn run_with_reports(
        &self,
        classes: impl IntoIterator<Item = TestClass>,
    ) -> EngineResult<(ExecutionSummary, Vec<ClassReport>)> {
        let selected = self.select(classes);
        tracing::info!(classes = selected.len(), "starting run");

        self.recorder.record(LifecycleEvent::ExecutionStarted);

        let engine = Engine::new(&self.config, &self.recorder);
        let reports = if self.parallel {
            self.run_parallel(&engine, selected)?
        } else {
            selected.into_iter().map(|class| engine.run_class(class)).collect::<EngineResult<Vec<_>>>()?
        };

        let mut summary = ExecutionSummary::default();
        for report in &reports {
            report.tally_into(&mut summary);
        }
        self.recorder.record(LifecycleEvent::ExecutionCompleted { summary });
        tracing::info!(%summary, "run complete");
        Ok((summary, reports))
    }

    fn run_parallel(&self, engine: &Engine<'_>, classes: Vec<Arc<TestClass>>) -> EngineResult<Vec<ClassReport>> {
        let work = || {
            classes
                .into_par_iter()
                .map(|class| engine.run_class(class))
                .collect::<EngineResult<Vec<_>>>()
        };
        match self.threads {
            None => work(),
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("casework-worker-{}", i))
                .build()
                .map_err(|err| EngineError::WorkerPool(err.to_string()))?
                .install(work),
        }
    }

    /// Drop methods the pattern rejects, then classes left with none.
    fn select(&self, classes: impl IntoIterator<Item = TestClass>) -> Vec<Arc<TestClass>> {
        classes
            .into_iter()
            .filter_map(|mut class| {
                let pattern = &self.pattern;
                class.retain_methods(|class, method| pattern.matches(&class.qualified_name(method)));
                (!class.methods().is_empty()).then(|| Arc::new(class))
            })
            .collect()
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("pattern", &self.pattern.as_str())
            .field("parallel", &self.parallel)
            .field("threads", &self.threads)
            .finish()
    }
}
