//! End-to-end lifecycle tests: construction policies, teardown faults and run aggregates.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use casework::{
    Arg, ConstructionPolicy, Disposition, EngineConfig, ExecutionSummary, Fault, FixtureContext, LifecycleEvent,
    MethodSpec, RunSettings, Runner, SetupTeardown, TestClass, TypeRef,
};

#[derive(Default)]
struct Account {
    balance: i64,
}

/// A class counting its constructions and disposals.
fn counted_class(name: &str, constructed: &Arc<AtomicUsize>, disposed: &Arc<AtomicUsize>) -> TestClass {
    let (c, d) = (Arc::clone(constructed), Arc::clone(disposed));
    TestClass::builder::<Account>(name)
        .construct_with(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Account { balance: 100 })
        })
        .dispose_with(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .test("Deposits", |account| {
            account.balance += 50;
            Ok(())
        })
        .test("Overdraws", |account| {
            account.balance -= 500;
            Err(Fault::new("InsufficientFunds", format!("balance would be {}", account.balance)))
        })
        .build()
}

fn result_events(log: &[LifecycleEvent]) -> Vec<&LifecycleEvent> {
    log.iter().filter(|e| e.is_case_result()).collect()
}

// ========================================
// Construction policies
// ========================================

#[test]
fn per_case_construction_brackets_each_case() {
    common::init_tracing();
    let (constructed, disposed) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let (recorder, log) = common::collecting_recorder();
    let runner = Runner::new(EngineConfig::new(), recorder).with_parallel(false);

    let summary = runner.run([counted_class("Bank.Account", &constructed, &disposed)]).unwrap();

    assert_eq!(constructed.load(Ordering::SeqCst), 2);
    assert_eq!(disposed.load(Ordering::SeqCst), 2);
    assert_eq!((summary.passed, summary.failed), (1, 1));

    let log = log.lock().unwrap();
    let failed = log
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::TestFailed { faults, .. } => Some(faults.clone()),
            _ => None,
        })
        .unwrap();
    // Fresh instance per case: the deposit from the first case is not visible here.
    assert_eq!(failed[0].message, "balance would be -400");
    assert_eq!(failed.len(), 1);
}

#[test]
fn shared_construction_builds_once() {
    let (constructed, disposed) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let (recorder, log) = common::collecting_recorder();
    let config = EngineConfig::new().with_construction(ConstructionPolicy::Shared);
    let runner = Runner::new(config, recorder).with_parallel(false);

    runner.run([counted_class("Bank.Account", &constructed, &disposed)]).unwrap();

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    let log = log.lock().unwrap();
    let message = log
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::TestFailed { faults, .. } => Some(faults[0].message.clone()),
            _ => None,
        })
        .unwrap();
    // Shared instance: the deposit is visible.
    assert_eq!(message, "balance would be -350");
}

#[test]
fn shared_teardown_fault_fails_passing_case() {
    let class = TestClass::builder::<Account>("Bank.Ledger")
        .dispose_with(|_| Err(Fault::new("LedgerLocked", "could not release ledger")))
        .test("Reads", |_| Ok(()))
        .build();
    let (recorder, _) = common::collecting_recorder();
    let config = EngineConfig::new().with_construction(ConstructionPolicy::Shared);
    let runner = Runner::new(config, recorder).with_parallel(false);

    let (summary, reports) = runner.run_with_reports([class]).unwrap();

    assert_eq!(summary.failed, 1);
    let case = &reports[0].cases[0];
    assert_eq!(case.disposition(), Disposition::Failed);
    assert_eq!(case.faults().len(), 1);
    assert_eq!(case.primary_fault().unwrap().type_name, "LedgerLocked");
    assert_eq!(case.primary_fault().unwrap().message, "could not release ledger");
}

struct Transaction;

impl SetupTeardown<FixtureContext> for Transaction {
    fn setup(&self, context: &mut FixtureContext) -> Vec<Fault> {
        match context.instance_mut::<Account>() {
            Some(account) => {
                account.balance = 10;
                Vec::new()
            }
            None => vec![Fault::new("Setup", "unexpected fixture type")],
        }
    }

    fn teardown(&self, _context: &mut FixtureContext) -> Vec<Fault> {
        vec![Fault::new("RollbackFailed", "transaction left open")]
    }
}

#[test]
fn fixture_teardown_fault_is_appended_to_every_case() {
    let class = TestClass::builder::<Account>("Bank.Tx")
        .test("SeesSetup", |account| {
            if account.balance == 10 {
                Ok(())
            } else {
                Err(Fault::new("Assert", "setup did not run"))
            }
        })
        .test("Fails", |_| Err(Fault::new("Assert", "explicit failure")))
        .build();
    let config = EngineConfig::new()
        .with_construction(ConstructionPolicy::Shared)
        .fixture_setup(Transaction);
    let (recorder, _) = common::collecting_recorder();

    let (_, reports) = Runner::new(config, recorder).with_parallel(false).run_with_reports([class]).unwrap();
    let cases = &reports[0].cases;

    assert_eq!(cases[0].faults().len(), 1);
    assert_eq!(cases[0].primary_fault().unwrap().type_name, "RollbackFailed");
    assert_eq!(cases[1].primary_fault().unwrap().message, "explicit failure");
    assert_eq!(cases[1].secondary_faults()[0].type_name, "RollbackFailed");
}

// ========================================
// Run aggregates
// ========================================

fn mixed_classes() -> Vec<TestClass> {
    (0..6)
        .map(|i| {
            TestClass::builder::<Account>(format!("Suite.Class{}", i))
                .test("Passes", |_| Ok(()))
                .test("Fails", |_| Err(Fault::new("Assert", "no")))
                .test("Ignored", |_| Ok(()))
                .method(
                    MethodSpec::new("Sleeps")
                        .param("micros", TypeRef::long())
                        .cases(vec![vec![Some(Arg::new(200i64))], vec![Some(Arg::new(50i64))]]),
                    |_, invocation| {
                        let micros = invocation.value::<i64>(0)?;
                        std::thread::sleep(Duration::from_micros(*micros as u64));
                        Ok(())
                    },
                )
                .build()
        })
        .collect()
}

#[test]
fn completed_aggregate_matches_case_events() {
    common::init_tracing();
    let (recorder, log) = common::collecting_recorder();
    let config = EngineConfig::new().skip_when(|_, m| m.name() == "Ignored", |_, _| Some("ignored".to_string()));
    let runner = Runner::new(config, recorder).with_parallel(true).with_threads(4);

    let summary = runner.run(mixed_classes()).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.first(), Some(&LifecycleEvent::ExecutionStarted));
    let completed = match log.last() {
        Some(LifecycleEvent::ExecutionCompleted { summary }) => *summary,
        other => panic!("last event was {:?}", other),
    };
    assert_eq!(completed, summary);

    let mut folded = ExecutionSummary::default();
    for event in result_events(&log) {
        folded.observe(event);
    }
    assert_eq!(folded, completed);
    assert_eq!((completed.passed, completed.failed, completed.skipped), (18, 6, 6));
    assert!(completed.duration >= Duration::from_micros(6 * 250));
}

#[test]
fn parallel_classes_keep_output_apart() {
    let classes: Vec<TestClass> = (0..8)
        .map(|i| {
            let mut builder = TestClass::builder::<Account>(format!("Noisy.Class{}", i));
            for m in 0..4 {
                builder = builder.test(format!("Writes{}", m), move |_| {
                    for line in 0..20 {
                        casework::outln!("class {} method {} line {}", i, m, line);
                        std::thread::yield_now();
                    }
                    Ok(())
                });
            }
            builder.build()
        })
        .collect();
    let (recorder, _) = common::collecting_recorder();
    let runner = Runner::new(EngineConfig::new(), recorder).with_parallel(true).with_threads(4);

    let (summary, reports) = runner.run_with_reports(classes).unwrap();

    assert_eq!(summary.passed, 32);
    for (i, report) in reports.iter().enumerate() {
        for (m, case) in report.cases.iter().enumerate() {
            let expected: String = (0..20).map(|line| format!("class {} method {} line {}\n", i, m, line)).collect();
            assert_eq!(case.output(), expected, "output of {}", case.name().name);
        }
    }
}

#[test]
fn run_aggregate_ignores_other_producers() {
    let (recorder, _) = common::collecting_recorder();
    let foreign = LifecycleEvent::TestFailed {
        test: casework::TestName::new("Elsewhere", "Fails", "Elsewhere.Fails"),
        duration: Duration::from_millis(5),
        output: String::new(),
        faults: vec![Fault::new("Assert", "from another driver")],
    };
    recorder.record(foreign);
    let runner = Runner::new(EngineConfig::new(), Arc::clone(&recorder)).with_parallel(false);

    let summary = runner.run(mixed_classes().into_iter().take(1)).unwrap();

    assert_eq!((summary.passed, summary.failed, summary.skipped), (4, 1, 0));
    // The shared recorder still keeps its own running tally.
    assert_eq!(recorder.summary().failed, 2);
}

#[test]
fn pattern_limits_the_run() {
    let (recorder, log) = common::collecting_recorder();
    let runner = Runner::new(EngineConfig::new(), recorder)
        .with_parallel(false)
        .with_pattern("Class3.Passes");

    let summary = runner.run(mixed_classes()).unwrap();

    assert_eq!(summary.total(), 1);
    let log = log.lock().unwrap();
    let tested: Vec<&str> = log.iter().filter_map(|e| e.test()).map(|t| t.name.as_str()).collect();
    assert_eq!(tested, ["Suite.Class3.Passes", "Suite.Class3.Passes"]);
}

#[test]
fn settings_drive_the_runner() {
    let settings: RunSettings =
        serde_json::from_str(r#"{"construction":"shared","parallel":false,"pattern":"Class1.Fails"}"#).unwrap();
    let (recorder, _) = common::collecting_recorder();

    let summary = Runner::new(EngineConfig::new(), recorder)
        .with_settings(&settings)
        .run(mixed_classes())
        .unwrap();

    assert_eq!((summary.passed, summary.failed, summary.skipped), (0, 1, 0));
}
