//! Cases: one concrete invocation of a test method.

use std::time::Duration;

use casework_core::{Fault, LifecycleEvent, Resolution, TestName};

use crate::model::{Arg, ArgList, TestClass, TestMethod, display_args};

/// Terminal outcome of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Passed,
    Failed,
    Skipped { reason: Option<String> },
}

/// One concrete invocation of a test method with bound arguments and type arguments.
///
/// Cases are mutated only by the engine while their class runs. Once the class is finalized they are handed out
/// read-only.
#[derive(Debug, Clone)]
pub struct Case {
    name: TestName,
    /// Discovery position within the class
    ordinal: usize,
    method: usize,
    args: ArgList,
    resolution: Resolution,
    duration: Duration,
    output: String,
    faults: Vec<Fault>,
    skipped: Option<Option<String>>,
    blocked: bool,
    started: bool,
}

impl Case {
    pub(crate) fn new(
        class: &TestClass,
        ordinal: usize,
        method: usize,
        args: ArgList,
        resolution: Resolution,
    ) -> Self {
        let declared = &class.methods()[method];
        let name = TestName::new(
            class.full_name(),
            declared.name(),
            display_name(class, declared, &args, &resolution),
        );
        Self {
            name,
            ordinal,
            method,
            args,
            resolution,
            duration: Duration::ZERO,
            output: String::new(),
            faults: Vec::new(),
            skipped: None,
            blocked: false,
            started: false,
        }
    }

    /// A case that stands in for a skipped test. It is never constructed or invoked.
    pub(crate) fn skipped(class: &TestClass, ordinal: usize, method: usize, reason: Option<String>) -> Self {
        let declared = &class.methods()[method];
        let mut case = Self::new(class, ordinal, method, Vec::new(), Resolution::empty());
        case.name.name = class.qualified_name(declared);
        case.skipped = Some(reason);
        case
    }

    pub fn name(&self) -> &TestName {
        &self.name
    }

    pub fn args(&self) -> &[Option<Arg>] {
        &self.args
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// All faults, primary first.
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn primary_fault(&self) -> Option<&Fault> {
        self.faults.first()
    }

    pub fn secondary_faults(&self) -> &[Fault] {
        self.faults.get(1..).unwrap_or_default()
    }

    /// Whether an argument source failed before this case could run.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn disposition(&self) -> Disposition {
        match (&self.skipped, self.faults.is_empty()) {
            (Some(reason), _) => Disposition::Skipped { reason: reason.clone() },
            (None, true) => Disposition::Passed,
            (None, false) => Disposition::Failed,
        }
    }

    pub(crate) fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn method_index(&self) -> usize {
        self.method
    }

    /// Append a fault. The first one recorded stays primary.
    pub(crate) fn fail(&mut self, fault: Fault) {
        self.faults.push(fault);
    }

    pub(crate) fn block(&mut self, fault: Fault) {
        self.blocked = true;
        self.fail(fault);
    }

    pub(crate) fn add_time(&mut self, elapsed: Duration) {
        self.duration += elapsed;
    }

    pub(crate) fn append_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Mark the case started, returning `true` the first time only.
    pub(crate) fn start(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    pub(crate) fn started_event(&self) -> LifecycleEvent {
        LifecycleEvent::TestStarted {
            test: self.name.clone(),
        }
    }

    pub(crate) fn completion_event(&self) -> LifecycleEvent {
        let test = self.name.clone();
        match self.disposition() {
            Disposition::Passed => LifecycleEvent::TestPassed {
                test,
                duration: self.duration,
                output: self.output.clone(),
            },
            Disposition::Failed => LifecycleEvent::TestFailed {
                test,
                duration: self.duration,
                output: self.output.clone(),
                faults: self.faults.clone(),
            },
            Disposition::Skipped { reason } => LifecycleEvent::TestSkipped {
                test,
                duration: Duration::ZERO,
                reason,
            },
        }
    }
}

/// `Class.Method`, extended with `<T, ...>` for generic methods and `(args)` when arguments are bound.
fn display_name(class: &TestClass, method: &TestMethod, args: &[Option<Arg>], resolution: &Resolution) -> String {
    let mut name = class.qualified_name(method);
    if method.is_generic() {
        let type_args = if resolution.bindings().is_empty() {
            method.type_params().iter().map(|p| p.placeholder()).collect()
        } else {
            resolution.type_arguments()
        };
        let rendered: Vec<String> = type_args.iter().map(ToString::to_string).collect();
        name.push('<');
        name.push_str(&rendered.join(", "));
        name.push('>');
    }
    if !args.is_empty() {
        name.push('(');
        name.push_str(&display_args(args));
        name.push(')');
    }
    name
}

/// Spread `wall` minus the measured case time evenly over `cases`, remainder nanoseconds to the earliest ones.
pub(crate) fn apportion(cases: &mut [Case], wall: Duration) {
    if cases.is_empty() {
        return;
    }
    let measured: Duration = cases.iter().map(|c| c.duration).sum();
    let overhead = wall.saturating_sub(measured).as_nanos();
    let count = cases.len() as u128;
    let share = overhead / count;
    let remainder = overhead % count;
    for (i, case) in cases.iter_mut().enumerate() {
        let extra = share + u128::from((i as u128) < remainder);
        case.duration += Duration::from_nanos(u64::try_from(extra).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::{TypeParam, TypeRef, resolve};

    use crate::model::MethodSpec;

    #[derive(Default)]
    struct Fixture;

    fn class() -> TestClass {
        TestClass::builder::<Fixture>("Demo.Calc")
            .test("Plain", |_| Ok(()))
            .method(
                MethodSpec::new("Generic")
                    .type_param(TypeParam::new("T"))
                    .param("value", TypeRef::param("T")),
                |_, _| Ok(()),
            )
            .method(MethodSpec::new("Add").param("a", TypeRef::int()).param("b", TypeRef::int()), |_, _| Ok(()))
            .build()
    }

    fn case_for(class: &TestClass, method: usize, args: ArgList) -> Case {
        let declared = &class.methods()[method];
        let runtime: Vec<Option<&TypeRef>> = args.iter().map(|a| a.as_ref().map(Arg::runtime_type)).collect();
        let resolution = resolve(declared.type_params(), &declared.parameter_types(), &runtime);
        Case::new(class, 0, method, args, resolution)
    }

    #[test]
    fn test_plain_case_name() {
        let class = class();
        assert_eq!(case_for(&class, 0, vec![]).name().name, "Demo.Calc.Plain");
    }

    #[test]
    fn test_generic_case_names() {
        let class = class();
        let named = case_for(&class, 1, vec![Some(Arg::new("x"))]);
        assert_eq!(named.name().name, "Demo.Calc.Generic<string>(\"x\")");
        assert_eq!(named.name().method, "Generic");

        let open = case_for(&class, 1, vec![None]);
        assert_eq!(open.name().name, "Demo.Calc.Generic<T>(null)");
    }

    #[test]
    fn test_argument_case_name() {
        let class = class();
        let case = case_for(&class, 2, vec![Some(Arg::new(1i32)), Some(Arg::new(2i32))]);
        assert_eq!(case.name().name, "Demo.Calc.Add(1, 2)");
    }

    #[test]
    fn test_first_fault_stays_primary() {
        let class = class();
        let mut case = case_for(&class, 0, vec![]);
        assert_eq!(case.disposition(), Disposition::Passed);
        case.fail(Fault::new("Assert", "first"));
        case.fail(Fault::new("Teardown", "second"));
        assert_eq!(case.disposition(), Disposition::Failed);
        assert_eq!(case.primary_fault().unwrap().message, "first");
        assert_eq!(case.secondary_faults().len(), 1);
        assert_eq!(case.secondary_faults()[0].message, "second");
    }

    #[test]
    fn test_skipped_case_event() {
        let class = class();
        let case = Case::skipped(&class, 3, 2, Some("slow".to_string()));
        assert_eq!(case.name().name, "Demo.Calc.Add");
        assert_eq!(
            case.completion_event(),
            LifecycleEvent::TestSkipped {
                test: case.name().clone(),
                duration: Duration::ZERO,
                reason: Some("slow".to_string()),
            }
        );
    }

    #[test]
    fn test_start_reports_first_time_only() {
        let class = class();
        let mut case = case_for(&class, 0, vec![]);
        assert!(case.start());
        assert!(!case.start());
    }

    #[test]
    fn test_apportion_sums_to_wall_time() {
        let class = class();
        let mut cases: Vec<Case> = (0..3).map(|_| case_for(&class, 0, vec![])).collect();
        cases[0].add_time(Duration::from_nanos(100));
        cases[1].add_time(Duration::from_nanos(50));

        apportion(&mut cases, Duration::from_nanos(1_000));

        let total: Duration = cases.iter().map(Case::duration).sum();
        assert_eq!(total, Duration::from_nanos(1_000));
        // 850ns of overhead: 284, 283, 283
        assert_eq!(cases[0].duration(), Duration::from_nanos(384));
        assert_eq!(cases[1].duration(), Duration::from_nanos(333));
        assert_eq!(cases[2].duration(), Duration::from_nanos(283));
    }

    #[test]
    fn test_apportion_never_shrinks_measured_time() {
        let class = class();
        let mut cases = vec![case_for(&class, 0, vec![])];
        cases[0].add_time(Duration::from_millis(5));
        apportion(&mut cases, Duration::from_millis(1));
        assert_eq!(cases[0].duration(), Duration::from_millis(5));
    }

    proptest::proptest! {
        /// Apportioned durations add up to the wall time whenever it covers the measured time.
        #[test]
        fn apportion_preserves_totals(measured in proptest::collection::vec(0u64..1_000_000, 1..12), slack in 0u64..10_000_000) {
            let class = class();
            let mut cases: Vec<Case> = measured.iter().map(|_| case_for(&class, 0, vec![])).collect();
            for (case, nanos) in cases.iter_mut().zip(&measured) {
                case.add_time(Duration::from_nanos(*nanos));
            }
            let wall = Duration::from_nanos(measured.iter().sum::<u64>() + slack);

            apportion(&mut cases, wall);

            let total: Duration = cases.iter().map(Case::duration).sum();
            proptest::prop_assert_eq!(total, wall);
            for (case, nanos) in cases.iter().zip(&measured) {
                proptest::prop_assert!(case.duration() >= Duration::from_nanos(*nanos));
            }
        }
    }
}
