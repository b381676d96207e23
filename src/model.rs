//! Discovery descriptors: the candidate types and methods the engine runs.
//!
//! Discovery itself is someone else's job. Whatever finds tests hands the engine [`TestClass`] values: a
//! fully-qualified name, a way to construct (and optionally dispose) an instance, and a list of [`TestMethod`]s with
//! their declared parameter types, open type parameters and argument sources. Bodies are written against the concrete
//! fixture type through [`ClassBuilder`] and type-erased here.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use casework_core::{Fault, RuntimeType, TypeParam, TypeRef};

/// A constructed test instance, exclusively owned by the engine.
pub type Instance = Box<dyn Any + Send>;

/// One concrete argument list. `None` is a null argument.
pub type ArgList = Vec<Option<Arg>>;

type Body = dyn Fn(&mut Instance, &Invocation<'_>) -> Result<(), Fault> + Send + Sync;
type Constructor = dyn Fn() -> Result<Instance, Fault> + Send + Sync;
type Disposer = dyn Fn(&mut Instance) -> Result<(), Fault> + Send + Sync;

// ============================================================================
// Arguments
// ============================================================================

/// A type-erased argument value together with its runtime type.
#[derive(Clone)]
pub struct Arg {
    runtime_type: TypeRef,
    display: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl Arg {
    /// Wrap a value whose runtime type follows from its Rust type.
    pub fn new<T: RuntimeType + fmt::Debug + Send + Sync + 'static>(value: T) -> Self {
        Self::typed(T::runtime_type(), value)
    }

    /// Wrap a value with an explicit runtime type.
    pub fn typed<T: fmt::Debug + Send + Sync + 'static>(runtime_type: TypeRef, value: T) -> Self {
        Self {
            runtime_type,
            display: format!("{:?}", value),
            value: Arc::new(value),
        }
    }

    pub fn runtime_type(&self) -> &TypeRef {
        &self.runtime_type
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Render an argument list the way case names show it.
pub(crate) fn display_args(args: &[Option<Arg>]) -> String {
    args.iter()
        .map(|arg| match arg {
            Some(arg) => arg.display.clone(),
            None => "null".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Produce the argument lists for a parameterized method.
///
/// Items are pulled lazily; an `Err` item is an infrastructure fault and stops generation for the method.
pub trait ArgumentSource: Send + Sync {
    fn arguments<'a>(&'a self, method: &'a TestMethod) -> Box<dyn Iterator<Item = Result<ArgList, Fault>> + 'a>;
}

/// A fixed list of argument lists.
#[derive(Debug, Clone, Default)]
pub struct StaticArguments(pub Vec<ArgList>);

impl ArgumentSource for StaticArguments {
    fn arguments<'a>(&'a self, _method: &'a TestMethod) -> Box<dyn Iterator<Item = Result<ArgList, Fault>> + 'a> {
        Box::new(self.0.iter().cloned().map(Ok))
    }
}

/// Argument lists computed on demand by a closure over the method descriptor.
pub struct FnArguments<F>(pub F);

impl<F> ArgumentSource for FnArguments<F>
where
    F: Fn(&TestMethod) -> Result<Vec<ArgList>, Fault> + Send + Sync,
{
    fn arguments<'a>(&'a self, method: &'a TestMethod) -> Box<dyn Iterator<Item = Result<ArgList, Fault>> + 'a> {
        match (self.0)(method) {
            Ok(lists) => Box::new(lists.into_iter().map(Ok)),
            Err(fault) => Box::new(std::iter::once(Err(fault))),
        }
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// What a test body sees of the case it is running.
pub struct Invocation<'a> {
    pub(crate) case_name: &'a str,
    pub(crate) args: &'a [Option<Arg>],
    pub(crate) type_params: &'a [TypeParam],
    pub(crate) type_args: &'a [TypeRef],
}

impl<'a> Invocation<'a> {
    pub fn case_name(&self) -> &str {
        self.case_name
    }

    pub fn args(&self) -> &[Option<Arg>] {
        self.args
    }

    /// The non-null argument at `index`, downcast to `T`.
    pub fn value<T: 'static>(&self, index: usize) -> Result<&'a T, Fault> {
        self.optional(index)?
            .ok_or_else(|| Fault::new("ArgumentType", format!("argument {} is null", index)))
    }

    /// The argument at `index` downcast to `T`, or `None` when it is null.
    pub fn optional<T: 'static>(&self, index: usize) -> Result<Option<&'a T>, Fault> {
        let slot = self
            .args
            .get(index)
            .ok_or_else(|| Fault::new("ArgumentType", format!("no argument at position {}", index)))?;
        match slot {
            None => Ok(None),
            Some(arg) => arg.downcast_ref::<T>().map(Some).ok_or_else(|| {
                Fault::new(
                    "ArgumentType",
                    format!(
                        "argument {} of type {} cannot be used as {}",
                        index,
                        arg.runtime_type,
                        std::any::type_name::<T>()
                    ),
                )
            }),
        }
    }

    /// The type argument bound to the named type parameter.
    pub fn type_argument(&self, name: &str) -> Option<&TypeRef> {
        self.type_params
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| self.type_args.get(i))
    }
}

// ============================================================================
// Methods
// ============================================================================

/// Signature and argument sources of a test method, without its body.
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    parameters: Vec<(String, TypeRef)>,
    type_params: Vec<TypeParam>,
    sources: Vec<Arc<dyn ArgumentSource>>,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            type_params: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters.push((name.into(), ty));
        self
    }

    pub fn type_param(mut self, param: TypeParam) -> Self {
        self.type_params.push(param);
        self
    }

    pub fn source(mut self, source: impl ArgumentSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Shorthand for a [`StaticArguments`] source.
    pub fn cases(self, lists: Vec<ArgList>) -> Self {
        self.source(StaticArguments(lists))
    }
}

/// A discovered test method.
#[derive(Clone)]
pub struct TestMethod {
    spec: MethodSpec,
    body: Arc<Body>,
}

impl TestMethod {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn parameter_types(&self) -> Vec<TypeRef> {
        self.spec.parameters.iter().map(|(_, ty)| ty.clone()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.spec.parameters.len()
    }

    pub fn type_params(&self) -> &[TypeParam] {
        &self.spec.type_params
    }

    pub fn is_generic(&self) -> bool {
        !self.spec.type_params.is_empty()
    }

    pub fn sources(&self) -> &[Arc<dyn ArgumentSource>] {
        &self.spec.sources
    }

    pub(crate) fn call(&self, instance: &mut Instance, invocation: &Invocation<'_>) -> Result<(), Fault> {
        (self.body)(instance, invocation)
    }
}

impl fmt::Debug for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethod")
            .field("name", &self.spec.name)
            .field("parameters", &self.spec.parameters)
            .field("type_params", &self.spec.type_params)
            .finish()
    }
}

// ============================================================================
// Classes
// ============================================================================

/// A discovered test-bearing type.
#[derive(Clone)]
pub struct TestClass {
    full_name: String,
    methods: Vec<TestMethod>,
    constructor: Arc<Constructor>,
    disposer: Option<Arc<Disposer>>,
}

impl TestClass {
    /// Start building a class whose instances are `F::default()`.
    pub fn builder<F: Default + Send + 'static>(full_name: impl Into<String>) -> ClassBuilder<F> {
        ClassBuilder::new(full_name).construct_with(|| Ok(F::default()))
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn methods(&self) -> &[TestMethod] {
        &self.methods
    }

    /// `Class.Method`, the identity the pattern matcher is applied to.
    pub fn qualified_name(&self, method: &TestMethod) -> String {
        format!("{}.{}", self.full_name, method.name())
    }

    /// Keep only the methods accepted by `keep`.
    pub fn retain_methods(&mut self, mut keep: impl FnMut(&TestClass, &TestMethod) -> bool) {
        let methods = std::mem::take(&mut self.methods);
        self.methods = methods.into_iter().filter(|m| keep(self, m)).collect();
    }

    pub(crate) fn construct(&self) -> Result<Instance, Fault> {
        (self.constructor)()
    }

    pub(crate) fn dispose(&self, instance: &mut Instance) -> Result<(), Fault> {
        match &self.disposer {
            Some(disposer) => disposer(instance),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("full_name", &self.full_name)
            .field("methods", &self.methods)
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

/// Typed builder for a [`TestClass`] whose instances are `F`.
pub struct ClassBuilder<F> {
    full_name: String,
    methods: Vec<TestMethod>,
    constructor: Option<Arc<Constructor>>,
    disposer: Option<Arc<Disposer>>,
    _fixture: PhantomData<fn() -> F>,
}

impl<F: Send + 'static> ClassBuilder<F> {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            methods: Vec::new(),
            constructor: None,
            disposer: None,
            _fixture: PhantomData,
        }
    }

    /// Construct instances with a fallible factory instead of `Default`.
    pub fn construct_with(mut self, factory: impl Fn() -> Result<F, Fault> + Send + Sync + 'static) -> Self {
        self.constructor = Some(Arc::new(move || factory().map(|f| Box::new(f) as Instance)));
        self
    }

    /// Run `dispose` on each instance before it is dropped.
    pub fn dispose_with(mut self, dispose: impl Fn(&mut F) -> Result<(), Fault> + Send + Sync + 'static) -> Self {
        let name = self.full_name.clone();
        self.disposer = Some(Arc::new(move |instance: &mut Instance| {
            let fixture = downcast_fixture::<F>(instance, &name)?;
            dispose(fixture)
        }));
        self
    }

    /// Add a parameterless test method.
    pub fn test(self, name: impl Into<String>, body: impl Fn(&mut F) -> Result<(), Fault> + Send + Sync + 'static) -> Self {
        self.method(MethodSpec::new(name), move |fixture, _| body(fixture))
    }

    /// Add a test method with an explicit signature.
    pub fn method(
        mut self,
        spec: MethodSpec,
        body: impl Fn(&mut F, &Invocation<'_>) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Self {
        let name = self.full_name.clone();
        let body: Arc<Body> = Arc::new(move |instance: &mut Instance, invocation: &Invocation<'_>| {
            let fixture = downcast_fixture::<F>(instance, &name)?;
            body(fixture, invocation)
        });
        self.methods.push(TestMethod { spec, body });
        self
    }

    pub fn build(self) -> TestClass {
        let name = self.full_name.clone();
        let constructor = self.constructor.unwrap_or_else(|| {
            Arc::new(move || {
                Err(Fault::new(
                    "MissingConstructor",
                    format!("no constructor registered for `{}`", name),
                ))
            })
        });
        TestClass {
            full_name: self.full_name,
            methods: self.methods,
            constructor,
            disposer: self.disposer,
        }
    }
}

fn downcast_fixture<'a, F: 'static>(instance: &'a mut Instance, class: &str) -> Result<&'a mut F, Fault> {
    instance.downcast_mut::<F>().ok_or_else(|| {
        Fault::new(
            "InstanceType",
            format!("instance of `{}` is not a {}", class, std::any::type_name::<F>()),
        )
    })
}
