//! Runtime type vocabulary.
//!
//! A [`TypeRef`] describes either a declared parameter type (which may mention open type parameters) or the concrete
//! runtime type of an argument value. The shapes mirror what the resolver knows how to look inside: arrays, named
//! generic shapes, function types and tuples (pairs).

use std::fmt;
use std::sync::Arc;

/// A declared or runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Named reference type (`string`, a user class)
    Class(String),
    /// Named value type (`int`, `decimal`, a user struct)
    Struct(String),
    /// Open type parameter placeholder
    Param(String),
    /// Single-dimension array, `T[]`
    Array(Box<TypeRef>),
    /// Named generic shape with type arguments, `List<T>`
    Generic { name: String, args: Vec<TypeRef> },
    /// Function type, `fn(A, B) -> R`
    Function { params: Vec<TypeRef>, ret: Box<TypeRef> },
    /// Tuple value type; a pair is a two-element tuple
    Tuple(Vec<TypeRef>),
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(name.into())
    }

    pub fn value(name: impl Into<String>) -> Self {
        TypeRef::Struct(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeRef::Param(name.into())
    }

    pub fn array(elem: TypeRef) -> Self {
        TypeRef::Array(Box::new(elem))
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic { name: name.into(), args }
    }

    pub fn function(params: Vec<TypeRef>, ret: TypeRef) -> Self {
        TypeRef::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn pair(first: TypeRef, second: TypeRef) -> Self {
        TypeRef::Tuple(vec![first, second])
    }

    pub fn string() -> Self {
        TypeRef::class("string")
    }

    pub fn int() -> Self {
        TypeRef::value("int")
    }

    pub fn long() -> Self {
        TypeRef::value("long")
    }

    pub fn double() -> Self {
        TypeRef::value("double")
    }

    pub fn decimal() -> Self {
        TypeRef::value("decimal")
    }

    pub fn bool() -> Self {
        TypeRef::value("bool")
    }

    pub fn char() -> Self {
        TypeRef::value("char")
    }

    /// Value types are structs and tuples; everything else is a reference.
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeRef::Struct(_) | TypeRef::Tuple(_))
    }

    /// Check whether this type mentions any open type parameter.
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Param(_) => true,
            TypeRef::Class(_) | TypeRef::Struct(_) => false,
            TypeRef::Array(elem) => elem.is_open(),
            TypeRef::Generic { args, .. } => args.iter().any(TypeRef::is_open),
            TypeRef::Function { params, ret } => params.iter().any(TypeRef::is_open) || ret.is_open(),
            TypeRef::Tuple(items) => items.iter().any(TypeRef::is_open),
        }
    }

    /// Check whether this type mentions the named type parameter anywhere.
    pub fn mentions(&self, param: &str) -> bool {
        match self {
            TypeRef::Param(name) => name == param,
            TypeRef::Class(_) | TypeRef::Struct(_) => false,
            TypeRef::Array(elem) => elem.mentions(param),
            TypeRef::Generic { args, .. } => args.iter().any(|a| a.mentions(param)),
            TypeRef::Function { params, ret } => params.iter().any(|p| p.mentions(param)) || ret.mentions(param),
            TypeRef::Tuple(items) => items.iter().any(|i| i.mentions(param)),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Class(name) | TypeRef::Struct(name) | TypeRef::Param(name) => write!(f, "{}", name),
            TypeRef::Array(elem) => write!(f, "{}[]", elem),
            TypeRef::Generic { name, args } => {
                write!(f, "{}<", name)?;
                write_list(f, args)?;
                write!(f, ">")
            }
            TypeRef::Function { params, ret } => {
                write!(f, "fn(")?;
                write_list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            TypeRef::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
        }
    }
}

/// A declared constraint on an open type parameter.
#[derive(Clone)]
pub enum Constraint {
    /// Only value types may bind
    ValueType,
    /// Only reference types may bind
    ReferenceType,
    /// Arbitrary predicate (interface or base-type requirements)
    Satisfies {
        description: String,
        predicate: Arc<dyn Fn(&TypeRef) -> bool + Send + Sync>,
    },
}

impl Constraint {
    pub fn satisfies(description: impl Into<String>, predicate: impl Fn(&TypeRef) -> bool + Send + Sync + 'static) -> Self {
        Constraint::Satisfies {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Check whether a concrete candidate can bind under this constraint.
    pub fn admits(&self, candidate: &TypeRef) -> bool {
        match self {
            Constraint::ValueType => candidate.is_value_type(),
            Constraint::ReferenceType => !candidate.is_value_type(),
            Constraint::Satisfies { predicate, .. } => predicate(candidate),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ValueType => write!(f, "ValueType"),
            Constraint::ReferenceType => write!(f, "ReferenceType"),
            Constraint::Satisfies { description, .. } => write!(f, "Satisfies({})", description),
        }
    }
}

/// An open type parameter declared by a generic test method.
#[derive(Debug, Clone)]
pub struct TypeParam {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn admits(&self, candidate: &TypeRef) -> bool {
        self.constraints.iter().all(|c| c.admits(candidate))
    }

    /// The placeholder used while this parameter is unresolved.
    pub fn placeholder(&self) -> TypeRef {
        TypeRef::Param(self.name.clone())
    }
}

/// Map a Rust value type to the runtime type the engine reports for it.
pub trait RuntimeType {
    fn runtime_type() -> TypeRef;
}

macro_rules! runtime_types {
    ($($ty:ty => $ctor:ident),* $(,)?) => {
        $(
            impl RuntimeType for $ty {
                fn runtime_type() -> TypeRef {
                    TypeRef::$ctor()
                }
            }
        )*
    };
}

runtime_types! {
    String => string,
    &'static str => string,
    i32 => int,
    i64 => long,
    f64 => double,
    bool => bool,
    char => char,
}

impl<T: RuntimeType> RuntimeType for Vec<T> {
    fn runtime_type() -> TypeRef {
        TypeRef::array(T::runtime_type())
    }
}

impl<A: RuntimeType, B: RuntimeType> RuntimeType for (A, B) {
    fn runtime_type() -> TypeRef {
        TypeRef::pair(A::runtime_type(), B::runtime_type())
    }
}
