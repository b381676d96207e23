//! Generic parameter resolution for open test methods.
//!
//! Given the declared parameter types of a generic method and the runtime types of one concrete argument list, infer
//! a binding for every open type parameter. Resolution is best-effort and never fails:
//!
//! - `null` arguments carry no type information.
//! - Evidence is collected from every declared position mentioning the parameter, including positions nested inside
//!   arrays, generic shapes, function types and tuples.
//! - Candidates rejected by a declared constraint are discarded.
//! - Agreeing candidates bind; disagreeing candidates bind to the first one in source order. A wrong guess surfaces
//!   when the method is invoked, not here.
//! - No usable evidence leaves the parameter [`TypeBinding::Open`].
//!
//! ## Notes
//!
//! - Arguments beyond the declared parameter list are ignored.
//! - Each parameter resolves independently, so a partially resolved method is reported per parameter.

use crate::types::{TypeParam, TypeRef};

/// Outcome for a single type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBinding {
    Resolved(TypeRef),
    Open,
}

impl TypeBinding {
    pub fn resolved(&self) -> Option<&TypeRef> {
        match self {
            TypeBinding::Resolved(ty) => Some(ty),
            TypeBinding::Open => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TypeBinding::Open)
    }
}

/// Bindings for all of a method's type parameters, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    bindings: Vec<(String, TypeBinding)>,
}

impl Resolution {
    /// A resolution for a method with no type parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bindings(&self) -> &[(String, TypeBinding)] {
        &self.bindings
    }

    pub fn get(&self, name: &str) -> Option<&TypeBinding> {
        self.bindings.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn is_complete(&self) -> bool {
        self.bindings.iter().all(|(_, b)| !b.is_open())
    }

    /// Names of parameters left open.
    pub fn open_parameters(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|(_, b)| b.is_open())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Type arguments in declaration order; open parameters appear as their placeholder.
    pub fn type_arguments(&self) -> Vec<TypeRef> {
        self.bindings
            .iter()
            .map(|(name, binding)| match binding {
                TypeBinding::Resolved(ty) => ty.clone(),
                TypeBinding::Open => TypeRef::Param(name.clone()),
            })
            .collect()
    }

    /// Replace every resolved parameter inside `declared`. Open parameters are left as placeholders.
    pub fn substitute(&self, declared: &TypeRef) -> TypeRef {
        match declared {
            TypeRef::Param(name) => match self.get(name) {
                Some(TypeBinding::Resolved(ty)) => ty.clone(),
                _ => declared.clone(),
            },
            TypeRef::Class(_) | TypeRef::Struct(_) => declared.clone(),
            TypeRef::Array(elem) => TypeRef::Array(Box::new(self.substitute(elem))),
            TypeRef::Generic { name, args } => TypeRef::Generic {
                name: name.clone(),
                args: args.iter().map(|a| self.substitute(a)).collect(),
            },
            TypeRef::Function { params, ret } => TypeRef::Function {
                params: params.iter().map(|p| self.substitute(p)).collect(),
                ret: Box::new(self.substitute(ret)),
            },
            TypeRef::Tuple(items) => TypeRef::Tuple(items.iter().map(|i| self.substitute(i)).collect()),
        }
    }
}

/// Infer bindings for `type_params` from one argument list.
///
/// ## Parameters
/// - `type_params`: the method's open type parameters, in declaration order.
/// - `parameters`: declared parameter types, in declaration order.
/// - `arguments`: runtime type of each supplied argument; `None` is a null argument.
///
/// ## Returns
/// - (`Resolution`): one binding per type parameter.
pub fn resolve(type_params: &[TypeParam], parameters: &[TypeRef], arguments: &[Option<&TypeRef>]) -> Resolution {
    let bindings = type_params
        .iter()
        .map(|param| (param.name.clone(), resolve_one(param, parameters, arguments)))
        .collect();
    Resolution { bindings }
}

fn resolve_one(param: &TypeParam, parameters: &[TypeRef], arguments: &[Option<&TypeRef>]) -> TypeBinding {
    let mut candidates: Vec<TypeRef> = Vec::new();

    // zip stops at the shorter list: too few arguments supply nothing, excess ones are ignored
    for (declared, actual) in parameters.iter().zip(arguments) {
        let Some(actual) = actual else {
            continue;
        };
        if declared.mentions(&param.name) {
            collect(&param.name, declared, actual, &mut candidates);
        }
    }

    candidates.retain(|candidate| param.admits(candidate));

    match candidates.into_iter().next() {
        Some(first) => TypeBinding::Resolved(first),
        None => TypeBinding::Open,
    }
}

/// Walk `declared` and `actual` in lockstep, pushing the actual type found at every position naming `param`.
fn collect(param: &str, declared: &TypeRef, actual: &TypeRef, out: &mut Vec<TypeRef>) {
    match (declared, actual) {
        (TypeRef::Param(name), _) => {
            if name == param {
                out.push(actual.clone());
            }
        }
        (TypeRef::Array(d), TypeRef::Array(a)) => collect(param, d, a, out),
        (TypeRef::Generic { name: dn, args: da }, TypeRef::Generic { name: an, args: aa })
            if dn == an && da.len() == aa.len() =>
        {
            for (d, a) in da.iter().zip(aa) {
                collect(param, d, a, out);
            }
        }
        (
            TypeRef::Function { params: dp, ret: dr },
            TypeRef::Function { params: ap, ret: ar },
        ) if dp.len() == ap.len() => {
            for (d, a) in dp.iter().zip(ap) {
                collect(param, d, a, out);
            }
            collect(param, dr, ar, out);
        }
        (TypeRef::Tuple(d), TypeRef::Tuple(a)) if d.len() == a.len() => {
            for (d, a) in d.iter().zip(a) {
                collect(param, d, a, out);
            }
        }
        // Shape mismatch: this position offers no evidence
        _ => {}
    }
}

#[cfg(test)]
mod tests;
