//! Generic resolution unit tests.

use super::*;
use crate::types::Constraint;

fn t() -> TypeRef {
    TypeRef::param("T")
}

fn resolve_t(parameters: &[TypeRef], arguments: &[Option<TypeRef>]) -> TypeBinding {
    let args: Vec<Option<&TypeRef>> = arguments.iter().map(Option::as_ref).collect();
    let resolution = resolve(&[TypeParam::new("T")], parameters, &args);
    resolution.get("T").cloned().unwrap()
}

// ========================================
// Single parameter
// ========================================

#[test]
fn test_string_argument_binds_string() {
    assert_eq!(
        resolve_t(&[t()], &[Some(TypeRef::string())]),
        TypeBinding::Resolved(TypeRef::string())
    );
}

#[test]
fn test_null_argument_leaves_open() {
    assert_eq!(resolve_t(&[t()], &[None]), TypeBinding::Open);
}

#[test]
fn test_null_and_two_decimals_bind_decimal() {
    let binding = resolve_t(
        &[t(), t(), t()],
        &[None, Some(TypeRef::decimal()), Some(TypeRef::decimal())],
    );
    assert_eq!(binding, TypeBinding::Resolved(TypeRef::decimal()));
}

#[test]
fn test_disagreement_takes_first_in_source_order() {
    let binding = resolve_t(&[t(), t()], &[Some(TypeRef::int()), Some(TypeRef::string())]);
    assert_eq!(binding, TypeBinding::Resolved(TypeRef::int()));
}

#[test]
fn test_too_few_arguments_leaves_open() {
    let binding = resolve_t(&[TypeRef::int(), t()], &[Some(TypeRef::int())]);
    assert_eq!(binding, TypeBinding::Open);
}

#[test]
fn test_excess_arguments_are_ignored() {
    let binding = resolve_t(&[t()], &[Some(TypeRef::bool()), Some(TypeRef::string())]);
    assert_eq!(binding, TypeBinding::Resolved(TypeRef::bool()));
}

#[test]
fn test_parameter_not_mentioned_leaves_open() {
    let binding = resolve_t(&[TypeRef::string()], &[Some(TypeRef::string())]);
    assert_eq!(binding, TypeBinding::Open);
}

// ========================================
// Nested shapes
// ========================================

#[test]
fn test_array_element_binds() {
    let binding = resolve_t(&[TypeRef::array(t())], &[Some(TypeRef::array(TypeRef::long()))]);
    assert_eq!(binding, TypeBinding::Resolved(TypeRef::long()));
}

#[test]
fn test_array_against_scalar_gives_no_evidence() {
    let binding = resolve_t(&[TypeRef::array(t())], &[Some(TypeRef::long())]);
    assert_eq!(binding, TypeBinding::Open);
}

#[test]
fn test_pair_and_function_shapes() {
    let params = [TypeParam::new("K"), TypeParam::new("V"), TypeParam::new("R")];
    let declared = [
        TypeRef::pair(TypeRef::param("K"), TypeRef::param("V")),
        TypeRef::function(vec![TypeRef::param("V")], TypeRef::param("R")),
    ];
    let pair = TypeRef::pair(TypeRef::string(), TypeRef::int());
    let func = TypeRef::function(vec![TypeRef::int()], TypeRef::bool());
    let resolution = resolve(&params, &declared, &[Some(&pair), Some(&func)]);

    assert!(resolution.is_complete());
    assert_eq!(
        resolution.type_arguments(),
        vec![TypeRef::string(), TypeRef::int(), TypeRef::bool()]
    );
}

#[test]
fn test_generic_shape_requires_same_name_and_arity() {
    let declared = [TypeRef::generic("List", vec![t()])];
    let wrong_name = TypeRef::generic("Set", vec![TypeRef::int()]);
    assert_eq!(resolve_t(&declared, &[Some(wrong_name)]), TypeBinding::Open);

    let right = TypeRef::generic("List", vec![TypeRef::int()]);
    assert_eq!(
        resolve_t(&declared, &[Some(right)]),
        TypeBinding::Resolved(TypeRef::int())
    );
}

// ========================================
// Constraints
// ========================================

#[test]
fn test_constraint_disqualifies_candidates() {
    let param = TypeParam::new("T").with_constraint(Constraint::ValueType);
    let string = TypeRef::string();
    let int = TypeRef::int();
    let resolution = resolve(&[param], &[t(), t()], &[Some(&string), Some(&int)]);
    assert_eq!(resolution.get("T"), Some(&TypeBinding::Resolved(TypeRef::int())));
}

#[test]
fn test_value_constrained_null_only_evidence_is_open() {
    let param = TypeParam::new("T").with_constraint(Constraint::ValueType);
    let resolution = resolve(&[param], &[t(), t()], &[None, None]);
    assert_eq!(resolution.open_parameters(), vec!["T"]);
}

#[test]
fn test_all_candidates_disqualified_is_open() {
    let param = TypeParam::new("T").with_constraint(Constraint::ReferenceType);
    let int = TypeRef::int();
    let resolution = resolve(&[param], &[t()], &[Some(&int)]);
    assert!(!resolution.is_complete());
}

// ========================================
// Partial resolution and substitution
// ========================================

#[test]
fn test_parameters_resolve_independently() {
    let params = [TypeParam::new("T"), TypeParam::new("U")];
    let declared = [TypeRef::param("T"), TypeRef::param("U")];
    let string = TypeRef::string();
    let resolution = resolve(&params, &declared, &[Some(&string), None]);

    assert_eq!(resolution.get("T"), Some(&TypeBinding::Resolved(TypeRef::string())));
    assert_eq!(resolution.get("U"), Some(&TypeBinding::Open));
    assert_eq!(resolution.open_parameters(), vec!["U"]);
    assert_eq!(resolution.type_arguments(), vec![TypeRef::string(), TypeRef::param("U")]);
}

#[test]
fn test_substitute_keeps_open_placeholders() {
    let params = [TypeParam::new("T"), TypeParam::new("U")];
    let int = TypeRef::int();
    let resolution = resolve(&params, &[TypeRef::param("T")], &[Some(&int)]);

    let declared = TypeRef::function(vec![TypeRef::array(TypeRef::param("T"))], TypeRef::param("U"));
    assert_eq!(
        resolution.substitute(&declared),
        TypeRef::function(vec![TypeRef::array(TypeRef::int())], TypeRef::param("U"))
    );
}

#[test]
fn test_no_type_parameters_is_complete() {
    let resolution = resolve(&[], &[TypeRef::int()], &[None]);
    assert!(resolution.is_complete());
    assert_eq!(resolution, Resolution::empty());
}
