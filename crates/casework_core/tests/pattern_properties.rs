//! Property-based tests for test identity matching.
//!
//! These pin the contract the driver relies on: implicit "contains" semantics, wildcards that always match, and a
//! matcher that never panics whatever the input.

use casework_core::pattern::{TestPattern, matches};
use proptest::prelude::*;

proptest! {
    /// Property: without `*` and without upper-case word starts, matching is exactly substring containment.
    #[test]
    fn plain_patterns_are_contains(pattern in "[a-z0-9._()]{0,8}", name in "[a-zA-Z0-9._()]{0,24}") {
        prop_assert_eq!(matches(&pattern, &name), name.contains(pattern.as_str()));
    }

    /// Property: words spelled out in full (one capital, then lower case) match exactly by containment.
    #[test]
    fn spelled_out_words_are_contains(
        words in prop::collection::vec("[A-Z][a-z]{1,5}", 1..4),
        name in "[A-Za-z.]{0,24}",
        inner in "[A-Z][a-z]{1,5}\\.[A-Z][a-z]{1,5}",
    ) {
        let pattern = words.join(".");
        prop_assert_eq!(matches(&pattern, &name), name.contains(pattern.as_str()));
        // Longer words sharing the pattern's prefixes do not match.
        let stretched = inner.replace('.', "xx.") + "yy";
        prop_assert!(!matches(&inner, &stretched));
    }

    /// Property: a name that literally contains a star-free pattern always matches it.
    #[test]
    fn containment_implies_match(
        prefix in "[a-zA-Z.]{0,8}",
        pattern in "[a-zA-Z0-9.]{1,8}",
        suffix in "[a-zA-Z.]{0,8}",
    ) {
        let name = format!("{}{}{}", prefix, pattern, suffix);
        prop_assert!(matches(&pattern, &name));
    }

    /// Property: `*` and the empty pattern match everything.
    #[test]
    fn wildcards_match_everything(name in ".{0,32}") {
        prop_assert!(matches("*", &name));
        prop_assert!(matches("", &name));
        prop_assert!(matches("**", &name));
    }

    /// Property: arbitrary patterns never panic and are deterministic.
    #[test]
    fn arbitrary_patterns_are_deterministic(pattern in ".{0,16}", name in ".{0,32}") {
        let compiled = TestPattern::new(pattern.clone());
        let first = compiled.matches(&name);
        prop_assert_eq!(first, compiled.matches(&name));
        prop_assert_eq!(first, TestPattern::new(pattern).matches(&name));
    }
}

#[test]
fn abbreviation_examples() {
    let pattern = TestPattern::new("ChildClass.MDW");
    assert!(pattern.matches("Fixtures.ChildClass.MethodDefinedWithinChildClass"));
    assert!(!"Fixtures.ChildClass.MethodDefinedWithinChildClass".contains(pattern.as_str()));
}
