//! Test identity matching.
//!
//! A pattern is compiled once into an anchored regular expression:
//!
//! - `*` is an explicit wildcard.
//! - A pattern without any `*` is a "contains" test: it is wrapped in implied wildcards on both sides.
//! - An upper-case letter starts a *word*. When the pattern moves straight on to the next upper-case letter, the
//!   word implicitly continues through whatever lower-case letters the candidate has left in it. So `MDW` matches
//!   `MethodDefinedWithin`, and `MeDW` does too, while `MxDW` does not. The last letter of such an abbreviation also
//!   runs to the end of its word, so `MD.Run` matches `MethodDefined.Run`.
//! - A word spelled out in full is literal: `Calc.Add` does not match `Calculator.Addition`.
//!
//! Every implicit piece can match the empty string, so a candidate that literally contains the pattern always
//! matches. For patterns with no `*` and no two adjacent upper-case letters, matching is exactly containment.
//! Matching is case-sensitive.

use regex::{Regex, RegexBuilder};

/// A compiled test-name filter.
#[derive(Debug, Clone)]
pub struct TestPattern {
    source: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Everything,
    Regex(Regex),
    /// The expanded expression exceeded the regex size limit; fall back to a plain substring test.
    Literal(String),
}

impl TestPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let matcher = if source.is_empty() {
            Matcher::Everything
        } else {
            match RegexBuilder::new(&expand(&source)).dot_matches_new_line(true).build() {
                Ok(regex) => Matcher::Regex(regex),
                Err(_) => Matcher::Literal(source.replace('*', "")),
            }
        };
        Self { source, matcher }
    }

    /// A pattern matching every name.
    pub fn everything() -> Self {
        Self::new("")
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Everything => true,
            Matcher::Regex(regex) => regex.is_match(name),
            Matcher::Literal(literal) => name.contains(literal.as_str()),
        }
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::everything()
    }
}

/// One-shot convenience over [`TestPattern::matches`].
pub fn matches(pattern: &str, name: &str) -> bool {
    TestPattern::new(pattern).matches(name)
}

/// Translate a pattern into an anchored regular expression.
fn expand(pattern: &str) -> String {
    let implicit_contains = !pattern.contains('*');
    let mut expr = String::with_capacity(pattern.len() * 4 + 8);
    expr.push('^');
    if implicit_contains {
        expr.push_str(".*");
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut in_word = false;
    for (i, &c) in chars.iter().enumerate() {
        if c == '*' {
            expr.push_str(".*");
            in_word = false;
            continue;
        }

        if c.is_uppercase() {
            in_word = true;
        } else if !c.is_lowercase() {
            in_word = false;
        }

        let mut buf = [0u8; 4];
        expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));

        let next = chars.get(i + 1);
        let next_is_upper = next.is_some_and(|n| n.is_uppercase());
        let next_is_lower = next.is_some_and(|n| n.is_lowercase());
        let ends_abbreviation = c.is_uppercase() && i > 0 && chars[i - 1].is_uppercase() && !next_is_lower;
        if in_word && (next_is_upper || ends_abbreviation) {
            // Rest of the candidate's word
            expr.push_str(r"\p{Ll}*");
        }
    }

    if implicit_contains {
        expr.push_str(".*");
    }
    expr.push('$');
    expr
}
