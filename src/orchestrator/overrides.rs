//! Override resolution: decides Run / Skip / ForceRun for each declaration.
//!
//! Operators get two independent levers. The disabled pattern silences a
//! normally-on step; the enabled pattern resurrects an optional one. An
//! optional step ignores the disabled pattern and a normal step ignores the
//! enabled pattern.
//!
//! Pattern text is split on commas and whitespace. Each token must match the
//! whole bare step name; `*` inside a token matches any run of characters and
//! every other character is literal. A blank pattern has no tokens and
//! matches nothing.

use regex::Regex;

use crate::models::{Disposition, StepDecl};

/// A compiled override pattern.
#[derive(Debug, Clone)]
pub struct OverridePattern {
    source: String,
    tokens: Vec<Regex>,
}

impl OverridePattern {
    pub fn new(text: &str) -> Self {
        let tokens = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .filter_map(compile_token)
            .collect();
        OverridePattern {
            source: text.to_string(),
            tokens,
        }
    }

    /// Whether `name` (a bare step name) matches any token.
    pub fn matches(&self, name: &str) -> bool {
        !name.is_empty() && self.tokens.iter().any(|re| re.is_match(name))
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The pattern text as supplied by the operator.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn compile_token(token: &str) -> Option<Regex> {
    let body = token
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    // Every token is escaped, so compilation only fails on absurd sizes.
    Regex::new(&format!("^(?:{})$", body)).ok()
}

/// The disabled/enabled pattern pair for one run.
#[derive(Debug, Clone)]
pub struct OverrideSet {
    disabled: OverridePattern,
    enabled: OverridePattern,
}

impl OverrideSet {
    pub fn new(disabled: &str, enabled: &str) -> Self {
        OverrideSet {
            disabled: OverridePattern::new(disabled),
            enabled: OverridePattern::new(enabled),
        }
    }

    /// Resolve the disposition of one declaration.
    ///
    /// Pure: depends only on the declaration and the two patterns.
    pub fn resolve(&self, decl: &StepDecl) -> Disposition {
        if decl.is_optional() {
            if self.enabled.matches(decl.name()) {
                Disposition::ForceRun
            } else {
                Disposition::Skip
            }
        } else if self.disabled.matches(decl.name()) {
            Disposition::Skip
        } else {
            Disposition::Run
        }
    }

    pub fn disabled(&self) -> &OverridePattern {
        &self.disabled
    }

    pub fn enabled(&self) -> &OverridePattern {
        &self.enabled
    }
}
