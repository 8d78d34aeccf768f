//! Allow-rule parsing and matching.
//!
//! # Rule Kinds
//! - `*` matches any concrete value
//! - `re:<regex>` must match the whole value
//! - `*.example.com` matches the root domain and every subdomain
//! - any other pattern containing `*` is a glob (`*` = any sequence)
//! - everything else is exact string equality
//!
//! # Design Decisions
//! - Rules are parsed per match; policies are read-only snapshots so nothing
//!   needs invalidating
//! - A malformed regex never fails the request: it does not match, and the
//!   failure is logged and counted

use regex::Regex;
use thiserror::Error;

use crate::observability::metrics;

/// The universal rule.
pub const ANY: &str = "*";

const REGEX_PREFIX: &str = "re:";

/// A malformed allow-rule.
#[derive(Debug, Error)]
#[error("invalid allow-rule pattern '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// A parsed allow-rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowRule {
    /// `*`
    Any,
    /// Literal comparison.
    Exact(String),
    /// `*.suffix`, holding the bare suffix.
    WildcardDomain(String),
    /// Pattern with one or more `*` anywhere else.
    Glob(String),
    /// `re:` pattern, holding the expression without the prefix.
    Regex(String),
}

impl AllowRule {
    /// Infer the rule kind from its textual form.
    ///
    /// Returns `None` for an empty pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }
        if pattern == ANY {
            return Some(AllowRule::Any);
        }
        if let Some(expr) = pattern.strip_prefix(REGEX_PREFIX) {
            return Some(AllowRule::Regex(expr.to_string()));
        }
        if let Some(suffix) = pattern.strip_prefix("*.") {
            if !suffix.is_empty() && !suffix.contains('*') {
                return Some(AllowRule::WildcardDomain(suffix.to_string()));
            }
        }
        if pattern.contains('*') {
            return Some(AllowRule::Glob(pattern.to_string()));
        }
        Some(AllowRule::Exact(pattern.to_string()))
    }

    /// Compile the rule to an anchored regex, if it needs one.
    pub fn compile(&self) -> Result<Option<Regex>, PatternError> {
        let invalid = |e: regex::Error| PatternError {
            pattern: self.to_string(),
            message: e.to_string(),
        };
        let source = match self {
            AllowRule::Regex(expr) => {
                // Validate the bare expression; wrapping can balance a stray `)`.
                Regex::new(expr).map_err(invalid)?;
                format!("^(?:{expr})$")
            }
            AllowRule::Glob(glob) => {
                let escaped: Vec<String> = glob.split('*').map(regex::escape).collect();
                format!("^{}$", escaped.join(".*"))
            }
            _ => return Ok(None),
        };
        Regex::new(&source).map(Some).map_err(invalid)
    }

    /// Test a concrete value against this rule.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            AllowRule::Any => true,
            AllowRule::Exact(expected) => value == expected,
            AllowRule::WildcardDomain(suffix) => {
                value == suffix
                    || value
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|head| head.len() > 1 && head.ends_with('.'))
            }
            AllowRule::Glob(_) | AllowRule::Regex(_) => match self.compile() {
                Ok(Some(re)) => re.is_match(value),
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!(
                        pattern = %e.pattern,
                        error = %e.message,
                        "Invalid allow-rule treated as non-matching"
                    );
                    metrics::record_invalid_pattern();
                    false
                }
            },
        }
    }
}

impl std::fmt::Display for AllowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllowRule::Any => write!(f, "{ANY}"),
            AllowRule::Exact(s) | AllowRule::Glob(s) => write!(f, "{s}"),
            AllowRule::WildcardDomain(suffix) => write!(f, "*.{suffix}"),
            AllowRule::Regex(expr) => write!(f, "{REGEX_PREFIX}{expr}"),
        }
    }
}

/// Match a possibly-absent value against a single pattern.
///
/// An absent value never matches, not even `*`.
pub fn matches(value: Option<&str>, pattern: &str) -> bool {
    let Some(value) = value else {
        return false;
    };
    AllowRule::parse(pattern).is_some_and(|rule| rule.matches(value))
}

/// True iff any pattern in the ordered list matches.
///
/// A literal `*` anywhere in the list short-circuits to a match.
pub fn matches_any<S: AsRef<str>>(value: Option<&str>, patterns: &[S]) -> bool {
    if value.is_none() {
        return false;
    }
    if patterns.iter().any(|p| p.as_ref() == ANY) {
        return true;
    }
    patterns.iter().any(|p| matches(value, p.as_ref()))
}

/// Collect every malformed rule in a list, for configuration diagnostics.
pub fn invalid_rules<S: AsRef<str>>(patterns: &[S]) -> Vec<PatternError> {
    patterns
        .iter()
        .filter_map(|p| AllowRule::parse(p.as_ref()))
        .filter_map(|rule| rule.compile().err())
        .collect()
}
