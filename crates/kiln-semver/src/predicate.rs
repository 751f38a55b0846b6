//! Version range predicates used by mod dependencies

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::interval::{Endpoint, VersionInterval};
use crate::version::{SemanticVersion, Version, VersionError};

lazy_static! {
    // "1.x", "1.2.x", "1.2.*"
    static ref WILDCARD_RE: Regex = Regex::new(r"^(\d+)(?:\.(\d+))?\.[xX*]$").unwrap();
    static ref OR_SPLIT_RE: Regex = Regex::new(r"\s*\|\|\s*").unwrap();
}

/// Kind of a single version term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Any,
    Exact,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
    Less,
    SameMajor,
    SameMinor,
}

/// One version range term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionTerm {
    /// `*`
    Any,
    /// `1.2.3` or `=1.2.3`
    Exact(Version),
    /// `>=1.2.3`
    GreaterOrEqual(Version),
    /// `<=1.2.3`
    LessOrEqual(Version),
    /// `>1.2.3`
    Greater(Version),
    /// `<1.2.3`
    Less(Version),
    /// `^1.2.3` or `1.x`: at least the version, below the next major
    SameMajor(Version),
    /// `~1.2.3` or `1.2.x`: at least the version, below the next minor
    SameMinor(Version),
}

fn invalid(predicate: &str, reason: impl Into<String>) -> VersionError {
    VersionError::InvalidPredicate {
        predicate: predicate.to_string(),
        reason: reason.into(),
    }
}

impl VersionTerm {
    /// Parse a single term
    pub fn parse(term: &str) -> Result<Self, VersionError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(invalid(term, "empty term"));
        }
        if term == "*" {
            return Ok(VersionTerm::Any);
        }

        if let Some(caps) = WILDCARD_RE.captures(term) {
            let major = caps[1]
                .parse::<u64>()
                .map_err(|e| invalid(term, e.to_string()))?;
            return Ok(match caps.get(2) {
                Some(minor) => {
                    let minor = minor
                        .as_str()
                        .parse::<u64>()
                        .map_err(|e| invalid(term, e.to_string()))?;
                    VersionTerm::SameMinor(Version::from_components(&[major, minor]))
                }
                None => VersionTerm::SameMajor(Version::from_components(&[major])),
            });
        }

        let (operator, rest) = ["^", "~", ">=", "<=", ">", "<", "="]
            .iter()
            .find_map(|op| term.strip_prefix(op).map(|rest| (*op, rest.trim())))
            .unwrap_or(("", term));

        let version = Version::parse(rest).map_err(|e| invalid(term, e.to_string()))?;
        if !version.is_semantic() && !operator.is_empty() && operator != "=" {
            return Err(invalid(term, "non-semantic versions only support exact matching"));
        }

        Ok(match operator {
            "^" => VersionTerm::SameMajor(version),
            "~" => VersionTerm::SameMinor(version),
            ">=" => VersionTerm::GreaterOrEqual(version),
            "<=" => VersionTerm::LessOrEqual(version),
            ">" => VersionTerm::Greater(version),
            "<" => VersionTerm::Less(version),
            _ => VersionTerm::Exact(version),
        })
    }

    /// Get the kind of this term
    pub fn kind(&self) -> TermKind {
        match self {
            VersionTerm::Any => TermKind::Any,
            VersionTerm::Exact(_) => TermKind::Exact,
            VersionTerm::GreaterOrEqual(_) => TermKind::GreaterOrEqual,
            VersionTerm::LessOrEqual(_) => TermKind::LessOrEqual,
            VersionTerm::Greater(_) => TermKind::Greater,
            VersionTerm::Less(_) => TermKind::Less,
            VersionTerm::SameMajor(_) => TermKind::SameMajor,
            VersionTerm::SameMinor(_) => TermKind::SameMinor,
        }
    }

    /// The version operand, `None` for `*`
    pub fn version(&self) -> Option<&Version> {
        match self {
            VersionTerm::Any => None,
            VersionTerm::Exact(v)
            | VersionTerm::GreaterOrEqual(v)
            | VersionTerm::LessOrEqual(v)
            | VersionTerm::Greater(v)
            | VersionTerm::Less(v)
            | VersionTerm::SameMajor(v)
            | VersionTerm::SameMinor(v) => Some(v),
        }
    }

    /// The interval of versions this term admits
    pub fn interval(&self) -> VersionInterval {
        let bounded = |upper: fn(&SemanticVersion) -> SemanticVersion, v: &Version| match v {
            Version::Semantic(s) => VersionInterval::new(
                Endpoint::Inclusive(v.clone()),
                Endpoint::Exclusive(Version::Semantic(upper(&s.release()))),
            ),
            Version::Opaque(_) => VersionInterval::exact(v.clone()),
        };

        match self {
            VersionTerm::Any => VersionInterval::any(),
            VersionTerm::Exact(v) => VersionInterval::exact(v.clone()),
            VersionTerm::GreaterOrEqual(v) => {
                VersionInterval::new(Endpoint::Inclusive(v.clone()), Endpoint::Unbounded)
            }
            VersionTerm::LessOrEqual(v) => {
                VersionInterval::new(Endpoint::Unbounded, Endpoint::Inclusive(v.clone()))
            }
            VersionTerm::Greater(v) => {
                VersionInterval::new(Endpoint::Exclusive(v.clone()), Endpoint::Unbounded)
            }
            VersionTerm::Less(v) => {
                VersionInterval::new(Endpoint::Unbounded, Endpoint::Exclusive(v.clone()))
            }
            VersionTerm::SameMajor(v) => bounded(SemanticVersion::next_major, v),
            VersionTerm::SameMinor(v) => bounded(SemanticVersion::next_minor, v),
        }
    }

    /// Check if a version satisfies this term
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionTerm::Any => true,
            VersionTerm::Exact(v) => v == version,
            _ => self.interval().contains(version),
        }
    }

    /// Human-readable description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            VersionTerm::Any => "any version".to_string(),
            VersionTerm::Exact(v) => format!("version {}", v),
            VersionTerm::GreaterOrEqual(v) => format!("version {} or later", v),
            VersionTerm::LessOrEqual(v) => format!("version {} or earlier", v),
            VersionTerm::SameMajor(Version::Semantic(s)) => {
                format!("any {}.x version", s.component(0))
            }
            VersionTerm::SameMinor(Version::Semantic(s)) => {
                format!("any {}.{}.x version", s.component(0), s.component(1))
            }
            _ => format!("version {}", self.interval()),
        }
    }
}

impl fmt::Display for VersionTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionTerm::Any => write!(f, "*"),
            VersionTerm::Exact(v) => write!(f, "{}", v),
            VersionTerm::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionTerm::LessOrEqual(v) => write!(f, "<={}", v),
            VersionTerm::Greater(v) => write!(f, ">{}", v),
            VersionTerm::Less(v) => write!(f, "<{}", v),
            VersionTerm::SameMajor(v) => write!(f, "^{}", v),
            VersionTerm::SameMinor(v) => write!(f, "~{}", v),
        }
    }
}

/// A dependency version predicate: one or more terms joined by OR
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionPredicate {
    terms: Vec<VersionTerm>,
}

impl VersionPredicate {
    /// A predicate matching every version
    pub fn any() -> Self {
        Self {
            terms: vec![VersionTerm::Any],
        }
    }

    /// Build a predicate from already parsed terms
    pub fn from_terms(terms: Vec<VersionTerm>) -> Result<Self, VersionError> {
        if terms.is_empty() {
            return Err(invalid("", "no terms"));
        }
        Ok(Self { terms })
    }

    /// Parse a predicate string with `||` separated alternatives
    pub fn parse(predicate: &str) -> Result<Self, VersionError> {
        let terms = OR_SPLIT_RE
            .split(predicate.trim())
            .map(VersionTerm::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| match e {
                VersionError::InvalidPredicate { reason, .. } => invalid(predicate, reason),
                other => other,
            })?;
        Self::from_terms(terms)
    }

    /// Parse a list of alternatives, as written in descriptors
    pub fn parse_all<S: AsRef<str>>(alternatives: &[S]) -> Result<Self, VersionError> {
        let mut terms = Vec::new();
        for alternative in alternatives {
            terms.extend(Self::parse(alternative.as_ref())?.terms);
        }
        Self::from_terms(terms)
    }

    /// The OR-ed terms
    pub fn terms(&self) -> &[VersionTerm] {
        &self.terms
    }

    /// Check if a version satisfies any term
    pub fn matches(&self, version: &Version) -> bool {
        self.terms.iter().any(|t| t.matches(version))
    }

    /// Check if this predicate matches everything
    pub fn is_any(&self) -> bool {
        self.terms.iter().any(|t| *t == VersionTerm::Any)
    }

    /// One interval per term
    pub fn intervals(&self) -> Vec<VersionInterval> {
        self.terms.iter().map(VersionTerm::interval).collect()
    }

    /// Human-readable description for diagnostics
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self.terms.iter().map(VersionTerm::describe).collect();
        parts.join(" or ")
    }
}

impl FromStr for VersionPredicate {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionPredicate::parse(s)
    }
}

impl fmt::Display for VersionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.terms.iter().map(VersionTerm::to_string).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn p(s: &str) -> VersionPredicate {
        VersionPredicate::parse(s).unwrap()
    }

    #[test]
    fn test_parse_terms() {
        assert_eq!(VersionTerm::parse("*").unwrap(), VersionTerm::Any);
        assert_eq!(VersionTerm::parse("1.2.3").unwrap().kind(), TermKind::Exact);
        assert_eq!(VersionTerm::parse("=1.2.3").unwrap().kind(), TermKind::Exact);
        assert_eq!(VersionTerm::parse(">=1.2").unwrap().kind(), TermKind::GreaterOrEqual);
        assert_eq!(VersionTerm::parse("<= 1.2").unwrap().kind(), TermKind::LessOrEqual);
        assert_eq!(VersionTerm::parse(">1").unwrap().kind(), TermKind::Greater);
        assert_eq!(VersionTerm::parse("<1").unwrap().kind(), TermKind::Less);
        assert_eq!(VersionTerm::parse("^1.2").unwrap().kind(), TermKind::SameMajor);
        assert_eq!(VersionTerm::parse("~1.2").unwrap().kind(), TermKind::SameMinor);
        assert_eq!(VersionTerm::parse("1.x").unwrap().kind(), TermKind::SameMajor);
        assert_eq!(VersionTerm::parse("1.2.x").unwrap().kind(), TermKind::SameMinor);
    }

    #[test]
    fn test_parse_errors() {
        assert!(VersionPredicate::parse("").is_err());
        assert!(VersionPredicate::parse(">=").is_err());
        assert!(VersionPredicate::parse("^beta").is_err());
        assert!(VersionPredicate::parse("1.0 ||").is_err());
    }

    #[test]
    fn test_opaque_exact() {
        let predicate = p("22w13a");
        assert!(predicate.matches(&v("22w13a")));
        assert!(!predicate.matches(&v("22w14a")));
    }

    #[test]
    fn test_matches() {
        assert!(p(">=1.0").matches(&v("1.0.0")));
        assert!(p(">=1.0").matches(&v("3.0")));
        assert!(!p(">=1.0").matches(&v("0.9")));
        assert!(p("<=1.0").matches(&v("1.0")));
        assert!(!p("<1.0").matches(&v("1.0")));
        assert!(p("^1.2").matches(&v("1.9.9")));
        assert!(!p("^1.2").matches(&v("2.0.0")));
        assert!(!p("^1.2").matches(&v("1.1")));
        assert!(p("~1.2").matches(&v("1.2.7")));
        assert!(!p("~1.2").matches(&v("1.3.0")));
        assert!(p("*").matches(&v("anything")));
    }

    #[test]
    fn test_or_terms() {
        let predicate = p("1.0 || >=2.0");
        assert_eq!(predicate.terms().len(), 2);
        assert!(predicate.matches(&v("1.0")));
        assert!(!predicate.matches(&v("1.5")));
        assert!(predicate.matches(&v("2.1")));
        assert_eq!(predicate.to_string(), "1.0 || >=2.0");

        let listed = VersionPredicate::parse_all(&["1.0", ">=2.0"]).unwrap();
        assert_eq!(listed, predicate);
    }

    #[test]
    fn test_describe() {
        assert_eq!(p("1.2.3").describe(), "version 1.2.3");
        assert_eq!(p(">=1.2").describe(), "version 1.2 or later");
        assert_eq!(p("<=1.2").describe(), "version 1.2 or earlier");
        assert_eq!(p("^1.2").describe(), "any 1.x version");
        assert_eq!(p("~1.2").describe(), "any 1.2.x version");
        assert_eq!(p("*").describe(), "any version");
        assert_eq!(p(">1.0").describe(), "version (1.0,∞)");
        assert_eq!(p("1.0 || 2.0").describe(), "version 1.0 or version 2.0");
    }

    #[test]
    fn test_intervals() {
        let intervals = p("^1.2 || 3.0").intervals();
        assert_eq!(intervals[0].to_string(), "[1.2,2.0)");
        assert_eq!(intervals[1].to_string(), "[3.0,3.0]");
    }
}
