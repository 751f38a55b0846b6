//! Version intervals
//!
//! Every predicate term maps to exactly one interval. Intervals are what the
//! fix synthesizer works with: it intersects the ranges that failed for one
//! identifier and derives a concrete version from the result.

use std::cmp::Ordering;
use std::fmt;

use crate::version::{SemanticVersion, Version};

/// One side of an interval
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Unbounded,
    Inclusive(Version),
    Exclusive(Version),
}

impl Endpoint {
    /// The bounding version, if any
    pub fn version(&self) -> Option<&Version> {
        match self {
            Endpoint::Unbounded => None,
            Endpoint::Inclusive(v) | Endpoint::Exclusive(v) => Some(v),
        }
    }

    /// Check if this endpoint includes its version
    pub fn is_inclusive(&self) -> bool {
        matches!(self, Endpoint::Inclusive(_))
    }
}

/// Order two lower endpoints: `Less` means `a` admits more (is looser)
fn cmp_lower(a: &Endpoint, b: &Endpoint) -> Ordering {
    match (a, b) {
        (Endpoint::Unbounded, Endpoint::Unbounded) => Ordering::Equal,
        (Endpoint::Unbounded, _) => Ordering::Less,
        (_, Endpoint::Unbounded) => Ordering::Greater,
        (x, y) => match x.version().cmp(&y.version()) {
            Ordering::Equal => match (x.is_inclusive(), y.is_inclusive()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            ord => ord,
        },
    }
}

/// Order two upper endpoints: `Greater` means `a` admits more (is looser)
fn cmp_upper(a: &Endpoint, b: &Endpoint) -> Ordering {
    match (a, b) {
        (Endpoint::Unbounded, Endpoint::Unbounded) => Ordering::Equal,
        (Endpoint::Unbounded, _) => Ordering::Greater,
        (_, Endpoint::Unbounded) => Ordering::Less,
        (x, y) => match x.version().cmp(&y.version()) {
            Ordering::Equal => match (x.is_inclusive(), y.is_inclusive()) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            },
            ord => ord,
        },
    }
}

/// A contiguous range of versions with optional bounds on each side
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionInterval {
    min: Endpoint,
    max: Endpoint,
}

impl VersionInterval {
    /// Create a new interval
    pub fn new(min: Endpoint, max: Endpoint) -> Self {
        Self { min, max }
    }

    /// The interval containing every version
    pub fn any() -> Self {
        Self::new(Endpoint::Unbounded, Endpoint::Unbounded)
    }

    /// The interval containing exactly one version
    pub fn exact(version: Version) -> Self {
        Self::new(Endpoint::Inclusive(version.clone()), Endpoint::Inclusive(version))
    }

    /// Lower endpoint
    pub fn min(&self) -> &Endpoint {
        &self.min
    }

    /// Upper endpoint
    pub fn max(&self) -> &Endpoint {
        &self.max
    }

    /// Check if both sides are unbounded
    pub fn is_unbounded(&self) -> bool {
        self.min == Endpoint::Unbounded && self.max == Endpoint::Unbounded
    }

    /// Check if a version lies inside the interval
    pub fn contains(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(v) => version >= v,
            Endpoint::Exclusive(v) => version > v,
        };
        let below_max = match &self.max {
            Endpoint::Unbounded => true,
            Endpoint::Inclusive(v) => version <= v,
            Endpoint::Exclusive(v) => version < v,
        };
        above_min && below_max
    }

    /// Check if no version can lie inside the interval
    pub fn is_empty(&self) -> bool {
        match (self.min.version(), self.max.version()) {
            (Some(lo), Some(hi)) => match lo.cmp(hi) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.min.is_inclusive() && self.max.is_inclusive()),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Intersect two intervals, returning `None` when they do not overlap
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = if cmp_lower(&self.min, &other.min) == Ordering::Less {
            other.min.clone()
        } else {
            self.min.clone()
        };
        let max = if cmp_upper(&self.max, &other.max) == Ordering::Greater {
            other.max.clone()
        } else {
            self.max.clone()
        };

        let result = Self::new(min, max);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Check if `other` starts inside or right at the end of this interval
    fn touches(&self, other: &Self) -> bool {
        match (&self.max, &other.min) {
            (Endpoint::Unbounded, _) | (_, Endpoint::Unbounded) => true,
            (hi, lo) => match hi.version().cmp(&lo.version()) {
                Ordering::Greater => true,
                Ordering::Equal => hi.is_inclusive() || lo.is_inclusive(),
                Ordering::Less => false,
            },
        }
    }

    /// Merge a list of intervals into sorted, disjoint clusters
    pub fn union(intervals: &[VersionInterval]) -> Vec<VersionInterval> {
        let mut sorted: Vec<&VersionInterval> =
            intervals.iter().filter(|i| !i.is_empty()).collect();
        sorted.sort_by(|a, b| cmp_lower(&a.min, &b.min));

        let mut clusters: Vec<VersionInterval> = Vec::new();
        for interval in sorted {
            match clusters.last_mut() {
                Some(last) if last.touches(interval) => {
                    if cmp_upper(&interval.max, &last.max) == Ordering::Greater {
                        last.max = interval.max.clone();
                    }
                }
                _ => clusters.push(interval.clone()),
            }
        }

        clusters
    }
}

impl fmt::Display for VersionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min {
            Endpoint::Unbounded => write!(f, "(-∞")?,
            Endpoint::Inclusive(v) => write!(f, "[{}", v)?,
            Endpoint::Exclusive(v) => write!(f, "({}", v)?,
        }
        write!(f, ",")?;
        match &self.max {
            Endpoint::Unbounded => write!(f, "∞)"),
            Endpoint::Inclusive(v) => write!(f, "{}]", v),
            Endpoint::Exclusive(v) => write!(f, "{})", v),
        }
    }
}

/// Semantic version strictly above `v` by construction.
///
/// The last component is bumped (1.2 -> 1.3) unless that leaves `interval`,
/// in which case one component is appended instead (1.2 -> 1.2.1).
fn version_after(v: &SemanticVersion, interval: &VersionInterval) -> SemanticVersion {
    if v.is_pre_release() {
        return v.release();
    }
    let mut components = v.components().to_vec();
    if components.is_empty() {
        components.push(0);
    }

    let mut bumped = components.clone();
    if let Some(last) = bumped.last_mut() {
        *last = last.saturating_add(1);
    }
    let bumped = SemanticVersion::new(bumped);
    if interval.contains(&Version::Semantic(bumped.clone())) {
        return bumped;
    }

    components.push(1);
    SemanticVersion::new(components)
}

/// Largest semantic version strictly below `v` by construction
fn version_before(v: &SemanticVersion) -> Option<SemanticVersion> {
    let mut components = v.components().to_vec();
    let index = components.iter().rposition(|&c| c != 0)?;
    components[index] -= 1;
    Some(SemanticVersion::new(components))
}

/// Derive one deterministic concrete version inside an interval.
///
/// Inclusive bounds are used as-is, the lower bound preferred. An exclusive
/// lower bound yields the next version above it that the interval still
/// contains, an exclusive upper bound
/// (with no lower bound) yields a version just below it, and a fully
/// unbounded interval yields `0.0.0`. Returns `None` if no such version
/// exists or the interval bounds opaque versions exclusively.
pub fn derive_version(interval: &VersionInterval) -> Option<Version> {
    if interval.is_empty() {
        return None;
    }

    let candidate = match (interval.min(), interval.max()) {
        (Endpoint::Inclusive(v), _) => v.clone(),
        (Endpoint::Exclusive(v), _) => Version::Semantic(version_after(v.as_semantic()?, interval)),
        (Endpoint::Unbounded, Endpoint::Inclusive(v)) => v.clone(),
        (Endpoint::Unbounded, Endpoint::Exclusive(v)) => {
            Version::Semantic(version_before(v.as_semantic()?)?)
        }
        (Endpoint::Unbounded, Endpoint::Unbounded) => Version::from_components(&[0, 0, 0]),
    };

    if interval.contains(&candidate) {
        Some(candidate)
    } else {
        None
    }
}
