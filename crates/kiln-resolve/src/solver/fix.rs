use std::collections::BTreeMap;
use std::fmt;

use kiln_semver::{derive_version, Version, VersionInterval, VersionPredicate};

use crate::metadata::Dependency;

/// A synthetic mod proposed as part of a fix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddedMod {
    pub id: String,
    pub version: Version,
}

impl AddedMod {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for AddedMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.id, self.version)
    }
}

/// Intersect two sets of disjoint clusters
fn intersect_clusters(a: &[VersionInterval], b: &[VersionInterval]) -> Vec<VersionInterval> {
    let pieces: Vec<VersionInterval> = a
        .iter()
        .flat_map(|x| b.iter().filter_map(move |y| x.intersect(y)))
        .collect();
    VersionInterval::union(&pieces)
}

/// Stand-in versions for one target.
///
/// When the predicates share any versions, a single stand-in is taken from
/// the highest common cluster that yields one. Only when they share none is
/// one stand-in per disjoint cluster of the combined predicates proposed.
fn stand_ins(target: &str, predicates: &[&VersionPredicate]) -> Vec<AddedMod> {
    let per_predicate: Vec<Vec<VersionInterval>> = predicates
        .iter()
        .map(|p| VersionInterval::union(&p.intervals()))
        .collect();

    let common = per_predicate
        .iter()
        .skip(1)
        .fold(per_predicate.first().cloned().unwrap_or_default(), |acc, next| {
            intersect_clusters(&acc, next)
        });
    if !common.is_empty() {
        return common
            .iter()
            .rev()
            .find_map(derive_version)
            .map(|version| AddedMod::new(target, version))
            .into_iter()
            .collect();
    }

    let all: Vec<VersionInterval> = per_predicate.into_iter().flatten().collect();
    let mut additions: Vec<AddedMod> = VersionInterval::union(&all)
        .iter()
        .filter_map(derive_version)
        .map(|version| AddedMod::new(target, version))
        .collect();
    additions.dedup();
    additions
}

/// Propose synthetic mods that would satisfy failed hard dependencies.
///
/// Output is grouped by target identifier in ascending order.
pub fn synthesize_additions<'a, I>(failed: I) -> Vec<AddedMod>
where
    I: IntoIterator<Item = &'a Dependency>,
{
    let mut by_target: BTreeMap<&str, Vec<&VersionPredicate>> = BTreeMap::new();
    for dependency in failed {
        let predicates = by_target.entry(dependency.target.as_str()).or_default();
        if !predicates.contains(&&dependency.predicate) {
            predicates.push(&dependency.predicate);
        }
    }

    by_target
        .into_iter()
        .flat_map(|(target, predicates)| stand_ins(target, &predicates))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DependencyKind;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn depends(target: &str, predicate: &str) -> Dependency {
        Dependency::new(
            DependencyKind::Depends,
            target,
            VersionPredicate::parse(predicate).unwrap(),
        )
    }

    #[test]
    fn test_lower_bound_is_used() {
        let additions = synthesize_additions(&[depends("lib", ">=2.0")]);
        assert_eq!(additions, vec![AddedMod::new("lib", v("2.0"))]);
    }

    #[test]
    fn test_common_version_above_exclusive_bound() {
        let additions = synthesize_additions(&[depends("lib", "~1.2"), depends("lib", ">1.2")]);
        assert_eq!(additions, vec![AddedMod::new("lib", v("1.2.1"))]);
    }

    #[test]
    fn test_common_version_preferred() {
        let additions = synthesize_additions(&[depends("lib", ">=1.0"), depends("lib", ">=1.5 || 0.1")]);
        assert_eq!(additions, vec![AddedMod::new("lib", v("1.5"))]);
    }

    #[test]
    fn test_one_stand_in_per_cluster_without_common_version() {
        let additions = synthesize_additions(&[depends("lib", "1.0"), depends("lib", ">=3.0")]);
        assert_eq!(
            additions,
            vec![AddedMod::new("lib", v("1.0")), AddedMod::new("lib", v("3.0"))]
        );
    }

    #[test]
    fn test_exclusive_bounds() {
        let additions = synthesize_additions(&[depends("a", ">1.2"), depends("b", "<2.0")]);
        assert_eq!(
            additions,
            vec![AddedMod::new("a", v("1.3")), AddedMod::new("b", v("1.0"))]
        );
    }

    #[test]
    fn test_grouped_by_target() {
        let additions = synthesize_additions(&[depends("zeta", "*"), depends("alpha", "1.0"), depends("zeta", "*")]);
        let ids: Vec<&str> = additions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert_eq!(additions[1].version, v("0.0.0"));
    }
}
