use super::engine::Objective;
use super::fix::AddedMod;
use super::rule::{Literal, Rule, RuleType};
use super::rule_set::RuleSet;
use super::variables::{DomainVar, VarMap};
use crate::candidate::{CandidateId, CandidateRecord, CandidateStore};
use crate::metadata::{Dependency, DependencyKind, LoadCondition};

/// Which instance to build
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    /// Plain selection
    Normal,
    /// Every hard dependency edge can be switched off at a cost
    Explain,
    /// Synthetic additions and removals of roots are allowed at a cost
    Fix(&'a [AddedMod]),
}

/// Rules, variables and objective of one instance
#[derive(Debug)]
pub struct Encoding {
    pub rules: RuleSet,
    pub vars: VarMap,
    pub objective: Objective,
}

impl Encoding {
    /// Literal of a candidate; every candidate in the order has one
    pub fn candidate(&self, id: CandidateId) -> Option<Literal> {
        self.vars.get(&DomainVar::Candidate(id))
    }
}

struct Encoder<'a> {
    store: &'a CandidateStore,
    order: &'a [CandidateId],
    mode: Mode<'a>,
    rules: RuleSet,
    vars: VarMap,
}

impl Encoder<'_> {
    fn candidate(&mut self, id: CandidateId) -> Literal {
        self.vars.var(DomainVar::Candidate(id))
    }

    fn additions(&self) -> &[AddedMod] {
        match self.mode {
            Mode::Fix(additions) => additions,
            _ => &[],
        }
    }

    /// Addition literals providing `identifier`, optionally filtered by version
    fn addition_literals(&mut self, identifier: &str, dependency: Option<&Dependency>) -> Vec<Literal> {
        let indices: Vec<usize> = self
            .additions()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.id == identifier && dependency.map_or(true, |d| d.matches(&a.version)))
            .map(|(i, _)| i)
            .collect();
        indices.into_iter().map(|i| self.vars.var(DomainVar::Add(i))).collect()
    }

    /// Candidate literals follow priority order, so sorting keeps rules stable
    fn providers(&mut self, identifier: &str) -> Vec<Literal> {
        let members = self.store.providers(identifier).to_vec();
        let mut literals: Vec<Literal> = members.into_iter().map(|m| self.candidate(m)).collect();
        literals.sort_unstable();
        literals.extend(self.addition_literals(identifier, None));
        literals
    }

    /// Literals of everything satisfying a dependency, other than `exclude`
    fn matches(&mut self, dependency: &Dependency, exclude: Option<CandidateId>) -> Vec<Literal> {
        let members: Vec<CandidateId> = self
            .store
            .providers(&dependency.target)
            .iter()
            .copied()
            .filter(|&m| Some(m) != exclude)
            .filter(|&m| self.store.get(m).is_some_and(|r| dependency.matches(r.version())))
            .collect();
        let mut literals: Vec<Literal> = members.into_iter().map(|m| self.candidate(m)).collect();
        literals.sort_unstable();
        literals.extend(self.addition_literals(&dependency.target, Some(dependency)));
        literals
    }

    fn disable(&mut self, source: CandidateId, index: usize) -> Option<Literal> {
        matches!(self.mode, Mode::Explain).then(|| self.vars.var(DomainVar::DisableDep { source, index }))
    }

    fn encode_dependencies(&mut self, record: &CandidateRecord) {
        let c = self.candidate(record.id);

        for (index, dependency) in record.metadata.dependencies.iter().enumerate() {
            match dependency.kind {
                DependencyKind::Depends => {
                    let mut targets = self.matches(dependency, None);
                    targets.extend(self.disable(record.id, index));
                    self.rules.add(Rule::implies_any(c, targets, RuleType::Depends));
                }
                DependencyKind::Recommends => {
                    let mut targets = self.matches(dependency, None);
                    if !targets.is_empty() {
                        targets.push(self.vars.var(DomainVar::OptionalDep(dependency.target.clone())));
                        self.rules.add(Rule::implies_any(c, targets, RuleType::Recommends));
                    }
                }
                DependencyKind::Breaks => {
                    let targets = self.matches(dependency, Some(record.id));
                    let disable = if targets.is_empty() {
                        None
                    } else {
                        self.disable(record.id, index)
                    };
                    for m in targets {
                        let mut literals = vec![-c, -m];
                        literals.extend(disable);
                        self.rules.add(Rule::new(literals, RuleType::Breaks));
                    }
                }
                // Checked after solving
                DependencyKind::Suggests | DependencyKind::Conflicts => {}
            }
        }
    }

    fn encode_at_most_one(&mut self) {
        let mut keys: Vec<String> = self.store.groups().map(|g| g.identifier().to_string()).collect();
        for addition in self.additions() {
            if !keys.contains(&addition.id) {
                keys.push(addition.id.clone());
            }
        }
        keys.sort();

        for key in keys {
            let members = self.providers(&key);
            if members.len() > 1 {
                self.rules.add(Rule::at_most_one(members));
            }
        }
    }

    fn encode_load_conditions(&mut self, record: &CandidateRecord) {
        let c = self.candidate(record.id);
        let always = record.load_condition() == LoadCondition::Always;

        if record.is_root() {
            if !always {
                return;
            }
            let mut choices = self.providers(record.identifier());
            if matches!(self.mode, Mode::Fix(_)) && !record.is_builtin() {
                let remove = self.vars.var(DomainVar::Remove(record.id));
                choices.push(remove);
                self.rules.add(Rule::new(vec![-remove, -c], RuleType::Removal));
            }
            self.rules.add(Rule::new(choices, RuleType::Mandatory));
            return;
        }

        if always {
            let variants = self.providers(record.identifier());
            for &parent in &record.parents {
                let p = self.candidate(parent);
                self.rules.add(Rule::implies_any(p, variants.clone(), RuleType::NestedAlways));
            }
        }

        let parents: Vec<Literal> = record.parents.iter().map(|&p| self.candidate(p)).collect();
        self.rules.add(Rule::implies_any(c, parents, RuleType::Containment));
    }

    fn objective(&mut self) -> Objective {
        let mut objective = Objective::new();

        match self.mode {
            Mode::Normal => {}
            Mode::Explain => {
                let disabled = self
                    .vars
                    .iter()
                    .filter(|(_, v)| matches!(v, DomainVar::DisableDep { .. }))
                    .map(|(l, _)| (-l, 1))
                    .collect();
                objective.push_tier(disabled);
            }
            Mode::Fix(additions) => {
                let mut cost = Vec::new();
                let mut preference = Vec::new();
                for (literal, var) in self.vars.iter() {
                    match var {
                        DomainVar::Add(i) => {
                            cost.push((-literal, 1));
                            let rank = additions
                                .iter()
                                .filter(|a| a.id == additions[*i].id && a.version < additions[*i].version)
                                .count() as u64;
                            preference.push((literal, rank + 1));
                        }
                        DomainVar::Remove(_) => cost.push((-literal, 2)),
                        _ => {}
                    }
                }
                objective.push_tier(cost);
                objective.push_tier(preference);
            }
        }

        let mut deferred = Vec::new();
        for &id in self.order {
            let Some(record) = self.store.get(id) else {
                continue;
            };
            let c = self.candidate(id);
            if record.load_condition() == LoadCondition::IfRecommended {
                deferred.push(c);
            } else {
                objective.push_tier(vec![(c, 1)]);
            }
        }

        let optional = self
            .vars
            .iter()
            .filter(|(_, v)| matches!(v, DomainVar::OptionalDep(_)))
            .map(|(l, _)| (-l, 1))
            .collect();
        objective.push_tier(optional);

        for c in deferred {
            objective.push_tier(vec![(-c, 1)]);
        }

        objective
    }
}

/// Build the rules and objective for the candidates in `order`.
///
/// `order` must hold every candidate of the store in priority order.
pub fn encode(
    store: &CandidateStore,
    order: &[CandidateId],
    preselected: &[CandidateId],
    mode: Mode<'_>,
) -> Encoding {
    let mut encoder = Encoder {
        store,
        order,
        mode,
        rules: RuleSet::new(),
        vars: VarMap::new(),
    };

    for &id in order {
        encoder.candidate(id);
    }
    for record in order.iter().filter_map(|&id| store.get(id)) {
        encoder.encode_dependencies(record);
    }
    encoder.encode_at_most_one();
    for record in order.iter().filter_map(|&id| store.get(id)) {
        encoder.encode_load_conditions(record);
    }
    for &id in preselected {
        let c = encoder.candidate(id);
        encoder.rules.add(Rule::assertion(c, RuleType::Preselected));
    }

    let objective = encoder.objective();
    Encoding {
        rules: encoder.rules,
        vars: encoder.vars,
        objective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{ModLocation, NewCandidate};
    use crate::metadata::ModMetadata;
    use kiln_semver::{Version, VersionPredicate};
    use std::path::PathBuf;

    fn add_root(store: &mut CandidateStore, metadata: ModMetadata) -> CandidateId {
        let path = PathBuf::from(format!("/mods/{}-{}.jar", metadata.id, metadata.version));
        store
            .insert(NewCandidate {
                metadata,
                location: ModLocation::File(path),
                parent: None,
                remap_required: false,
            })
            .unwrap()
            .id()
    }

    fn meta(id: &str, version: &str) -> ModMetadata {
        ModMetadata::new(id, Version::parse(version).unwrap())
    }

    fn dep(kind: DependencyKind, target: &str, predicate: &str) -> Dependency {
        Dependency::new(kind, target, VersionPredicate::parse(predicate).unwrap())
    }

    #[test]
    fn test_unmatched_dependency_forbids_source() {
        let mut store = CandidateStore::new();
        let a = add_root(
            &mut store,
            meta("alpha", "1.0").with_dependency(dep(DependencyKind::Depends, "beta", ">=2.0")),
        );
        add_root(&mut store, meta("beta", "1.0"));
        let order: Vec<CandidateId> = store.ids().collect();

        let encoding = encode(&store, &order, &[], Mode::Normal);
        let c = encoding.candidate(a).unwrap();
        assert!(encoding
            .rules
            .iter()
            .any(|r| r.rule_type() == RuleType::Depends && r.literals() == [-c]));
        assert_eq!(encoding.rules.count(RuleType::Mandatory), 2);
    }

    #[test]
    fn test_explain_mode_adds_toggles() {
        let mut store = CandidateStore::new();
        add_root(
            &mut store,
            meta("alpha", "1.0")
                .with_dependency(dep(DependencyKind::Depends, "beta", ">=2.0"))
                .with_dependency(dep(DependencyKind::Breaks, "gamma", "*"))
                .with_dependency(dep(DependencyKind::Recommends, "delta", "*")),
        );
        add_root(&mut store, meta("gamma", "1.0"));
        let order: Vec<CandidateId> = store.ids().collect();

        let encoding = encode(&store, &order, &[], Mode::Explain);
        let toggles = encoding
            .vars
            .iter()
            .filter(|(_, v)| matches!(v, DomainVar::DisableDep { .. }))
            .count();
        assert_eq!(toggles, 2);
        // No delta candidate, so the recommendation is not encoded
        assert_eq!(encoding.rules.count(RuleType::Recommends), 0);
    }

    #[test]
    fn test_fix_mode_allows_additions_and_removals() {
        let mut store = CandidateStore::new();
        add_root(
            &mut store,
            meta("alpha", "1.0").with_dependency(dep(DependencyKind::Depends, "beta", ">=2.0")),
        );
        add_root(&mut store, meta("beta", "1.0"));
        let order: Vec<CandidateId> = store.ids().collect();
        let additions = vec![AddedMod::new("beta", Version::parse("2.0").unwrap())];

        let encoding = encode(&store, &order, &[], Mode::Fix(&additions));
        assert!(encoding.vars.get(&DomainVar::Add(0)).is_some());
        assert_eq!(encoding.rules.count(RuleType::Removal), 2);
        // beta 1.0 and the synthetic beta 2.0 exclude each other
        assert_eq!(encoding.rules.count(RuleType::SameIdentifier), 1);
    }
}
