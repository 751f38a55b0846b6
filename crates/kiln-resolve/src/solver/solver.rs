use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use log::{debug, info};

use super::encoder::{encode, Encoding, Mode};
use super::engine::{optimize, Interrupted};
use super::fix::{synthesize_additions, AddedMod};
use super::problem::{Explanation, Fix, ModRef, Replacement, Resolution, ResolutionFailure, Selection};
use super::rule::RuleType;
use super::variables::DomainVar;
use crate::candidate::{CandidateId, CandidateStore};
use crate::config::DEFAULT_SOLVER_TIMEOUT_SECS;
use crate::error::SolverTimeout;
use crate::metadata::{Dependency, DependencyKind};

/// Selects one consistent set of candidates.
///
/// Infeasibility is a normal outcome: it is analyzed into explanations and,
/// when possible, a proposed fix. Only running out of time is an error.
pub struct ModSolver<'a> {
    store: &'a CandidateStore,
    order: &'a [CandidateId],
    positions: HashMap<CandidateId, usize>,
    timeout: Duration,
}

impl<'a> ModSolver<'a> {
    /// Create a solver over `order`, which must list every candidate by priority
    pub fn new(store: &'a CandidateStore, order: &'a [CandidateId]) -> Self {
        Self {
            store,
            order,
            positions: order.iter().enumerate().map(|(i, &id)| (id, i)).collect(),
            timeout: Duration::from_secs(DEFAULT_SOLVER_TIMEOUT_SECS),
        }
    }

    /// Set the wall-clock budget shared by solving and failure analysis
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Solve with some candidates fixed as selected
    pub fn solve(&self, preselected: &[CandidateId]) -> Result<Resolution, SolverTimeout> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let encoding = encode(self.store, self.order, preselected, Mode::Normal);
        info!(
            "Solving {} candidates: {} rules ({} dependency, {} at-most-one, {} mandatory)",
            self.order.len(),
            encoding.rules.len(),
            encoding.rules.count(RuleType::Depends) + encoding.rules.count(RuleType::Breaks),
            encoding.rules.count(RuleType::SameIdentifier),
            encoding.rules.count(RuleType::Mandatory),
        );

        if let Some(model) = self.run(&encoding, deadline)? {
            let selected: Vec<CandidateId> = self
                .order
                .iter()
                .copied()
                .filter(|&id| is_selected(&encoding, &model, id))
                .collect();
            info!(
                "Selected {} of {} candidates in {:?}",
                selected.len(),
                self.order.len(),
                started.elapsed()
            );
            return Ok(Resolution::Success(Selection { selected }));
        }

        debug!("No selection satisfies every rule, analyzing the failure");
        let failure = self.analyze(preselected, deadline)?;
        info!(
            "Resolution failed after {:?} with {} explanation(s)",
            started.elapsed(),
            failure.explanations.len()
        );
        Ok(Resolution::Failure(failure))
    }

    fn run(&self, encoding: &Encoding, deadline: Instant) -> Result<Option<Vec<bool>>, SolverTimeout> {
        optimize(&encoding.rules, encoding.vars.len(), &encoding.objective, deadline)
            .map_err(|Interrupted| SolverTimeout(self.timeout))
    }

    fn position(&self, id: CandidateId) -> usize {
        self.positions.get(&id).copied().unwrap_or(usize::MAX)
    }

    fn analyze(&self, preselected: &[CandidateId], deadline: Instant) -> Result<ResolutionFailure, SolverTimeout> {
        let encoding = encode(self.store, self.order, preselected, Mode::Explain);
        let Some(model) = self.run(&encoding, deadline)? else {
            debug!("Disabling dependencies does not help, no explanation available");
            return Ok(ResolutionFailure::new(Vec::new(), None));
        };

        let mut disabled: Vec<(CandidateId, usize)> = encoding
            .vars
            .iter()
            .filter(|(literal, _)| model[*literal as usize])
            .filter_map(|(_, var)| match var {
                DomainVar::DisableDep { source, index } => Some((*source, *index)),
                _ => None,
            })
            .collect();
        disabled.sort_by_key(|&(source, index)| (self.position(source), index));

        let explanations: Vec<Explanation> = disabled
            .into_iter()
            .filter_map(|(source, index)| {
                let record = self.store.get(source)?;
                let dependency = record.metadata.dependencies.get(index)?.clone();
                let present = self.present(&encoding, &model, &dependency, source);
                Some(Explanation {
                    source: ModRef::of(record),
                    dependency,
                    present,
                })
            })
            .collect();
        for explanation in &explanations {
            debug!(
                "Immediate cause: {} {} {}",
                explanation.source, explanation.dependency.kind, explanation.dependency.target
            );
        }

        let additions = synthesize_additions(
            explanations
                .iter()
                .map(|e| &e.dependency)
                .filter(|d| d.kind == DependencyKind::Depends),
        );
        debug!("Trying fix with {} synthetic addition(s)", additions.len());

        let fix = self.fix(preselected, &additions, &encoding, &model, deadline)?;
        Ok(ResolutionFailure::new(explanations, fix))
    }

    /// Candidates of a dependency target as they stood in the explanation model
    fn present(
        &self,
        encoding: &Encoding,
        model: &[bool],
        dependency: &Dependency,
        source: CandidateId,
    ) -> Vec<ModRef> {
        let mut providers: Vec<CandidateId> = self
            .store
            .providers(&dependency.target)
            .iter()
            .copied()
            .filter(|&id| id != source)
            .collect();
        providers.sort_by_key(|&id| self.position(id));

        let selected: Vec<CandidateId> = providers
            .iter()
            .copied()
            .filter(|&id| is_selected(encoding, model, id))
            .collect();

        let chosen = match dependency.kind {
            DependencyKind::Breaks => selected
                .into_iter()
                .filter(|&id| self.store.get(id).is_some_and(|r| dependency.matches(r.version())))
                .collect(),
            _ if selected.is_empty() => providers,
            _ => selected,
        };

        chosen
            .into_iter()
            .filter_map(|id| self.store.get(id).map(ModRef::of))
            .collect()
    }

    fn fix(
        &self,
        preselected: &[CandidateId],
        additions: &[AddedMod],
        explained: &Encoding,
        explained_model: &[bool],
        deadline: Instant,
    ) -> Result<Option<Fix>, SolverTimeout> {
        let encoding = encode(self.store, self.order, preselected, Mode::Fix(additions));
        let Some(model) = self.run(&encoding, deadline)? else {
            debug!("No combination of additions and removals makes the mod set solvable");
            return Ok(None);
        };

        let mut fix = Fix::default();
        let mut replaced: BTreeSet<CandidateId> = BTreeSet::new();

        for (index, addition) in additions.iter().enumerate() {
            if !is_true(&encoding, &model, DomainVar::Add(index)) {
                continue;
            }

            let mut existing: Vec<CandidateId> = self
                .store
                .providers(&addition.id)
                .iter()
                .copied()
                .filter(|&id| {
                    self.store.get(id).is_some_and(|r| {
                        r.identifier() == addition.id
                            && (r.is_root() || is_selected(explained, explained_model, id))
                    })
                })
                .collect();
            existing.sort_by_key(|&id| {
                let selected = is_selected(explained, explained_model, id);
                (!selected, self.position(id))
            });

            match existing.first().and_then(|&id| self.store.get(id)) {
                Some(old) if replaced.insert(old.id) => fix.replacements.push(Replacement {
                    old: ModRef::of(old),
                    new: addition.clone(),
                }),
                _ => fix.additions.push(addition.clone()),
            }
        }

        for (literal, var) in encoding.vars.iter() {
            if let DomainVar::Remove(id) = var {
                if model[literal as usize] && !replaced.contains(id) {
                    if let Some(record) = self.store.get(*id) {
                        fix.removals.push(ModRef::of(record));
                    }
                }
            }
        }
        fix.removals.sort_by_key(|m| self.position(m.candidate));

        debug!(
            "Fix found: {} addition(s), {} replacement(s), {} removal(s)",
            fix.additions.len(),
            fix.replacements.len(),
            fix.removals.len()
        );
        Ok(Some(fix))
    }
}

fn is_selected(encoding: &Encoding, model: &[bool], id: CandidateId) -> bool {
    encoding
        .candidate(id)
        .is_some_and(|literal| model[literal as usize])
}

fn is_true(encoding: &Encoding, model: &[bool], var: DomainVar) -> bool {
    encoding
        .vars
        .get(&var)
        .is_some_and(|literal| model[literal as usize])
}
