//! Branch-and-bound optimizer over the rule set.
//!
//! The objective is a list of tiers, each a weighted set of literals the
//! solver wants true. Tiers compare lexicographically: any gain in an
//! earlier tier outweighs every combination of later ones. This is the
//! exact equivalent of exponentially scaled pseudo-boolean weights without
//! big integers.
//!
//! Search is conflict driven. Decisions follow the objective order with the
//! preferred polarity first, so the first complete assignment is usually
//! already close to optimal. Every conflict is analyzed down to its first
//! unique implication point; the learned clause is kept and the search
//! jumps back to the second highest level in it. A branch whose optimistic
//! bound cannot beat the incumbent is treated as a conflict on the clause
//! "one of the objective literals ruled out so far must hold", which stays
//! valid as the incumbent improves.

use std::time::Instant;

use super::decisions::{Decisions, Reason};
use super::rule::{Literal, Rule, RuleType};
use super::rule_set::RuleSet;
use super::watch_graph::{PropagateResult, WatchGraph};

/// Nodes between two deadline checks
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Lexicographic weighted objective
#[derive(Debug, Clone, Default)]
pub struct Objective {
    tiers: Vec<Vec<(Literal, u64)>>,
}

impl Objective {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier below every existing one; empty tiers are skipped
    pub fn push_tier(&mut self, tier: Vec<(Literal, u64)>) {
        if !tier.is_empty() {
            self.tiers.push(tier);
        }
    }

    /// Tier values of a complete model
    pub fn score(&self, model: &[bool]) -> Vec<u64> {
        self.tiers
            .iter()
            .map(|tier| {
                tier.iter()
                    .filter(|(l, _)| model[l.unsigned_abs() as usize] == (*l > 0))
                    .map(|(_, w)| w)
                    .sum()
            })
            .collect()
    }

    /// Best reachable tier values given a partial assignment
    fn upper_bound(&self, decisions: &Decisions) -> Vec<u64> {
        self.tiers
            .iter()
            .map(|tier| {
                tier.iter()
                    .filter(|(l, _)| !decisions.conflict(*l))
                    .map(|(_, w)| w)
                    .sum()
            })
            .collect()
    }

    /// Every variable once, objective literals first in their preferred polarity
    fn decision_order(&self, num_vars: usize) -> Vec<Literal> {
        let mut seen = vec![false; num_vars + 1];
        let mut order = Vec::with_capacity(num_vars);

        for &(literal, _) in self.tiers.iter().flatten() {
            let var = literal.unsigned_abs() as usize;
            if !seen[var] {
                seen[var] = true;
                order.push(literal);
            }
        }
        for var in 1..=num_vars {
            if !seen[var] {
                order.push(-(var as Literal));
            }
        }

        order
    }
}

/// The deadline passed before the search finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

struct Search<'a> {
    /// Input rules followed by learned clauses
    rules: RuleSet,
    objective: &'a Objective,
    graph: WatchGraph,
    decisions: Decisions,
    propagated: usize,
    order: Vec<Literal>,
    best: Option<(Vec<u64>, Vec<bool>)>,
    deadline: Instant,
    nodes: u64,
}

fn var(literal: Literal) -> usize {
    literal.unsigned_abs() as usize
}

impl Search<'_> {
    /// Propagate pending assignments, returning a falsified clause on conflict
    fn propagate(&mut self) -> Option<Vec<Literal>> {
        while self.propagated < self.decisions.len() {
            let literal = self.decisions.at(self.propagated);
            self.propagated += 1;
            if let PropagateResult::Conflict(clause) =
                self.graph.propagate(-literal, &self.rules, &mut self.decisions)
            {
                return Some(clause);
            }
        }
        None
    }

    /// Clause that every strictly better assignment satisfies, if the
    /// current one cannot beat the incumbent anymore
    fn bound_conflict(&self) -> Option<Vec<Literal>> {
        let (best, _) = self.best.as_ref()?;
        let bound = self.objective.upper_bound(&self.decisions);
        if bound > *best {
            return None;
        }

        // Tiers before the first one that falls short are tied at best
        let last = bound
            .iter()
            .zip(best)
            .position(|(b, s)| b != s)
            .unwrap_or_else(|| bound.len().saturating_sub(1));
        Some(
            self.objective
                .tiers
                .iter()
                .take(last + 1)
                .flatten()
                .map(|&(literal, _)| literal)
                .filter(|&literal| self.decisions.conflict(literal))
                .collect(),
        )
    }

    fn next_decision(&self) -> Option<Literal> {
        self.order
            .iter()
            .copied()
            .find(|&literal| self.decisions.undecided(var(literal)))
    }

    /// Literals of the clause that implied `variable`, all false except its own
    fn reason_clause(&self, variable: usize) -> Vec<Literal> {
        match self.decisions.reason(variable) {
            Some(Reason::Rule(id)) => self
                .rules
                .get(id)
                .map(|rule| rule.literals().to_vec())
                .unwrap_or_default(),
            Some(Reason::AtMostOne(cause)) => vec![cause],
            None => Vec::new(),
        }
    }

    /// First unique implication point analysis at the current level.
    ///
    /// Returns the learned clause with the asserting literal first and a
    /// literal of the backjump level second, plus that level.
    fn analyze(&self, conflict: Vec<Literal>) -> (Vec<Literal>, u32) {
        let level = self.decisions.level();
        let mut seen = vec![false; self.order.len() + 1];
        let mut learned = vec![0];
        let mut pending = 0usize;
        let mut clause = conflict;
        let mut index = self.decisions.len();

        loop {
            for &literal in &clause {
                let v = var(literal);
                let literal_level = self.decisions.level_of(v);
                if seen[v] || literal_level == 0 {
                    continue;
                }
                seen[v] = true;
                if literal_level == level {
                    pending += 1;
                } else {
                    learned.push(literal);
                }
            }

            let implied = loop {
                index -= 1;
                let literal = self.decisions.at(index);
                if seen[var(literal)] {
                    break literal;
                }
            };
            pending -= 1;
            if pending == 0 {
                learned[0] = -implied;
                break;
            }
            clause = self.reason_clause(var(implied));
        }

        let second = (1..learned.len()).max_by_key(|&i| self.decisions.level_of(var(learned[i])));
        let jump = match second {
            Some(i) => {
                learned.swap(1, i);
                self.decisions.level_of(var(learned[1]))
            }
            None => 0,
        };

        (learned, jump)
    }

    /// Learn from a falsified clause and jump back.
    ///
    /// Returns false once the conflict holds at level 0, i.e. nothing better
    /// than the incumbent exists.
    fn resolve(&mut self, conflict: Vec<Literal>) -> bool {
        let level = conflict
            .iter()
            .map(|&literal| self.decisions.level_of(var(literal)))
            .max()
            .unwrap_or(0);
        if level == 0 {
            return false;
        }
        if level < self.decisions.level() {
            self.decisions.revert_to(level);
            self.propagated = self.decisions.len();
        }

        let (learned, jump) = self.analyze(conflict);
        self.decisions.revert_to(jump);
        self.propagated = self.decisions.len();

        let asserting = learned[0];
        let known = self.rules.len();
        let watch = (learned.len() > 1).then(|| [learned[0], learned[1]]);
        let rule_id = self.rules.add(Rule::new(learned, RuleType::Learned));
        if let Some(pair) = watch {
            if rule_id as usize >= known {
                self.graph.add_learned(rule_id, pair);
            }
        }
        self.decisions.decide(asserting, Some(Reason::Rule(rule_id)));
        true
    }

    fn run(mut self) -> Result<Option<Vec<bool>>, Interrupted> {
        for rule in self.rules.iter() {
            match rule.literals() {
                [] => return Ok(None),
                [literal] => {
                    if !self.decisions.decide(*literal, Some(Reason::Rule(rule.id()))) {
                        return Ok(None);
                    }
                }
                _ => {}
            }
        }

        loop {
            self.nodes += 1;
            if self.nodes % DEADLINE_CHECK_INTERVAL == 1 && Instant::now() >= self.deadline {
                return Err(Interrupted);
            }

            if let Some(conflict) = self.propagate().or_else(|| self.bound_conflict()) {
                if !self.resolve(conflict) {
                    return Ok(self.best.map(|(_, model)| model));
                }
                continue;
            }

            match self.next_decision() {
                Some(literal) => {
                    self.decisions.set_level(self.decisions.level() + 1);
                    self.decisions.decide(literal, None);
                }
                None => {
                    let model = self.decisions.model();
                    let score = self.objective.score(&model);
                    self.best = Some((score, model));
                }
            }
        }
    }
}

/// Find the assignment maximizing `objective` subject to `rules`.
///
/// Returns `Ok(None)` if the rules cannot be satisfied. The returned model
/// is indexed by variable (index 0 unused).
pub fn optimize(
    rules: &RuleSet,
    num_vars: usize,
    objective: &Objective,
    deadline: Instant,
) -> Result<Option<Vec<bool>>, Interrupted> {
    Search {
        rules: rules.clone(),
        objective,
        graph: WatchGraph::from_rules(rules, num_vars),
        decisions: Decisions::new(num_vars),
        propagated: 0,
        order: objective.decision_order(num_vars),
        best: None,
        deadline,
        nodes: 0,
    }
    .run()
}
