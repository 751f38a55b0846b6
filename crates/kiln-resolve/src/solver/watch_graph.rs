use super::decisions::{Decisions, Reason};
use super::rule::{Literal, Rule};
use super::rule_set::RuleSet;

/// Two-watched-literal index for unit propagation.
///
/// Each clause with at least two literals watches two of them and is only
/// visited when one of those becomes false. At-most-one rules watch all of
/// their literals, since any member becoming selected forces all others out.
///
/// Watches never need restoring on backtrack: a watched literal that was
/// false becomes undecided again, which keeps the invariant.
#[derive(Debug)]
pub struct WatchGraph {
    /// Rule ids indexed by `literal_to_index`
    watches: Vec<Vec<u32>>,
    /// The two watched literals of each clause, indexed by rule id
    watched: Vec<[Literal; 2]>,
}

/// Outcome of propagating one assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagateResult {
    Ok,
    /// A clause with every literal false under the current assignment
    Conflict(Vec<Literal>),
}

impl WatchGraph {
    /// Convert literal to index (handles positive and negative literals)
    fn literal_to_index(literal: Literal) -> usize {
        let abs = literal.unsigned_abs() as usize;
        if literal > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    /// Build the watch graph from a rule set
    pub fn from_rules(rules: &RuleSet, num_vars: usize) -> Self {
        let mut graph = Self {
            watches: vec![Vec::new(); (num_vars + 1) * 2],
            watched: vec![[0, 0]; rules.len()],
        };

        for rule in rules.iter() {
            graph.add_rule(rule);
        }

        graph
    }

    /// Watch a clause learned during search on two chosen literals.
    ///
    /// `pair` must hold the literals that will be unassigned last, so that
    /// backjumping keeps the watch invariant.
    pub fn add_learned(&mut self, rule_id: u32, pair: [Literal; 2]) {
        let index = rule_id as usize;
        if self.watched.len() <= index {
            self.watched.resize(index + 1, [0, 0]);
        }
        self.watched[index] = pair;
        for literal in pair {
            self.watches[Self::literal_to_index(literal)].push(rule_id);
        }
    }

    fn add_rule(&mut self, rule: &Rule) {
        let literals = rule.literals();
        if literals.len() < 2 {
            return;
        }

        if rule.is_at_most_one() {
            for &literal in literals {
                self.watches[Self::literal_to_index(literal)].push(rule.id());
            }
            return;
        }

        let pair = [literals[0], literals[1]];
        self.watched[rule.id() as usize] = pair;
        for literal in pair {
            self.watches[Self::literal_to_index(literal)].push(rule.id());
        }
    }

    /// Propagate an assignment that just made `false_literal` false.
    ///
    /// Newly forced literals are assigned through `decisions`; the caller
    /// keeps propagating from its queue.
    pub fn propagate(
        &mut self,
        false_literal: Literal,
        rules: &RuleSet,
        decisions: &mut Decisions,
    ) -> PropagateResult {
        let index = Self::literal_to_index(false_literal);
        let watching = std::mem::take(&mut self.watches[index]);
        let mut kept = Vec::with_capacity(watching.len());
        let mut result = PropagateResult::Ok;

        for rule_id in watching {
            if matches!(result, PropagateResult::Conflict(_)) {
                kept.push(rule_id);
                continue;
            }
            let Some(rule) = rules.get(rule_id) else {
                continue;
            };
            kept.push(rule_id);

            if rule.is_at_most_one() {
                // `false_literal` is `-x`: x was selected, every other member goes
                for &literal in rule.literals() {
                    if literal != false_literal
                        && !decisions.decide(literal, Some(Reason::AtMostOne(false_literal)))
                    {
                        result = PropagateResult::Conflict(vec![false_literal, literal]);
                        break;
                    }
                }
                continue;
            }

            let [first, second] = self.watched[rule_id as usize];
            let other = if first == false_literal { second } else { first };
            if decisions.satisfied(other) {
                continue;
            }

            let replacement = rule
                .literals()
                .iter()
                .copied()
                .find(|&l| l != first && l != second && !decisions.conflict(l));
            if let Some(replacement) = replacement {
                kept.pop();
                self.watched[rule_id as usize] = [other, replacement];
                self.watches[Self::literal_to_index(replacement)].push(rule_id);
                continue;
            }

            // Unit or conflict on the other watch
            if !decisions.decide(other, Some(Reason::Rule(rule_id))) {
                result = PropagateResult::Conflict(rule.literals().to_vec());
            }
        }

        self.watches[index].extend(kept);
        result
    }
}
