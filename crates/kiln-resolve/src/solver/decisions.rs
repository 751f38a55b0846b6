use super::rule::Literal;

/// Why a literal was assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Every other literal of this clause was false
    Rule(u32),
    /// An at-most-one rule excluded the variable after the member behind
    /// this (now false) literal was selected
    AtMostOne(Literal),
}

/// Variable assignments made during search.
///
/// `decision_map` is indexed by variable: 0 = undecided, `+(level+1)` =
/// true at `level`, `-(level+1)` = false at `level`. The queue keeps the
/// literals in assignment order so that backtracking can pop them, each
/// with the reason it was implied (`None` for a free decision).
#[derive(Debug)]
pub struct Decisions {
    decision_map: Vec<i32>,
    reasons: Vec<Option<Reason>>,
    queue: Vec<Literal>,
    level: u32,
}

impl Decisions {
    /// Create a new decisions tracker for `num_vars` variables
    pub fn new(num_vars: usize) -> Self {
        Self {
            decision_map: vec![0; num_vars + 1],
            reasons: vec![None; num_vars + 1],
            queue: Vec::with_capacity(num_vars),
            level: 0,
        }
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// Assign a literal at the current level.
    ///
    /// Returns false if the variable is already assigned the other way.
    pub fn decide(&mut self, literal: Literal, reason: Option<Reason>) -> bool {
        let var = literal.unsigned_abs() as usize;
        let existing = self.decision_map[var];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        // level+1 so that level 0 is distinguishable from undecided
        let level_value = (self.level + 1) as i32;
        self.decision_map[var] = if literal > 0 { level_value } else { -level_value };
        self.reasons[var] = reason;
        self.queue.push(literal);
        true
    }

    /// Level at which an assigned variable was decided
    #[inline]
    pub fn level_of(&self, var: usize) -> u32 {
        self.decision_map[var].unsigned_abs().saturating_sub(1)
    }

    /// Reason of an assigned variable, `None` for free decisions
    #[inline]
    pub fn reason(&self, var: usize) -> Option<Reason> {
        self.reasons[var]
    }

    /// Value of a literal: `None` if undecided
    #[inline]
    pub fn value(&self, literal: Literal) -> Option<bool> {
        match self.decision_map[literal.unsigned_abs() as usize] {
            0 => None,
            d => Some((d > 0) == (literal > 0)),
        }
    }

    /// Check if a literal is true
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        self.value(literal) == Some(true)
    }

    /// Check if a literal is false
    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        self.value(literal) == Some(false)
    }

    #[inline]
    pub fn undecided(&self, var: usize) -> bool {
        self.decision_map[var] == 0
    }

    /// Number of assignments made so far
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The assignment at a queue position
    pub fn at(&self, index: usize) -> Literal {
        self.queue[index]
    }

    /// Undo every assignment made above `level`
    pub fn revert_to(&mut self, level: u32) {
        while let Some(&literal) = self.queue.last() {
            let var = literal.unsigned_abs() as usize;
            if self.decision_map[var].unsigned_abs() - 1 <= level {
                break;
            }
            self.decision_map[var] = 0;
            self.reasons[var] = None;
            self.queue.pop();
        }
        self.level = level;
    }

    /// Snapshot of all assignments, indexed by variable
    pub fn model(&self) -> Vec<bool> {
        self.decision_map.iter().map(|&d| d > 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_and_conflict() {
        let mut decisions = Decisions::new(3);
        assert!(decisions.decide(1, None));
        assert!(decisions.decide(-2, Some(Reason::Rule(0))));
        assert!(decisions.decide(1, None));
        assert!(!decisions.decide(-1, None));

        assert!(decisions.satisfied(1));
        assert!(decisions.satisfied(-2));
        assert!(decisions.conflict(2));
        assert_eq!(decisions.value(3), None);
    }

    #[test]
    fn test_revert_to_level() {
        let mut decisions = Decisions::new(3);
        decisions.decide(1, None);
        decisions.set_level(1);
        decisions.decide(2, None);
        decisions.set_level(2);
        decisions.decide(-3, Some(Reason::AtMostOne(-2)));
        assert_eq!(decisions.level_of(3), 2);
        assert_eq!(decisions.reason(3), Some(Reason::AtMostOne(-2)));

        decisions.revert_to(1);
        assert_eq!(decisions.len(), 2);
        assert!(decisions.undecided(3));
        assert_eq!(decisions.reason(3), None);
        assert_eq!(decisions.level_of(2), 1);

        decisions.revert_to(0);
        assert_eq!(decisions.len(), 1);
        assert!(decisions.satisfied(1));
    }
}
