use std::fmt;

/// A literal: positive means the variable is true, negative means false
pub type Literal = i32;

/// Why a rule exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    /// Selected candidate requires one matching target
    Depends,
    /// Selected candidate prefers a matching target or the optional dummy
    Recommends,
    /// Selected candidate forbids a matching target
    Breaks,
    /// At most one candidate per identifier
    SameIdentifier,
    /// Root that must load
    Mandatory,
    /// Nested candidate that must load when its parent does
    NestedAlways,
    /// Nested candidate requires a selected parent
    Containment,
    /// Candidate fixed by the caller
    Preselected,
    /// A removed candidate cannot be selected
    Removal,
    /// Derived from a conflict during search
    Learned,
}

impl RuleType {
    /// Check if this is an at-most-one rule type
    pub fn is_at_most_one(&self) -> bool {
        matches!(self, RuleType::SameIdentifier)
    }
}

/// A clause over literals.
///
/// Ordinary rules are disjunctions: satisfied when one literal is true.
/// At-most-one rules hold negative literals `[-a, -b, -c]` and are satisfied
/// when at most one of `a`, `b`, `c` is true.
#[derive(Clone, PartialEq, Eq)]
pub struct Rule {
    literals: Vec<Literal>,
    rule_type: RuleType,
    id: u32,
}

impl Rule {
    /// Create a new rule, dropping repeated literals
    pub fn new(literals: Vec<Literal>, rule_type: RuleType) -> Self {
        let mut unique = Vec::with_capacity(literals.len());
        for literal in literals {
            if !unique.contains(&literal) {
                unique.push(literal);
            }
        }
        Self {
            literals: unique,
            rule_type,
            id: 0,
        }
    }

    /// Create an assertion rule (single literal that must be true)
    pub fn assertion(literal: Literal, rule_type: RuleType) -> Self {
        Self::new(vec![literal], rule_type)
    }

    /// If `source` is selected, one of `targets` must be
    pub fn implies_any(source: Literal, targets: Vec<Literal>, rule_type: RuleType) -> Self {
        let mut literals = vec![-source];
        literals.extend(targets);
        Self::new(literals, rule_type)
    }

    /// At most one of these variables can be true
    pub fn at_most_one(variables: Vec<Literal>) -> Self {
        Self::new(variables.into_iter().map(|v| -v).collect(), RuleType::SameIdentifier)
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1
    }

    pub fn is_at_most_one(&self) -> bool {
        self.rule_type.is_at_most_one()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule#{}({:?}: {:?})", self.id, self.rule_type, self.literals)
    }
}
