use std::collections::HashMap;

use super::rule::Literal;
use crate::candidate::CandidateId;

/// What a solver variable stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomainVar {
    /// The candidate is selected
    Candidate(CandidateId),
    /// A recommendation on this identifier is allowed to go unmet
    OptionalDep(String),
    /// A hard dependency edge is switched off (failure analysis only)
    DisableDep { source: CandidateId, index: usize },
    /// A synthetic mod is added (fix search only)
    Add(usize),
    /// A root candidate is removed (fix search only)
    Remove(CandidateId),
}

/// Bidirectional mapping between domain variables and solver variables
#[derive(Debug, Default)]
pub struct VarMap {
    vars: Vec<DomainVar>,
    lookup: HashMap<DomainVar, Literal>,
}

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positive literal of a domain variable, allocating it on first use
    pub fn var(&mut self, domain: DomainVar) -> Literal {
        if let Some(&literal) = self.lookup.get(&domain) {
            return literal;
        }
        self.vars.push(domain.clone());
        let literal = self.vars.len() as Literal;
        self.lookup.insert(domain, literal);
        literal
    }

    /// Positive literal of an already allocated variable
    pub fn get(&self, domain: &DomainVar) -> Option<Literal> {
        self.lookup.get(domain).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Variables with their positive literal, in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (Literal, &DomainVar)> {
        self.vars.iter().enumerate().map(|(i, v)| (i as Literal + 1, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_stable() {
        let mut vars = VarMap::new();
        let a = vars.var(DomainVar::Candidate(CandidateId(7)));
        let b = vars.var(DomainVar::OptionalDep("lib".into()));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(vars.var(DomainVar::Candidate(CandidateId(7))), 1);
        assert_eq!(vars.get(&DomainVar::OptionalDep("lib".into())), Some(2));
        assert_eq!(vars.get(&DomainVar::Add(0)), None);
        assert_eq!(vars.iter().map(|(l, _)| l).collect::<Vec<_>>(), vec![1, 2]);
    }
}
