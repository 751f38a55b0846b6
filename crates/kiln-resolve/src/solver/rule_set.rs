use std::collections::HashMap;

use super::rule::{Literal, Rule, RuleType};

/// Collection of rules with sequential ids and content dedup
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    seen: HashMap<(bool, Vec<Literal>), u32>,
    counts: HashMap<RuleType, usize>,
}

impl RuleSet {
    /// Create a new empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its id or the id of an identical existing rule
    pub fn add(&mut self, mut rule: Rule) -> u32 {
        let mut key = rule.literals().to_vec();
        key.sort_unstable();
        let key = (rule.is_at_most_one(), key);
        if let Some(&existing) = self.seen.get(&key) {
            return existing;
        }

        let id = self.rules.len() as u32;
        rule.set_id(id);
        *self.counts.entry(rule.rule_type()).or_default() += 1;
        self.seen.insert(key, id);
        self.rules.push(rule);
        id
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules of one type
    pub fn count(&self, rule_type: RuleType) -> usize {
        self.counts.get(&rule_type).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_content() {
        let mut rules = RuleSet::new();
        let a = rules.add(Rule::new(vec![1, -2], RuleType::Depends));
        let b = rules.add(Rule::new(vec![-2, 1], RuleType::Depends));
        let c = rules.add(Rule::at_most_one(vec![2, 3]));
        let d = rules.add(Rule::new(vec![-2, -3], RuleType::Breaks));

        assert_eq!(a, b);
        assert_ne!(c, d);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.count(RuleType::SameIdentifier), 1);
    }
}
