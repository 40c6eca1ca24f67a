//! # Rule Model
//!
//! Association rule discovered by a mining engine. Rules are created during
//! result import and are immutable afterwards, except for the clipboard flag.

use super::rule_graph::{CedentId, RuleGraph, RuleGraphResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: i64,
    pub task_id: i64,
    pub text: String,
    /// Four-field contingency table
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    pub confidence: f64,
    pub support: f64,
    pub lift: Option<f64>,
    /// Weak references into the rule graph; rules never own cedents
    pub antecedent: Option<CedentId>,
    pub consequent: Option<CedentId>,
    /// Marked as interesting by the user
    pub in_rule_clipboard: bool,
}

/// Rules of one task together with the graph their cedents live in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRuleSet {
    /// Insertion order
    pub rules: Vec<Rule>,
    pub graph: RuleGraph,
}

impl TaskRuleSet {
    pub fn new(rules: Vec<Rule>, graph: RuleGraph) -> Self {
        Self { rules, graph }
    }

    /// Every rule reference resolves and the graph is acyclic
    pub fn validate(&self) -> RuleGraphResult<()> {
        for rule in &self.rules {
            for cedent_id in rule.antecedent.iter().chain(rule.consequent.iter()) {
                self.graph.cedent(*cedent_id)?;
            }
        }
        self.graph.validate()
    }
}

/// Ordering applied when listing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOrder {
    #[default]
    RuleId,
    Confidence,
    Support,
    Lift,
    A,
}

impl RuleOrder {
    /// Parse a client-supplied order key; an empty key means the default order
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim() {
            "" | "rule_id" | "id" => Some(Self::RuleId),
            "conf" | "confidence" => Some(Self::Confidence),
            "supp" | "support" => Some(Self::Support),
            "lift" => Some(Self::Lift),
            "a" => Some(Self::A),
            _ => None,
        }
    }

    /// Sort a rule list in place; measure orders are descending with the rule id
    /// as tie-breaker
    pub fn sort(&self, rules: &mut [Rule]) {
        match self {
            Self::RuleId => rules.sort_by_key(|r| r.rule_id),
            Self::Confidence => rules.sort_by(|x, y| {
                y.confidence
                    .total_cmp(&x.confidence)
                    .then(x.rule_id.cmp(&y.rule_id))
            }),
            Self::Support => rules.sort_by(|x, y| {
                y.support
                    .total_cmp(&x.support)
                    .then(x.rule_id.cmp(&y.rule_id))
            }),
            Self::Lift => rules.sort_by(|x, y| {
                let (lx, ly) = (x.lift.unwrap_or(f64::MIN), y.lift.unwrap_or(f64::MIN));
                ly.total_cmp(&lx).then(x.rule_id.cmp(&y.rule_id))
            }),
            Self::A => rules.sort_by(|x, y| y.a.cmp(&x.a).then(x.rule_id.cmp(&y.rule_id))),
        }
    }

    /// SQL `ORDER BY` clause for this ordering
    pub fn sql_order_by(&self) -> &'static str {
        match self {
            Self::RuleId => "rule_id ASC",
            Self::Confidence => "confidence DESC, rule_id ASC",
            Self::Support => "support DESC, rule_id ASC",
            Self::Lift => "lift DESC NULLS LAST, rule_id ASC",
            Self::A => "a DESC, rule_id ASC",
        }
    }
}
