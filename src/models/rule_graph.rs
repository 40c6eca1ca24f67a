//! # Rule Graph
//!
//! Arena of cedents and rule attributes addressed by stable identifiers.
//!
//! Cedent subtrees and rule attributes may be shared by several rules. The arena
//! stores each node once and rules refer to them by id, so consumers deduplicate
//! by identifier instead of walking owned copies.

use super::attribute::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CedentId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleAttributeId(pub i64);

impl fmt::Display for CedentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RuleAttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuleGraphError {
    #[error("Rule attribute {0} has neither a value nor a values bin")]
    MissingBinding(RuleAttributeId),

    #[error("Rule attribute {0} has both a value and a values bin")]
    AmbiguousBinding(RuleAttributeId),

    #[error("Cedent {0} is referenced but not present in the graph")]
    DanglingCedent(CedentId),

    #[error("Rule attribute {0} is referenced but not present in the graph")]
    DanglingRuleAttribute(RuleAttributeId),

    #[error("Cedent {0} is part of a cycle")]
    Cycle(CedentId),

    #[error("Cedent {0} is already present in the graph")]
    DuplicateCedent(CedentId),

    #[error("Rule attribute {0} is already present in the graph")]
    DuplicateRuleAttribute(RuleAttributeId),
}

pub type RuleGraphResult<T> = Result<T, RuleGraphError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connective {
    Conjunction,
    Disjunction,
    Negation,
}

impl Connective {
    /// Capitalised form used in PMML `connective` attributes
    pub fn pmml_name(&self) -> &'static str {
        match self {
            Self::Conjunction => "Conjunction",
            Self::Disjunction => "Disjunction",
            Self::Negation => "Negation",
        }
    }
}

/// Boolean sub-expression over child cedents and rule attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cedent {
    pub cedent_id: CedentId,
    pub connective: Connective,
    #[serde(default)]
    pub cedents: Vec<CedentId>,
    #[serde(default)]
    pub rule_attributes: Vec<RuleAttributeId>,
}

impl Cedent {
    pub fn new(cedent_id: i64, connective: Connective) -> Self {
        Self {
            cedent_id: CedentId(cedent_id),
            connective,
            cedents: Vec::new(),
            rule_attributes: Vec::new(),
        }
    }

    pub fn with_cedents(mut self, cedents: impl IntoIterator<Item = i64>) -> Self {
        self.cedents.extend(cedents.into_iter().map(CedentId));
        self
    }

    pub fn with_rule_attributes(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.rule_attributes.extend(ids.into_iter().map(RuleAttributeId));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRef {
    pub attribute_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesBinRef {
    pub values_bin_id: i64,
    pub name: String,
}

/// Category an attribute is bound to; exactly one of the two shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryBinding {
    Value(Value),
    ValuesBin(ValuesBinRef),
}

/// Leaf binding of one attribute to one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAttribute {
    pub rule_attribute_id: RuleAttributeId,
    pub attribute: AttributeRef,
    pub binding: CategoryBinding,
}

impl RuleAttribute {
    /// Validate the exactly-one-of invariant between value and values bin
    pub fn new(
        rule_attribute_id: i64,
        attribute: AttributeRef,
        value: Option<Value>,
        values_bin: Option<ValuesBinRef>,
    ) -> RuleGraphResult<Self> {
        let id = RuleAttributeId(rule_attribute_id);
        let binding = match (value, values_bin) {
            (Some(value), None) => CategoryBinding::Value(value),
            (None, Some(bin)) => CategoryBinding::ValuesBin(bin),
            (Some(_), Some(_)) => return Err(RuleGraphError::AmbiguousBinding(id)),
            (None, None) => return Err(RuleGraphError::MissingBinding(id)),
        };

        Ok(Self {
            rule_attribute_id: id,
            attribute,
            binding,
        })
    }

    /// Category label written as `CatRef`
    pub fn category_name(&self) -> &str {
        match &self.binding {
            CategoryBinding::Value(value) => &value.value,
            CategoryBinding::ValuesBin(bin) => &bin.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGraph {
    cedents: HashMap<CedentId, Cedent>,
    rule_attributes: HashMap<RuleAttributeId, RuleAttribute>,
}

impl RuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_cedent(&mut self, cedent: Cedent) -> RuleGraphResult<()> {
        if self.cedents.contains_key(&cedent.cedent_id) {
            return Err(RuleGraphError::DuplicateCedent(cedent.cedent_id));
        }
        self.cedents.insert(cedent.cedent_id, cedent);
        Ok(())
    }

    pub fn insert_rule_attribute(&mut self, rule_attribute: RuleAttribute) -> RuleGraphResult<()> {
        let id = rule_attribute.rule_attribute_id;
        if self.rule_attributes.contains_key(&id) {
            return Err(RuleGraphError::DuplicateRuleAttribute(id));
        }
        self.rule_attributes.insert(id, rule_attribute);
        Ok(())
    }

    pub fn cedent(&self, id: CedentId) -> RuleGraphResult<&Cedent> {
        self.cedents
            .get(&id)
            .ok_or(RuleGraphError::DanglingCedent(id))
    }

    pub fn rule_attribute(&self, id: RuleAttributeId) -> RuleGraphResult<&RuleAttribute> {
        self.rule_attributes
            .get(&id)
            .ok_or(RuleGraphError::DanglingRuleAttribute(id))
    }

    pub fn cedents(&self) -> impl Iterator<Item = &Cedent> {
        self.cedents.values()
    }

    pub fn rule_attributes(&self) -> impl Iterator<Item = &RuleAttribute> {
        self.rule_attributes.values()
    }

    pub fn cedent_count(&self) -> usize {
        self.cedents.len()
    }

    pub fn rule_attribute_count(&self) -> usize {
        self.rule_attributes.len()
    }

    /// Move all nodes of `other` into this graph; nodes already present are kept
    pub fn merge(&mut self, other: RuleGraph) {
        for (id, cedent) in other.cedents {
            self.cedents.entry(id).or_insert(cedent);
        }
        for (id, rule_attribute) in other.rule_attributes {
            self.rule_attributes.entry(id).or_insert(rule_attribute);
        }
    }

    /// Copy of the subgraph reachable from the given root cedents
    pub fn reachable_from(
        &self,
        roots: impl IntoIterator<Item = CedentId>,
    ) -> RuleGraphResult<RuleGraph> {
        let mut subgraph = RuleGraph::new();
        let mut stack: Vec<CedentId> = roots.into_iter().collect();

        while let Some(id) = stack.pop() {
            if subgraph.cedents.contains_key(&id) {
                continue;
            }
            let cedent = self.cedent(id)?;
            stack.extend(cedent.cedents.iter().copied());
            for ra_id in &cedent.rule_attributes {
                if !subgraph.rule_attributes.contains_key(ra_id) {
                    let ra = self.rule_attribute(*ra_id)?;
                    subgraph.rule_attributes.insert(*ra_id, ra.clone());
                }
            }
            subgraph.cedents.insert(id, cedent.clone());
        }

        Ok(subgraph)
    }

    /// Check that every reference resolves and no cedent contains itself
    pub fn validate(&self) -> RuleGraphResult<()> {
        let mut finished: HashSet<CedentId> = HashSet::new();
        let mut ids: Vec<CedentId> = self.cedents.keys().copied().collect();
        ids.sort();

        for id in ids {
            let mut on_path = HashSet::new();
            self.visit(id, &mut on_path, &mut finished)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        id: CedentId,
        on_path: &mut HashSet<CedentId>,
        finished: &mut HashSet<CedentId>,
    ) -> RuleGraphResult<()> {
        if finished.contains(&id) {
            return Ok(());
        }
        if !on_path.insert(id) {
            return Err(RuleGraphError::Cycle(id));
        }

        let cedent = self.cedent(id)?;
        for child in &cedent.cedents {
            self.visit(*child, on_path, finished)?;
        }
        for ra_id in &cedent.rule_attributes {
            self.rule_attribute(*ra_id)?;
        }

        on_path.remove(&id);
        finished.insert(id);
        Ok(())
    }
}
