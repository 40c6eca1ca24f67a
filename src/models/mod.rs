//! # Models
//!
//! Value types for tasks, miners, preprocessing definitions, rules and the
//! shared rule graph.

pub mod attribute;
pub mod miner;
pub mod rule;
pub mod rule_graph;
pub mod task;

pub use attribute::{
    Attribute, Closure, Interval, Preprocessing, PreprocessingKind, Value, ValuesBin,
};
pub use miner::{ColumnType, Datasource, DatasourceColumn, Metasource, Miner, MinerType};
pub use rule::{Rule, RuleOrder, TaskRuleSet};
pub use rule_graph::{
    AttributeRef, CategoryBinding, Cedent, CedentId, Connective, RuleAttribute, RuleAttributeId,
    RuleGraph, RuleGraphError, RuleGraphResult, ValuesBinRef,
};
pub use task::{NewTask, Task};
