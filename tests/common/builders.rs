//! Fixture builders for miners, statistics, settings and rule graphs.

use miner_core::models::{
    Attribute, AttributeRef, Cedent, CedentId, Closure, ColumnType, Connective, Datasource,
    DatasourceColumn, Interval, Metasource, Miner, MinerType, Preprocessing, Rule, RuleAttribute,
    RuleGraph, TaskRuleSet, Value, ValuesBin, ValuesBinRef,
};
use miner_core::repository::{InMemoryColumnStatistics, NumericSummary};
use miner_core::state_machine::{ImportState, TaskState, TaskStateSnapshot};
use serde_json::json;

pub const HEART_MINER_ID: i64 = 1;

pub fn heart_miner(miner_type: MinerType) -> Miner {
    Miner {
        miner_id: HEART_MINER_ID,
        name: "heart study".to_string(),
        miner_type,
        user_name: Some("Test Analyst".to_string()),
        datasource: Datasource {
            datasource_id: 1,
            db_table: "heart_data".to_string(),
            columns: vec![
                DatasourceColumn {
                    name: "age".to_string(),
                    column_type: ColumnType::Integer,
                },
                DatasourceColumn {
                    name: "sex".to_string(),
                    column_type: ColumnType::String,
                },
            ],
        },
        metasource: Metasource {
            metasource_id: 1,
            attributes_table: "heart_attributes".to_string(),
            attributes: vec![
                Attribute {
                    attribute_id: 1,
                    name: "sex".to_string(),
                    attribute_type: ColumnType::String,
                    datasource_column: "sex".to_string(),
                    preprocessing: Some(Preprocessing::each_one(1)),
                },
                Attribute {
                    attribute_id: 2,
                    name: "age".to_string(),
                    attribute_type: ColumnType::String,
                    datasource_column: "age".to_string(),
                    preprocessing: Some(Preprocessing::with_bins(
                        2,
                        vec![
                            ValuesBin::with_intervals(
                                1,
                                "young",
                                vec![Interval::new(Closure::Closed, 0.0, 40.0, Closure::Open)],
                            ),
                            ValuesBin::with_intervals(
                                2,
                                "old",
                                vec![Interval::new(Closure::Closed, 40.0, 120.0, Closure::Closed)],
                            ),
                        ],
                    )),
                },
            ],
        },
    }
}

pub fn heart_statistics() -> InMemoryColumnStatistics {
    let stats = InMemoryColumnStatistics::new();
    stats.set_frequencies("heart_data", "sex", [("a", 3), ("b", 5)]);
    stats.set_numeric_summary(
        "heart_data",
        "age",
        NumericSummary {
            min: 21.0,
            max: 77.0,
            avg: 49.5,
        },
    );
    stats.set_frequencies("heart_attributes", "sex", [("a", 3), ("b", 5)]);
    stats.set_frequencies("heart_attributes", "age", [("young", 2), ("old", 6)]);
    stats
}

pub fn settings_payload() -> String {
    json!({
        "taskName": "Heart risk",
        "limitHits": 100,
        "rule0": {
            "antecedent": {
                "type": "cedent",
                "connective": {"id": 1, "name": "AND", "type": "and"},
                "children": [
                    {"name": "age", "category": "One category",
                     "fields": [{"name": "category", "value": "old"}]}
                ]
            },
            "IMs": [
                {"name": "FUI", "threshold": 0.7},
                {"name": "SUPP", "threshold": 0.05}
            ],
            "succedent": {
                "connective": {"name": "AND"},
                "children": [
                    {"name": "sex", "category": "One category",
                     "fields": [{"name": "category", "value": "b"}]}
                ]
            }
        },
        "strict": false
    })
    .to_string()
}

pub fn snapshot(
    state: TaskState,
    import_state: ImportState,
    rules_count: i64,
) -> TaskStateSnapshot {
    TaskStateSnapshot::new(state, import_state, rules_count)
}

/// Solved snapshot still carrying import work
pub fn solved_waiting(rules_count: i64) -> TaskStateSnapshot {
    snapshot(TaskState::Solved, ImportState::Waiting, rules_count)
        .with_import_data(json!({"pending": rules_count}))
}

pub fn rule(rule_id: i64, antecedent: Option<i64>, consequent: Option<i64>) -> Rule {
    Rule {
        rule_id,
        task_id: 0,
        text: format!("rule {rule_id}"),
        a: 10 + rule_id,
        b: 5,
        c: 3,
        d: 82,
        confidence: 0.5,
        support: 0.25,
        lift: Some(1.2),
        antecedent: antecedent.map(CedentId),
        consequent: consequent.map(CedentId),
        in_rule_clipboard: false,
    }
}

pub fn value_attribute(rule_attribute_id: i64, attribute: &str, value: &str) -> RuleAttribute {
    RuleAttribute::new(
        rule_attribute_id,
        AttributeRef {
            attribute_id: rule_attribute_id,
            name: attribute.to_string(),
        },
        Some(Value {
            value_id: rule_attribute_id,
            value: value.to_string(),
        }),
        None,
    )
    .unwrap()
}

pub fn bin_attribute(rule_attribute_id: i64, attribute: &str, bin: &str) -> RuleAttribute {
    RuleAttribute::new(
        rule_attribute_id,
        AttributeRef {
            attribute_id: rule_attribute_id,
            name: attribute.to_string(),
        },
        None,
        Some(ValuesBinRef {
            values_bin_id: rule_attribute_id,
            name: bin.to_string(),
        }),
    )
    .unwrap()
}

/// One rule whose antecedent conjoins two unrelated rule attributes
pub fn single_rule_set() -> TaskRuleSet {
    let mut graph = RuleGraph::new();
    graph
        .insert_cedent(Cedent::new(1, Connective::Conjunction).with_rule_attributes([10, 11]))
        .unwrap();
    graph
        .insert_rule_attribute(bin_attribute(10, "age", "old"))
        .unwrap();
    graph
        .insert_rule_attribute(value_attribute(11, "sex", "b"))
        .unwrap();
    TaskRuleSet::new(vec![rule(1, Some(1), None)], graph)
}

/// Two rules sharing their antecedent subtree, with distinct consequents
pub fn shared_cedent_rule_set() -> TaskRuleSet {
    let mut graph = RuleGraph::new();
    graph
        .insert_cedent(
            Cedent::new(1, Connective::Conjunction)
                .with_cedents([2])
                .with_rule_attributes([10]),
        )
        .unwrap();
    graph
        .insert_cedent(Cedent::new(2, Connective::Disjunction).with_rule_attributes([11]))
        .unwrap();
    graph
        .insert_cedent(Cedent::new(3, Connective::Conjunction).with_rule_attributes([12]))
        .unwrap();
    graph
        .insert_cedent(Cedent::new(4, Connective::Conjunction).with_rule_attributes([13]))
        .unwrap();
    graph
        .insert_rule_attribute(bin_attribute(10, "age", "old"))
        .unwrap();
    graph
        .insert_rule_attribute(value_attribute(11, "sex", "a"))
        .unwrap();
    graph
        .insert_rule_attribute(value_attribute(12, "sex", "b"))
        .unwrap();
    graph
        .insert_rule_attribute(bin_attribute(13, "age", "young"))
        .unwrap();
    TaskRuleSet::new(
        vec![rule(1, Some(1), Some(3)), rule(2, Some(1), Some(4))],
        graph,
    )
}
